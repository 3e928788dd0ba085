//! 声明式页面动作
//!
//! 浏览器协作方接受一个动作序列并逐个执行，返回每个动作的成败。
//! 点击和输入都通过 JS 完成（和题库提交一样走 `JsExecutor.eval`），
//! 导航和截图走页面级 API。

use chromiumoxide::page::ScreenshotParams;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::error::Result;
use crate::infrastructure::JsExecutor;

/// 单个页面动作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum BrowserAction {
    /// 导航到 URL 并等待加载完成
    Navigate { url: String },
    /// 保存整页截图
    Screenshot { path: String },
    /// 点击匹配选择器的第一个元素
    Click { selector: String },
    /// 向匹配的输入元素写入文本
    TypeText { selector: String, text: String },
    /// 执行任意 JS 片段
    Eval { js: String },
    /// 固定等待
    Sleep { millis: u64 },
}

impl BrowserAction {
    /// 动作名称（用于日志和报告）
    pub fn name(&self) -> &'static str {
        match self {
            BrowserAction::Navigate { .. } => "navigate",
            BrowserAction::Screenshot { .. } => "screenshot",
            BrowserAction::Click { .. } => "click",
            BrowserAction::TypeText { .. } => "type-text",
            BrowserAction::Eval { .. } => "eval",
            BrowserAction::Sleep { .. } => "sleep",
        }
    }
}

/// 单个动作的执行结果
#[derive(Debug, Clone)]
pub struct ActionReport {
    pub action: &'static str,
    pub ok: bool,
    pub detail: Option<String>,
}

/// 依次执行动作序列
///
/// 单个动作失败不会中断序列，失败记录在对应的报告里，
/// 由调用方决定整段脚本算不算失败。
pub async fn run_actions(
    executor: &JsExecutor,
    actions: &[BrowserAction],
) -> Result<Vec<ActionReport>> {
    let mut reports = Vec::with_capacity(actions.len());
    for (index, action) in actions.iter().enumerate() {
        let report = match run_one(executor, action).await {
            Ok(()) => {
                info!("✓ 动作 {}/{} ({}) 完成", index + 1, actions.len(), action.name());
                ActionReport {
                    action: action.name(),
                    ok: true,
                    detail: None,
                }
            }
            Err(e) => {
                warn!(
                    "⚠️ 动作 {}/{} ({}) 失败: {}",
                    index + 1,
                    actions.len(),
                    action.name(),
                    e
                );
                ActionReport {
                    action: action.name(),
                    ok: false,
                    detail: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }
    Ok(reports)
}

async fn run_one(executor: &JsExecutor, action: &BrowserAction) -> Result<()> {
    match action {
        BrowserAction::Navigate { url } => {
            executor.page().goto(url.as_str()).await?;
            executor.page().wait_for_navigation().await?;
            info!("已导航到: {}", url);
            Ok(())
        }
        BrowserAction::Screenshot { path } => {
            executor
                .page()
                .save_screenshot(
                    ScreenshotParams::builder().full_page(true).build(),
                    path.as_str(),
                )
                .await?;
            info!("✅ 截图已保存: {}", path);
            Ok(())
        }
        BrowserAction::Click { selector } => {
            let clicked = executor.eval_bool(click_js(selector)).await?;
            if clicked {
                Ok(())
            } else {
                Err(crate::error::AppError::browser_action_failed(
                    "click",
                    format!("找不到元素: {}", selector),
                ))
            }
        }
        BrowserAction::TypeText { selector, text } => {
            let typed = executor.eval_bool(type_text_js(selector, text)).await?;
            if typed {
                Ok(())
            } else {
                Err(crate::error::AppError::browser_action_failed(
                    "type-text",
                    format!("找不到元素: {}", selector),
                ))
            }
        }
        BrowserAction::Eval { js } => {
            executor.eval(js.as_str()).await?;
            Ok(())
        }
        BrowserAction::Sleep { millis } => {
            sleep(Duration::from_millis(*millis)).await;
            Ok(())
        }
    }
}

/// 点击脚本：返回是否找到了元素
fn click_js(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_default();
    format!(
        r#"
        (() => {{
            const el = document.querySelector({quoted});
            if (!el) return false;
            el.click();
            return true;
        }})()
        "#
    )
}

/// 输入脚本：写入 value 并触发 input 事件，返回是否找到了元素
fn type_text_js(selector: &str, text: &str) -> String {
    let quoted_selector = serde_json::to_string(selector).unwrap_or_default();
    let quoted_text = serde_json::to_string(text).unwrap_or_default();
    format!(
        r#"
        (() => {{
            const el = document.querySelector({quoted_selector});
            if (!el) return false;
            el.value = {quoted_text};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            return true;
        }})()
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_js_escapes_selector() {
        let js = click_js("div[aria-label*='Compose']");
        assert!(js.contains(r#""div[aria-label*='Compose']""#));
    }

    #[test]
    fn test_type_text_js_escapes_quotes() {
        let js = type_text_js("input[name='q']", r#"he said "hi""#);
        assert!(js.contains(r#"\"hi\""#));
    }

    #[test]
    fn test_action_serde_roundtrip() {
        let action = BrowserAction::Navigate {
            url: "https://example.com".to_string(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"navigate\""));
        let back: BrowserAction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
