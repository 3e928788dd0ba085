//! 表单处理流程 - 流程层
//!
//! 真实的步骤执行器，把各业务能力串成一次完整的运行：
//!
//! 1. drive-browser → 访问表单站点并截图
//! 2. fetch-form → 下载（或读取本地）空白表单
//! 3. fill-form → 分类 → 生成 → 填充 → 写出新文档
//! 4. send-email → 把填好的表单作为附件发出去
//!
//! 职责：
//! - 编排能力调用顺序，持有步骤间的中间产物
//! - 持有浏览器资源（Browser + JsExecutor）
//! - 不关心状态机推进（那是 `WorkflowRunner` 的事）

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chromiumoxide::Browser;
use tracing::{info, warn};

use crate::browser::{attach_or_launch, run_actions, BrowserAction};
use crate::config::Config;
use crate::error::{AppError, DocumentError, Result};
use crate::infrastructure::{JsExecutor, LopdfBackend};
use crate::models::{FieldCategory, FilledDocument, Provenance};
use crate::services::{DataGenerator, DocumentFiller, EmailSender, FieldClassifier};
use crate::workflow::runner::StepExecutor;
use crate::workflow::step_ctx::StepCtx;
use crate::workflow::steps::StepKind;

/// 表单处理流程
pub struct FormFlow {
    config: Config,
    /// 调用方指定的字段值（按字段标识覆盖生成值）
    params: HashMap<String, String>,
    backend: LopdfBackend,
    classifier: FieldClassifier,
    generator: DataGenerator,
    filler: DocumentFiller,
    /// Browser 一旦 drop 连接就断了，整个运行期间都要持有
    _browser: Option<Browser>,
    form_bytes: Option<Vec<u8>>,
    filled: Option<FilledDocument>,
}

impl FormFlow {
    /// 创建新的表单处理流程
    pub fn new(config: Config, params: HashMap<String, String>) -> Self {
        let generator = DataGenerator::new(&config);
        Self {
            config,
            params,
            backend: LopdfBackend::new(),
            classifier: FieldClassifier::new(),
            generator,
            filler: DocumentFiller::new(),
            _browser: None,
            form_bytes: None,
            filled: None,
        }
    }

    /// 本次运行产出的填充文档（供测试与调用方检查）
    pub fn filled_document(&self) -> Option<&FilledDocument> {
        self.filled.as_ref()
    }

    /// 源文档标识：本地路径优先，否则下载 URL
    fn form_source(&self) -> String {
        if self.config.form_pdf_path.is_empty() {
            self.config.form_pdf_url.clone()
        } else {
            self.config.form_pdf_path.clone()
        }
    }

    fn output_path(&self) -> PathBuf {
        Path::new(&self.config.output_dir).join(&self.config.filled_pdf_name)
    }

    // ========== 步骤实现 ==========

    /// 访问表单介绍页和 PDF 页面，各保存一张截图
    async fn step_drive_browser(&mut self, ctx: &StepCtx) -> Result<()> {
        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| AppError::other(format!("创建输出目录失败: {}", e)))?;

        info!("{} 🌐 正在获取浏览器会话...", ctx);
        let (browser, page) =
            attach_or_launch(self.config.browser_debug_port, &self.config.target_url).await?;
        let executor = JsExecutor::new(page);

        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let actions = vec![
            BrowserAction::Sleep { millis: 500 },
            BrowserAction::Screenshot {
                path: format!("{}/trec_page_{}.png", self.config.output_dir, ts),
            },
            BrowserAction::Navigate {
                url: self.config.form_pdf_url.clone(),
            },
            BrowserAction::Sleep { millis: 500 },
            BrowserAction::Screenshot {
                path: format!("{}/pdf_page_{}.png", self.config.output_dir, ts),
            },
        ];

        let reports = run_actions(&executor, &actions).await?;
        self._browser = Some(browser);

        let failed: Vec<&str> = reports
            .iter()
            .filter(|r| !r.ok)
            .map(|r| r.action)
            .collect();
        if failed.is_empty() {
            info!("{} ✓ 页面访问完成", ctx);
            Ok(())
        } else {
            Err(AppError::browser_action_failed(
                failed.join(","),
                "页面动作序列未全部成功",
            ))
        }
    }

    /// 获取空白表单字节流
    async fn step_fetch_form(&mut self, ctx: &StepCtx) -> Result<()> {
        let bytes = if self.config.form_pdf_path.is_empty() {
            let url = self.config.form_pdf_url.clone();
            info!("{} ⬇️ 正在下载空白表单: {}", ctx, url);
            let response = reqwest::get(&url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| DocumentError::FetchFailed {
                    path: url.clone(),
                    detail: e.to_string(),
                })?;
            response
                .bytes()
                .await
                .map_err(|e| DocumentError::FetchFailed {
                    path: url,
                    detail: e.to_string(),
                })?
                .to_vec()
        } else {
            let path = self.config.form_pdf_path.clone();
            info!("{} 📄 正在读取本地表单: {}", ctx, path);
            tokio::fs::read(&path)
                .await
                .map_err(|e| DocumentError::FetchFailed {
                    path,
                    detail: e.to_string(),
                })?
        };

        info!("{} ✅ 已获取空白表单 ({} 字节)", ctx, bytes.len());
        self.form_bytes = Some(bytes);
        Ok(())
    }

    /// 分类 → 生成 → 填充，写出新文档
    async fn step_fill_form(&mut self, ctx: &StepCtx) -> Result<()> {
        let source = self.form_source();
        let bytes = self
            .form_bytes
            .as_ref()
            .ok_or_else(|| AppError::other("表单尚未获取，无法填充"))?
            .clone();

        let fields = self
            .classifier
            .classify_document(&self.backend, &source, &bytes)?;
        log_category_stats(ctx, &fields);

        let values = self.generator.generate(&fields, &self.params).await;
        log_provenance_stats(ctx, &values);

        let filled = self
            .filler
            .fill(&self.backend, &source, &bytes, &fields, &values)?;

        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| AppError::other(format!("创建输出目录失败: {}", e)))?;
        let output_path = self.output_path();
        tokio::fs::write(&output_path, &filled.bytes)
            .await
            .map_err(|e| {
                AppError::other(format!("写出 {} 失败: {}", output_path.display(), e))
            })?;
        info!("{} ✅ 填充后的文档已保存: {}", ctx, output_path.display());

        self.filled = Some(filled);
        Ok(())
    }

    /// 把填好的表单作为附件发邮件
    async fn step_send_email(&mut self, ctx: &StepCtx) -> Result<()> {
        let filled = self
            .filled
            .as_ref()
            .ok_or_else(|| AppError::other("没有已填充的文档，无法发送邮件"))?;

        let subject = "🤖 AI-Filled TREC Form 10-6 - Automated RPA Workflow";
        let body = email_body(filled.values.len(), &self.config);

        let sender = EmailSender::new(&self.config);
        sender
            .send(
                &self.config.email_to,
                subject,
                &body,
                &self.config.filled_pdf_name,
                filled.bytes.clone(),
            )
            .await?;
        info!("{} ✓ 邮件已发出", ctx);
        Ok(())
    }
}

impl StepExecutor for FormFlow {
    async fn execute(&mut self, step: StepKind, ctx: &StepCtx) -> Result<()> {
        match step {
            StepKind::DriveBrowser => self.step_drive_browser(ctx).await,
            StepKind::FetchForm => self.step_fetch_form(ctx).await,
            StepKind::FillForm => self.step_fill_form(ctx).await,
            StepKind::SendEmail => self.step_send_email(ctx).await,
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_category_stats(ctx: &StepCtx, fields: &[crate::models::FormField]) {
    let mut counts: HashMap<FieldCategory, usize> = HashMap::new();
    for field in fields {
        *counts.entry(field.category).or_default() += 1;
    }
    let summary: Vec<String> = counts
        .iter()
        .map(|(category, count)| format!("{} x{}", category.as_str(), count))
        .collect();
    info!(
        "{} 字段分类完成，共 {} 个: {}",
        ctx,
        fields.len(),
        summary.join(", ")
    );
}

fn log_provenance_stats(ctx: &StepCtx, values: &[crate::models::FieldValue]) {
    let ai = values
        .iter()
        .filter(|v| v.provenance == Provenance::AiGenerated)
        .count();
    let fallback = values
        .iter()
        .filter(|v| v.provenance == Provenance::Fallback)
        .count();
    let user = values
        .iter()
        .filter(|v| v.provenance == Provenance::UserSupplied)
        .count();
    info!(
        "{} 值来源: AI 生成 {}，兜底 {}，调用方指定 {}",
        ctx, ai, fallback, user
    );
    if fallback > 0 {
        warn!("{} ⚠️ 有 {} 个字段使用了兜底值", ctx, fallback);
    }
}

/// 邮件正文（发给收件人的英文摘要）
fn email_body(value_count: usize, config: &Config) -> String {
    format!(
        r#"Hello,

This is an automated email generated by the PDF form automation agent. The run has:

- Visited the form page: {}
- Downloaded the blank form: {}
- Filled {} form fields with generated data
- Attached the filled PDF for your reference

Best regards,
PDF Automation Agent"#,
        config.target_url, config.form_pdf_url, value_count
    )
}
