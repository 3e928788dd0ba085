//! 浏览器协作方
//!
//! 对外只有两件事：拿到一个可用的 (Browser, Page)，
//! 以及在页面上执行一段声明式动作序列。

pub mod actions;
pub mod connection;
pub mod headless;

pub use actions::{run_actions, ActionReport, BrowserAction};
pub use connection::connect_to_browser_and_page;
pub use headless::launch_headless_browser;

use chromiumoxide::{Browser, Page};
use tracing::warn;

use crate::error::Result;

/// 获取浏览器会话：优先附着到调试端口，失败时回退为无头启动
///
/// 原始系统对 WebDriver 也是这种多级回退策略。
pub async fn attach_or_launch(port: u16, url: &str) -> Result<(Browser, Page)> {
    match connect_to_browser_and_page(port, url).await {
        Ok(pair) => Ok(pair),
        Err(e) => {
            warn!("⚠️ 附着到调试端口 {} 失败: {}，回退为无头启动", port, e);
            launch_headless_browser(url).await
        }
    }
}
