/// 日志工具模块
///
/// 提供日志初始化和运行横幅的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::WorkflowKind;

/// 初始化日志输出
///
/// 运行器的标准输出由监管器重定向到日志文件，
/// 因此这里只配置格式和过滤级别。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .try_init();
}

/// 记录运行器启动信息
pub fn log_startup(kind: WorkflowKind, total_steps: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 工作流运行器启动 - {}", kind);
    info!("📋 共 {} 个步骤", total_steps);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(succeeded: bool, completed_steps: usize, total_steps: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 工作流执行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    if succeeded {
        info!("✅ 成功完成 {}/{} 个步骤", completed_steps, total_steps);
    } else {
        info!("❌ 失败，完成 {}/{} 个步骤", completed_steps, total_steps);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
