//! 工作流运行器入口
//!
//! 用法: `pdf_agent [complete|fill-and-send|partial] [--config 配置文件] [--set 字段=值]...`
//!
//! 监管器把本二进制拉起为子进程；直接在命令行运行也可以。
//! 运行器从不交互，标准输出就是运行日志。

use std::collections::HashMap;
use std::process::ExitCode;

use anyhow::Result;
use pdf_agent::config::Config;
use pdf_agent::models::WorkflowKind;
use pdf_agent::utils::logging;
use pdf_agent::workflow::{step_sequence, FormFlow, RunOutcome, WorkflowRunner};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let (kind, config_path, params) = parse_args()?;

    // 加载配置
    let config = match config_path {
        Some(path) => Config::from_toml_file(&path)?,
        None => Config::from_env(),
    };

    // 初始化日志
    logging::init(config.verbose_logging);

    let total_steps = step_sequence(kind).len();
    logging::log_startup(kind, total_steps);

    // 运行工作流
    let runner = WorkflowRunner::new(kind, std::process::id().to_string());
    let mut flow = FormFlow::new(config, params);
    let (outcome, reports) = runner.run(&mut flow).await;

    let completed = reports.iter().filter(|r| r.ok).count();
    let succeeded = outcome == RunOutcome::Succeeded;
    logging::print_final_stats(succeeded, completed, total_steps);

    // 退出码供监管器对账定稿 Completed / Failed
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// 解析命令行参数
///
/// 返回 (工作流种类, 配置文件路径, 字段覆盖值)
fn parse_args() -> Result<(WorkflowKind, Option<String>, HashMap<String, String>)> {
    let mut kind = WorkflowKind::Complete;
    let mut config_path = None;
    let mut params = HashMap::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = args.next();
            }
            "--set" => {
                if let Some(pair) = args.next() {
                    if let Some((key, value)) = pair.split_once('=') {
                        params.insert(key.to_string(), value.to_string());
                    } else {
                        anyhow::bail!("--set 需要 字段=值 形式，得到: {}", pair);
                    }
                }
            }
            other => {
                kind = WorkflowKind::parse(other).ok_or_else(|| {
                    anyhow::anyhow!(
                        "未知的工作流种类: {}（支持 complete / fill-and-send / partial）",
                        other
                    )
                })?;
            }
        }
    }

    Ok((kind, config_path, params))
}
