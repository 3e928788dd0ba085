//! 进程监管器 - 编排层
//!
//! ## 核心功能
//!
//! 1. **start**：把运行器二进制拉起为独立子进程，标准输出重定向到
//!    独立的日志文件，立即返回 pid（不等待工作流结束）
//! 2. **status**：返回生命周期状态、最近步骤序号和日志尾部
//! 3. **stop**：尽力而为地终止子进程，幂等
//! 4. **list**：全部运行记录，最新的在前
//! 5. **对账**：周期性 try_wait 核对每个子进程是否退出，并据退出码
//!    定稿 Completed / Failed，子进程意外死亡也不会让状态停在 running
//!
//! 监管器自身不会因为子进程失败而崩溃：失败被进程边界隔离，
//! 只体现为对应记录的终止状态。

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, ProcessError, Result};
use crate::models::{RunState, RunStatus, WorkflowKind, WorkflowRun};
use crate::orchestrator::run_table::RunTable;
use crate::workflow::runner::RUN_FAIL_MARKER;
use crate::workflow::steps::step_sequence;

/// 进程监管器
pub struct Supervisor {
    config: Config,
    table: RunTable,
}

impl Supervisor {
    /// 创建监管器
    pub fn new(config: Config) -> Self {
        let table = RunTable::new(config.max_tracked_runs);
        Self { config, table }
    }

    /// 启动一个工作流运行
    ///
    /// # 参数
    /// - `kind`: 工作流种类
    /// - `params`: 传给运行器的字段覆盖值（--set id=value）
    ///
    /// # 返回
    /// 立即返回子进程 pid，作为后续 status / stop 的运行标识
    pub fn start(&self, kind: WorkflowKind, params: &HashMap<String, String>) -> Result<u32> {
        std::fs::create_dir_all(&self.config.log_dir).map_err(|e| {
            ProcessError::LogFileFailed {
                path: self.config.log_dir.clone(),
                source: e,
            }
        })?;

        let log_file = PathBuf::from(&self.config.log_dir).join(format!(
            "workflow_{}_{}.log",
            kind,
            chrono::Local::now().format("%Y%m%d_%H%M%S%3f")
        ));
        let file = std::fs::File::create(&log_file).map_err(|e| ProcessError::LogFileFailed {
            path: log_file.display().to_string(),
            source: e,
        })?;
        let stderr_file = file
            .try_clone()
            .map_err(|e| ProcessError::LogFileFailed {
                path: log_file.display().to_string(),
                source: e,
            })?;

        let program = if self.config.runner_program.is_empty() {
            std::env::current_exe().map_err(|e| ProcessError::SpawnFailed { source: e })?
        } else {
            PathBuf::from(&self.config.runner_program)
        };

        let mut command = Command::new(&program);
        command
            .args(&self.config.runner_args)
            .arg(kind.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::from(stderr_file));
        for (key, value) in params {
            command.arg("--set").arg(format!("{}={}", key, value));
        }

        debug!("启动命令: {:?}", command);
        let child = command
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed { source: e })?;
        let pid = child.id().ok_or(ProcessError::PidUnavailable)?;

        let run = WorkflowRun {
            pid,
            kind,
            state: RunState::Starting,
            started_at: chrono::Local::now(),
            current_step: 0,
            total_steps: step_sequence(kind).len(),
            log_file: log_file.clone(),
            failure_reason: None,
        };
        self.table.insert(run, child);

        info!("🚀 已启动工作流 {} (pid={})", kind, pid);
        info!("📄 日志文件: {}", log_file.display());
        Ok(pid)
    }

    /// 查询运行状态
    ///
    /// 返回生命周期状态、最近步骤序号和日志尾部若干行；
    /// 未知 pid 返回 NotFound。
    pub async fn status(&self, pid: u32) -> Result<RunStatus> {
        // 先核对一次子进程状态，避免返回过期的 running
        self.reconcile_pid(pid).ok_or(AppError::NotFound(pid))?;

        let run = self.table.get(pid).ok_or(AppError::NotFound(pid))?;
        let excerpt = read_log_tail(&run.log_file, self.config.log_tail_lines).await;
        let progress = parse_progress(&excerpt);

        // 把日志里解析出的进度写回记录
        self.table.with_mut(pid, |tracked| {
            if let Some((step, _total)) = progress.last_step {
                if step > tracked.run.current_step {
                    tracked.run.current_step = step;
                }
                if tracked.run.state == RunState::Starting {
                    tracked.run.state = RunState::Running;
                }
            }
            if tracked.run.state == RunState::Failed && tracked.run.failure_reason.is_none() {
                tracked.run.failure_reason = progress.failure_line.clone();
            }
        });

        let run = self.table.get(pid).ok_or(AppError::NotFound(pid))?;
        Ok(RunStatus {
            pid: run.pid,
            kind: run.kind,
            state: run.state,
            current_step: run.current_step,
            total_steps: run.total_steps,
            started_at: run.started_at,
            failure_reason: run.failure_reason,
            log_excerpt: excerpt,
        })
    }

    /// 终止一个运行
    ///
    /// 尽力而为：发出终止信号后记录即转入 stopped，不保证步骤内回滚。
    /// 幂等：对已结束的运行是 no-op；未知 pid 返回 NotFound。
    pub fn stop(&self, pid: u32) -> Result<()> {
        let result = self.table.with_mut(pid, |tracked| {
            if tracked.run.state.is_terminal() {
                debug!("运行 {} 已结束，stop 为 no-op", pid);
                return Ok(());
            }
            if let Some(child) = tracked.child.as_mut() {
                match child.try_wait() {
                    // 子进程其实已经退出，按已结束处理
                    Ok(Some(status)) => {
                        tracked.run.state = if status.success() {
                            RunState::Completed
                        } else {
                            RunState::Failed
                        };
                        return Ok(());
                    }
                    Ok(None) => {
                        child
                            .start_kill()
                            .map_err(|e| ProcessError::SignalFailed { pid, source: e })?;
                    }
                    Err(e) => {
                        return Err(ProcessError::SignalFailed { pid, source: e }.into());
                    }
                }
            }
            tracked.run.state = RunState::Stopped;
            tracked.run.failure_reason = Some("收到 stop 请求".to_string());
            Ok(())
        });

        match result {
            Some(Ok(())) => {
                info!("🛑 已停止运行 pid={}", pid);
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Err(AppError::NotFound(pid)),
        }
    }

    /// 全部运行记录，最新的在前
    pub fn list(&self) -> Vec<WorkflowRun> {
        self.table.list()
    }

    /// 显式移除一条运行记录
    pub fn cleanup(&self, pid: u32) -> Result<()> {
        self.table.remove(pid).ok_or(AppError::NotFound(pid))?;
        Ok(())
    }

    /// 对账一轮：核对每个子进程的退出状态并定稿
    pub fn reconcile_once(&self) {
        self.table.for_each(|tracked| {
            if tracked.run.state.is_terminal() {
                return;
            }
            let Some(child) = tracked.child.as_mut() else {
                return;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracked.run.state = if status.success() {
                        RunState::Completed
                    } else {
                        RunState::Failed
                    };
                    if tracked.run.state == RunState::Failed {
                        tracked.run.failure_reason =
                            Some(format!("子进程退出码 {:?}", status.code()));
                    }
                    info!(
                        "对账: 运行 {} 已退出，定稿为 {}",
                        tracked.run.pid,
                        tracked.run.state.as_str()
                    );
                    tracked.child = None;
                }
                Ok(None) => {
                    // 子进程存活
                    if tracked.run.state == RunState::Starting {
                        tracked.run.state = RunState::Running;
                    }
                }
                Err(e) => {
                    warn!("对账: 检查运行 {} 失败: {}", tracked.run.pid, e);
                }
            }
        });
    }

    /// 启动周期性对账任务
    pub fn spawn_reconciler(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let supervisor = Arc::clone(self);
        let period =
            tokio::time::Duration::from_secs(self.config.reconcile_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                supervisor.reconcile_once();
            }
        })
    }

    /// 对单个运行核对一次子进程状态；pid 不存在时返回 None
    fn reconcile_pid(&self, pid: u32) -> Option<()> {
        self.table.with_mut(pid, |tracked| {
            if tracked.run.state.is_terminal() {
                return;
            }
            let Some(child) = tracked.child.as_mut() else {
                return;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    tracked.run.state = if status.success() {
                        RunState::Completed
                    } else {
                        RunState::Failed
                    };
                    if tracked.run.state == RunState::Failed {
                        tracked.run.failure_reason =
                            Some(format!("子进程退出码 {:?}", status.code()));
                    }
                    tracked.child = None;
                }
                Ok(None) => {
                    if tracked.run.state == RunState::Starting {
                        tracked.run.state = RunState::Running;
                    }
                }
                Err(_) => {}
            }
        })
    }
}

/// 日志里解析出来的进度信息
#[derive(Debug, Default)]
struct ProgressView {
    /// 最后一个 [STEP i/n] 标记
    last_step: Option<(usize, usize)>,
    /// 失败标记所在行（作为失败原因展示）
    failure_line: Option<String>,
}

/// 从日志尾部解析步骤标记与失败原因
fn parse_progress(lines: &[String]) -> ProgressView {
    let step_re = Regex::new(r"\[STEP (\d+)/(\d+)\]").expect("步骤标记正则无效");
    let mut view = ProgressView::default();
    for line in lines {
        if let Some(captures) = step_re.captures(line) {
            let step = captures[1].parse().unwrap_or(0);
            let total = captures[2].parse().unwrap_or(0);
            view.last_step = Some((step, total));
        }
        if line.contains(RUN_FAIL_MARKER) || line.contains('✗') {
            view.failure_line = Some(line.trim().to_string());
        }
    }
    view
}

/// 读取日志文件的最后 n 行
async fn read_log_tail(path: &std::path::Path, n: usize) -> Vec<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let lines: Vec<&str> = content.lines().collect();
            let start = lines.len().saturating_sub(n);
            lines[start..].iter().map(|s| s.to_string()).collect()
        }
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_picks_last_marker() {
        let lines = vec![
            "[STEP 1/3] ▶ drive-browser".to_string(),
            "[STEP 1/3] ✓ drive-browser (耗时 1.2s)".to_string(),
            "[STEP 2/3] ▶ fetch-form".to_string(),
        ];
        let view = parse_progress(&lines);
        assert_eq!(view.last_step, Some((2, 3)));
        assert!(view.failure_line.is_none());
    }

    #[test]
    fn test_parse_progress_captures_failure_line() {
        let lines = vec![
            "[STEP 2/3] ✗ fetch-form: 获取源文档失败".to_string(),
            format!("{} 工作流 partial 失败于步骤 2 (fetch-form)", RUN_FAIL_MARKER),
        ];
        let view = parse_progress(&lines);
        assert!(view
            .failure_line
            .as_deref()
            .unwrap()
            .contains(RUN_FAIL_MARKER));
    }

    #[test]
    fn test_parse_progress_empty_log() {
        let view = parse_progress(&[]);
        assert!(view.last_step.is_none());
        assert!(view.failure_line.is_none());
    }
}
