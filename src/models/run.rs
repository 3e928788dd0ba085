//! 工作流运行记录
//!
//! `WorkflowRun` 由进程监管器在 start 时创建，记录一个独立子进程的
//! 生命周期；pid 即对外的运行标识，运行期间 pid → 记录的映射唯一。

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// 工作流种类
///
/// 各种类只在步骤组成上不同（数据差异，不是类型差异）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    /// 完整流程：浏览器 → 下载表单 → 填充 → 邮件
    Complete,
    /// 填充并发送：下载表单 → 填充 → 邮件
    FillAndSend,
    /// 部分流程：浏览器 → 下载表单 → 填充（无邮件）
    Partial,
}

impl WorkflowKind {
    /// 种类名称（命令行参数与日志使用）
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowKind::Complete => "complete",
            WorkflowKind::FillAndSend => "fill-and-send",
            WorkflowKind::Partial => "partial",
        }
    }

    /// 从字符串解析种类
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(WorkflowKind::Complete),
            "fill-and-send" => Some(WorkflowKind::FillAndSend),
            "partial" => Some(WorkflowKind::Partial),
            _ => None,
        }
    }

    /// 所有支持的种类
    pub fn all() -> &'static [WorkflowKind] {
        &[
            WorkflowKind::Complete,
            WorkflowKind::FillAndSend,
            WorkflowKind::Partial,
        ]
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 运行生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    /// 已启动，尚未观察到任何步骤输出
    Starting,
    /// 子进程存活且在执行步骤
    Running,
    /// 子进程正常退出
    Completed,
    /// 子进程失败退出
    Failed,
    /// 被 stop 请求终止
    Stopped,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Stopped => "stopped",
        }
    }

    /// 是否为终止态（终止态后记录不再被子进程修改）
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Stopped
        )
    }
}

/// 工作流运行记录
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRun {
    /// 子进程 PID，对外的运行标识
    pub pid: u32,
    /// 工作流种类
    pub kind: WorkflowKind,
    /// 生命周期状态
    pub state: RunState,
    /// 启动时间
    pub started_at: DateTime<Local>,
    /// 最近观察到的步骤序号（1 起，0 表示尚未开始）
    pub current_step: usize,
    /// 步骤总数
    pub total_steps: usize,
    /// 子进程日志文件
    pub log_file: PathBuf,
    /// 终止原因（Failed / Stopped 时填写）
    pub failure_reason: Option<String>,
}

/// `status` 操作返回的结构化结果
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub pid: u32,
    pub kind: WorkflowKind,
    pub state: RunState,
    pub current_step: usize,
    pub total_steps: usize,
    pub started_at: DateTime<Local>,
    pub failure_reason: Option<String>,
    /// 日志末尾若干行
    pub log_excerpt: Vec<String>,
}
