//! 步骤执行上下文
//!
//! 封装"我是哪次运行的第几步"这一信息

use std::fmt::Display;

use crate::models::WorkflowKind;

/// 步骤执行上下文
///
/// 包含执行单个步骤所需的所有上下文信息
#[derive(Debug, Clone)]
pub struct StepCtx {
    /// 运行标识（运行器进程的 PID）
    pub run_tag: String,

    /// 工作流种类
    pub kind: WorkflowKind,

    /// 步骤序号（从 1 开始）
    pub step_index: usize,

    /// 步骤总数
    pub total_steps: usize,

    /// 步骤名称
    pub step_name: &'static str,
}

impl StepCtx {
    /// 创建新的步骤上下文
    pub fn new(
        run_tag: impl Into<String>,
        kind: WorkflowKind,
        step_index: usize,
        total_steps: usize,
        step_name: &'static str,
    ) -> Self {
        Self {
            run_tag: run_tag.into(),
            kind,
            step_index,
            total_steps,
            step_name,
        }
    }
}

impl Display for StepCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[运行 #{} {} 步骤 {}/{} {}]",
            self.run_tag, self.kind, self.step_index, self.total_steps, self.step_name
        )
    }
}
