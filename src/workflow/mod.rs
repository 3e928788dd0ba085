//! 流程层（Workflow Layer）
//!
//! 定义"一次工作流运行"的完整步骤序列：
//! - `StepCtx` - 上下文封装（运行标识 + 步骤位置）
//! - `steps` - 步骤种类与各工作流的步骤表（数据，不是类型）
//! - `WorkflowRunner` - 线性状态机：步骤按序执行，失败即终止
//! - `FormFlow` - 真实的步骤执行器（浏览器 → 表单 → 邮件）

pub mod form_flow;
pub mod runner;
pub mod step_ctx;
pub mod steps;

pub use form_flow::FormFlow;
pub use runner::{RunOutcome, StepExecutor, StepReport, WorkflowRunner};
pub use step_ctx::StepCtx;
pub use steps::{step_sequence, FailurePolicy, StepKind, StepSpec};
