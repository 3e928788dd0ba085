//! 工作流运行器 - 流程层
//!
//! 核心职责：按步骤表顺序执行，失败即终止
//!
//! 状态机：状态就是步骤表里的各步骤，外加 Succeeded / Failed
//! 两个终止态。步骤只有成功才会推进到下一步；Abort 策略的步骤
//! 失败直接进入 Failed 并跳过剩余步骤：后面的步骤（比如发邮件）
//! 假定前面的产物存在，不允许部分继续。
//!
//! 每个步骤在进入和结束时各输出一条带 `[STEP i/n]` 标记的日志，
//! 监管器通过日志尾部解析这些标记得到运行进度。

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::error::Result;
use crate::models::WorkflowKind;
use crate::workflow::step_ctx::StepCtx;
use crate::workflow::steps::{step_sequence, FailurePolicy, StepKind};

/// 运行结束标记（监管器在日志尾部识别）
pub const RUN_OK_MARKER: &str = "[RUN] ✅";
pub const RUN_FAIL_MARKER: &str = "[RUN] ❌";

/// 步骤执行器能力接口
///
/// 运行器只认识步骤种类，真实工作交给执行器；
/// 测试里用脚本化的假执行器驱动状态机。
#[allow(async_fn_in_trait)]
pub trait StepExecutor {
    async fn execute(&mut self, step: StepKind, ctx: &StepCtx) -> Result<()>;
}

/// 运行最终结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// 单个步骤的执行记录
#[derive(Debug, Clone)]
pub struct StepReport {
    pub kind: StepKind,
    pub ok: bool,
    pub elapsed: Duration,
    pub error: Option<String>,
}

/// 工作流运行器
pub struct WorkflowRunner {
    kind: WorkflowKind,
    run_tag: String,
}

impl WorkflowRunner {
    /// 创建新的运行器
    pub fn new(kind: WorkflowKind, run_tag: impl Into<String>) -> Self {
        Self {
            kind,
            run_tag: run_tag.into(),
        }
    }

    /// 按步骤表执行到结束
    ///
    /// # 返回
    /// 最终结果与每个已执行步骤的记录（被跳过的步骤不产生记录）
    pub async fn run<E: StepExecutor>(&self, executor: &mut E) -> (RunOutcome, Vec<StepReport>) {
        let steps = step_sequence(self.kind);
        let total = steps.len();
        let mut reports = Vec::with_capacity(total);

        for (index, spec) in steps.iter().enumerate() {
            let step_index = index + 1;
            let name = spec.kind.name();
            let ctx = StepCtx::new(self.run_tag.as_str(), self.kind, step_index, total, name);

            info!("[STEP {}/{}] ▶ {}", step_index, total, name);
            let started = Instant::now();

            match executor.execute(spec.kind, &ctx).await {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    info!(
                        "[STEP {}/{}] ✓ {} (耗时 {:.1}s)",
                        step_index,
                        total,
                        name,
                        elapsed.as_secs_f64()
                    );
                    reports.push(StepReport {
                        kind: spec.kind,
                        ok: true,
                        elapsed,
                        error: None,
                    });
                }
                Err(e) => {
                    let elapsed = started.elapsed();
                    reports.push(StepReport {
                        kind: spec.kind,
                        ok: false,
                        elapsed,
                        error: Some(e.to_string()),
                    });
                    match spec.policy {
                        FailurePolicy::Abort => {
                            error!("[STEP {}/{}] ✗ {}: {}", step_index, total, name, e);
                            error!(
                                "{} 工作流 {} 失败于步骤 {} ({})",
                                RUN_FAIL_MARKER, self.kind, step_index, name
                            );
                            return (RunOutcome::Failed, reports);
                        }
                        FailurePolicy::Tolerate => {
                            warn!(
                                "[STEP {}/{}] ⚠️ {} 失败，按步骤策略继续: {}",
                                step_index, total, name, e
                            );
                        }
                    }
                }
            }
        }

        info!("{} 工作流 {} 完成", RUN_OK_MARKER, self.kind);
        (RunOutcome::Succeeded, reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    /// 脚本化执行器：按步骤种类决定成败，并记录执行顺序
    struct ScriptedExecutor {
        fail_on: Vec<StepKind>,
        executed: Vec<StepKind>,
    }

    impl ScriptedExecutor {
        fn new(fail_on: Vec<StepKind>) -> Self {
            Self {
                fail_on,
                executed: Vec::new(),
            }
        }
    }

    impl StepExecutor for ScriptedExecutor {
        async fn execute(&mut self, step: StepKind, _ctx: &StepCtx) -> crate::error::Result<()> {
            self.executed.push(step);
            if self.fail_on.contains(&step) {
                Err(AppError::other(format!("步骤 {} 被脚本判为失败", step.name())))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let runner = WorkflowRunner::new(WorkflowKind::Partial, "test");
        let mut executor = ScriptedExecutor::new(vec![]);

        let (outcome, reports) = runner.run(&mut executor).await;
        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.ok));
    }

    #[tokio::test]
    async fn test_step2_failure_skips_step3() {
        let runner = WorkflowRunner::new(WorkflowKind::Partial, "test");
        let mut executor = ScriptedExecutor::new(vec![StepKind::FetchForm]);

        let (outcome, reports) = runner.run(&mut executor).await;
        assert_eq!(outcome, RunOutcome::Failed);

        // 只执行了步骤 1（成功）和步骤 2（失败），步骤 3 没碰
        assert_eq!(
            executor.executed,
            vec![StepKind::DriveBrowser, StepKind::FetchForm]
        );
        assert_eq!(reports.len(), 2);
        assert!(reports[0].ok);
        assert!(!reports[1].ok);
        assert!(reports[1].error.as_deref().unwrap().contains("fetch-form"));
    }

    #[tokio::test]
    async fn test_first_step_failure_aborts_immediately() {
        let runner = WorkflowRunner::new(WorkflowKind::Complete, "test");
        let mut executor = ScriptedExecutor::new(vec![StepKind::DriveBrowser]);

        let (outcome, reports) = runner.run(&mut executor).await;
        assert_eq!(outcome, RunOutcome::Failed);
        assert_eq!(reports.len(), 1);
        assert_eq!(executor.executed, vec![StepKind::DriveBrowser]);
    }

    #[tokio::test]
    async fn test_send_email_failure_is_tolerated() {
        let runner = WorkflowRunner::new(WorkflowKind::Complete, "test");
        let mut executor = ScriptedExecutor::new(vec![StepKind::SendEmail]);

        let (outcome, reports) = runner.run(&mut executor).await;
        // 发邮件失败只记日志，运行仍算完成
        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(reports.len(), 4);
        assert!(!reports[3].ok);
    }
}
