//! 步骤种类与步骤表
//!
//! 各工作流种类只在步骤组成上不同：种类 → 步骤表是一份数据，
//! 新增一种工作流只是加一行表，不需要新类型。

use serde::{Deserialize, Serialize};

use crate::models::WorkflowKind;

/// 步骤种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// 访问表单站点并截图
    DriveBrowser,
    /// 获取空白表单（下载或读本地文件）
    FetchForm,
    /// 分类 → 生成 → 填充，写出新文档
    FillForm,
    /// 把填好的表单作为附件发邮件
    SendEmail,
}

impl StepKind {
    /// 步骤名称（日志和状态使用）
    pub fn name(self) -> &'static str {
        match self {
            StepKind::DriveBrowser => "drive-browser",
            StepKind::FetchForm => "fetch-form",
            StepKind::FillForm => "fill-form",
            StepKind::SendEmail => "send-email",
        }
    }
}

/// 步骤失败策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// 失败即终止整个运行（默认）
    Abort,
    /// 失败只记日志，运行继续（发邮件是 fire-and-forget）
    Tolerate,
}

/// 步骤表条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
    pub kind: StepKind,
    pub policy: FailurePolicy,
}

const fn abort(kind: StepKind) -> StepSpec {
    StepSpec {
        kind,
        policy: FailurePolicy::Abort,
    }
}

const fn tolerate(kind: StepKind) -> StepSpec {
    StepSpec {
        kind,
        policy: FailurePolicy::Tolerate,
    }
}

const COMPLETE_STEPS: &[StepSpec] = &[
    abort(StepKind::DriveBrowser),
    abort(StepKind::FetchForm),
    abort(StepKind::FillForm),
    tolerate(StepKind::SendEmail),
];

const FILL_AND_SEND_STEPS: &[StepSpec] = &[
    abort(StepKind::FetchForm),
    abort(StepKind::FillForm),
    tolerate(StepKind::SendEmail),
];

const PARTIAL_STEPS: &[StepSpec] = &[
    abort(StepKind::DriveBrowser),
    abort(StepKind::FetchForm),
    abort(StepKind::FillForm),
];

/// 取某个工作流种类的有序步骤表
pub fn step_sequence(kind: WorkflowKind) -> &'static [StepSpec] {
    match kind {
        WorkflowKind::Complete => COMPLETE_STEPS,
        WorkflowKind::FillAndSend => FILL_AND_SEND_STEPS,
        WorkflowKind::Partial => PARTIAL_STEPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_tables_per_kind() {
        let complete: Vec<StepKind> = step_sequence(WorkflowKind::Complete)
            .iter()
            .map(|s| s.kind)
            .collect();
        assert_eq!(
            complete,
            vec![
                StepKind::DriveBrowser,
                StepKind::FetchForm,
                StepKind::FillForm,
                StepKind::SendEmail,
            ]
        );

        // partial 不发邮件
        let partial: Vec<StepKind> = step_sequence(WorkflowKind::Partial)
            .iter()
            .map(|s| s.kind)
            .collect();
        assert!(!partial.contains(&StepKind::SendEmail));

        // fill-and-send 不开浏览器
        let fill_and_send: Vec<StepKind> = step_sequence(WorkflowKind::FillAndSend)
            .iter()
            .map(|s| s.kind)
            .collect();
        assert!(!fill_and_send.contains(&StepKind::DriveBrowser));
    }

    #[test]
    fn test_only_send_email_is_tolerated() {
        for kind in WorkflowKind::all() {
            for spec in step_sequence(*kind) {
                if spec.kind == StepKind::SendEmail {
                    assert_eq!(spec.policy, FailurePolicy::Tolerate);
                } else {
                    assert_eq!(spec.policy, FailurePolicy::Abort);
                }
            }
        }
    }
}
