//! # PDF Agent
//!
//! 一个用 AI 生成数据自动填写 PDF 表单的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `PdfFormBackend` - 文档协作方，提供表单字段读写能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只管一件事
//! - `FieldClassifier` - 字段语义分类能力
//! - `DataGenerator` - 批量生成字段值能力（带重试与兜底）
//! - `DocumentFiller` - 填充与完整性校验能力
//! - `EmailSender` - 带附件发邮件能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次运行"的完整步骤序列
//! - `StepCtx` - 上下文封装（运行标识 + 步骤位置）
//! - `WorkflowRunner` - 线性状态机（步骤按序执行，失败即终止）
//! - `FormFlow` - 真实步骤执行器（浏览器 → 表单 → 邮件）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/supervisor` - 进程监管器，管理子进程生命周期
//! - `orchestrator/run_table` - 运行状态表，pid → 记录的唯一映射
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{attach_or_launch, BrowserAction};
pub use config::Config;
pub use error::{AppError, Result};
pub use infrastructure::{JsExecutor, LopdfBackend, PdfFormBackend};
pub use models::{
    FieldCategory, FieldValue, FilledDocument, FormField, Provenance, RunState, RunStatus,
    WorkflowKind, WorkflowRun,
};
pub use orchestrator::Supervisor;
pub use workflow::{FormFlow, RunOutcome, StepCtx, WorkflowRunner};
