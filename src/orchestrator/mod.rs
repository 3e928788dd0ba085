//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把工作流作为独立子进程来管理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `run_table` - 运行状态表
//! - pid → WorkflowRun 的唯一映射（运行存活期间）
//! - 单把互斥锁串行化全部写入，避免 stop 和对账互相丢更新
//! - 容量满后淘汰最旧的已结束运行
//!
//! ### `supervisor` - 进程监管器
//! - start / stop / status / list 控制面（供上层 API 消费）
//! - 子进程日志重定向到独立文件并按需读取尾部
//! - 周期性对账：用 try_wait 核对子进程是否退出，
//!   防止子进程意外死亡后状态停留在 running
//!
//! ## 层次关系
//!
//! ```text
//! supervisor (管理 Vec<WorkflowRun>)
//!     ↓ 每个运行一个子进程
//! 运行器二进制 (workflow::WorkflowRunner)
//!     ↓
//! workflow::FormFlow (执行单个步骤)
//!     ↓
//! services (能力层：classify / generate / fill / email)
//!     ↓
//! infrastructure (基础设施：JsExecutor / PdfFormBackend)
//! ```
//!
//! ## 设计原则
//!
//! 1. **进程隔离**：子进程崩溃不影响监管器
//! 2. **非阻塞**：start 立即返回 pid，不等待工作流结束
//! 3. **对账兜底**：不只信子进程自报的完成，周期性核对退出状态
//! 4. **无业务逻辑**：只做调度和状态维护

pub mod run_table;
pub mod supervisor;

pub use run_table::RunTable;
pub use supervisor::Supervisor;
