//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源，只向上暴露能力：
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `PdfFormBackend` / `LopdfBackend` - 文档协作方，提供表单字段的读写能力

pub mod js_executor;
pub mod pdf_backend;

pub use js_executor::JsExecutor;
pub use pdf_backend::{LopdfBackend, PdfFormBackend, RawField, RawFieldKind};
