//! 应用程序错误类型
//!
//! 错误分类：
//! - `DocumentError` - 文档（PDF 表单）读写错误
//! - `GenerationError` - 数据生成服务错误
//! - `FillError` - 表单填充错误（含必填字段缺失）
//! - `ProcessError` - 子进程管理错误
//! - `BrowserError` - 浏览器自动化错误
//! - `EmailError` - 邮件发送错误
//! - `ConfigError` - 配置加载错误
//!
//! 生成服务的瞬时错误（超时等）在 `DataGenerator` 内部重试并兜底，
//! 不会越过生成器边界；其余错误都会中止当前工作流步骤。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 文档相关错误
    #[error("文档错误: {0}")]
    Document(#[from] DocumentError),
    /// 数据生成服务错误
    #[error("数据生成错误: {0}")]
    Generation(#[from] GenerationError),
    /// 表单填充错误
    #[error("填充错误: {0}")]
    Fill(#[from] FillError),
    /// 子进程管理错误
    #[error("进程错误: {0}")]
    Process(#[from] ProcessError),
    /// 未知的运行记录标识
    #[error("未找到运行记录: pid={0}")]
    NotFound(u32),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 邮件发送错误
    #[error("邮件错误: {0}")]
    Email(#[from] EmailError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 文档（PDF 表单）读写错误
#[derive(Debug, Error)]
pub enum DocumentError {
    /// 文档无法读取
    #[error("无法读取文档 ({path}): {source}")]
    Unreadable {
        path: String,
        #[source]
        source: lopdf::Error,
    },
    /// 文档结构损坏（部分字段不可读也按整体损坏处理）
    #[error("文档损坏 ({path}): {detail}")]
    Corrupt { path: String, detail: String },
    /// 文档不含可填写的表单
    #[error("文档不含可填写表单: {path}")]
    NoForm { path: String },
    /// 获取源文档失败（下载或本地读取）
    #[error("获取源文档失败 ({path}): {detail}")]
    FetchFailed { path: String, detail: String },
    /// 写入字段失败
    #[error("写入字段 '{name}' 失败: {detail}")]
    WriteFailed { name: String, detail: String },
}

/// 数据生成服务错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 生成服务调用失败（已耗尽重试）
    #[error("生成服务调用失败 (已尝试 {attempts} 次): {detail}")]
    ServiceFailed { attempts: usize, detail: String },
    /// 响应无法解析为字段值表
    #[error("生成服务响应无法解析: {detail}")]
    MalformedResponse { detail: String },
    /// 返回内容为空
    #[error("生成服务返回内容为空")]
    EmptyResponse,
}

/// 表单填充错误
#[derive(Debug, Error)]
pub enum FillError {
    /// 必填字段未获得有效值
    #[error("必填字段未获得有效值: {}", .missing.join(", "))]
    Incomplete { missing: Vec<String> },
}

/// 子进程管理错误
#[derive(Debug, Error)]
pub enum ProcessError {
    /// 启动子进程失败
    #[error("启动子进程失败: {source}")]
    SpawnFailed {
        #[source]
        source: std::io::Error,
    },
    /// 子进程没有返回 PID
    #[error("无法获取子进程 PID")]
    PidUnavailable,
    /// 发送终止信号失败
    #[error("终止进程 {pid} 失败: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
    /// 日志文件操作失败
    #[error("运行日志文件操作失败 ({path}): {source}")]
    LogFileFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 浏览器自动化错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {detail}")]
    ConnectionFailed { port: u16, detail: String },
    /// 启动浏览器失败
    #[error("启动浏览器失败: {detail}")]
    LaunchFailed { detail: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {detail}")]
    NavigationFailed { url: String, detail: String },
    /// 单个页面动作失败
    #[error("浏览器动作 '{action}' 失败: {detail}")]
    ActionFailed { action: String, detail: String },
}

/// 邮件发送错误
#[derive(Debug, Error)]
pub enum EmailError {
    /// 构建邮件失败（地址或附件无效）
    #[error("构建邮件失败: {detail}")]
    BuildFailed { detail: String },
    /// SMTP 发送失败
    #[error("发送邮件失败: {detail}")]
    SendFailed { detail: String },
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("无法读取配置文件 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ActionFailed {
            action: "cdp".to_string(),
            detail: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON 解析失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 包装任意错误信息
    pub fn other(msg: impl Into<String>) -> Self {
        AppError::Other(msg.into())
    }

    /// 创建文档损坏错误
    pub fn document_corrupt(path: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::Document(DocumentError::Corrupt {
            path: path.into(),
            detail: detail.into(),
        })
    }

    /// 创建浏览器动作失败错误
    pub fn browser_action_failed(action: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::Browser(BrowserError::ActionFailed {
            action: action.into(),
            detail: detail.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type Result<T, E = AppError> = std::result::Result<T, E>;
