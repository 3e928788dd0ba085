use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 浏览器调试端口（附着失败时回退为无头启动）
    pub browser_debug_port: u16,
    /// 表单介绍页 URL
    pub target_url: String,
    /// 空白表单 PDF 的下载 URL
    pub form_pdf_url: String,
    /// 本地空白表单路径（非空时优先于下载）
    pub form_pdf_path: String,
    /// 输出目录（填充后的 PDF、截图）
    pub output_dir: String,
    /// 填充后输出文件名
    pub filled_pdf_name: String,
    /// 运行日志目录
    pub log_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 数据生成服务配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 瞬时失败的最大重试次数
    pub gen_max_retries: usize,
    /// 重试间固定等待秒数
    pub gen_retry_backoff_secs: u64,
    // --- 邮件配置 ---
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_to: String,
    // --- 监管器配置 ---
    /// 运行器可执行文件（空串表示当前可执行文件）
    pub runner_program: String,
    /// 插在工作流种类参数之前的额外参数
    pub runner_args: Vec<String>,
    /// 状态表容量，超出后淘汰最旧的已结束运行
    pub max_tracked_runs: usize,
    /// 对账轮询间隔秒数
    pub reconcile_interval_secs: u64,
    /// status 返回的日志行数
    pub log_tail_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "https://www.trec.texas.gov/forms/addendum-sale-other-property-buyer"
                .to_string(),
            form_pdf_url: "https://www.trec.texas.gov/sites/default/files/pdf-forms/10-6.pdf"
                .to_string(),
            form_pdf_path: String::new(),
            output_dir: "output".to_string(),
            filled_pdf_name: "filled_10-6_form.pdf".to_string(),
            log_dir: "logs".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            gen_max_retries: 2,
            gen_retry_backoff_secs: 2,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            email_to: "recipient@example.com".to_string(),
            runner_program: String::new(),
            runner_args: Vec::new(),
            max_tracked_runs: 50,
            reconcile_interval_secs: 2,
            log_tail_lines: 200,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            form_pdf_url: std::env::var("FORM_PDF_URL").unwrap_or(default.form_pdf_url),
            form_pdf_path: std::env::var("FORM_PDF_PATH").unwrap_or(default.form_pdf_path),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            filled_pdf_name: std::env::var("FILLED_PDF_NAME").unwrap_or(default.filled_pdf_name),
            log_dir: std::env::var("LOG_DIR").unwrap_or(default.log_dir),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            gen_max_retries: std::env::var("GEN_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.gen_max_retries),
            gen_retry_backoff_secs: std::env::var("GEN_RETRY_BACKOFF_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.gen_retry_backoff_secs),
            smtp_server: std::env::var("SMTP_SERVER").unwrap_or(default.smtp_server),
            smtp_port: std::env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.smtp_port),
            smtp_username: std::env::var("SMTP_USERNAME").unwrap_or(default.smtp_username),
            smtp_password: std::env::var("SMTP_PASSWORD").unwrap_or(default.smtp_password),
            email_to: std::env::var("EMAIL_TO").unwrap_or(default.email_to),
            runner_program: std::env::var("RUNNER_PROGRAM").unwrap_or(default.runner_program),
            runner_args: default.runner_args,
            max_tracked_runs: std::env::var("MAX_TRACKED_RUNS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_tracked_runs),
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.reconcile_interval_secs),
            log_tail_lines: std::env::var("LOG_TAIL_LINES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.log_tail_lines),
        }
    }

    /// 从 TOML 文件加载配置，缺失的键使用默认值
    pub fn from_toml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_string(),
            source: e,
        })?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_string(),
            source: e,
        })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let config = Config::default();
        assert_eq!(config.gen_max_retries, 2);
        assert_eq!(config.gen_retry_backoff_secs, 2);
    }

    #[test]
    fn test_partial_toml_overlays_defaults() {
        let config: Config =
            toml::from_str("email_to = \"qa@example.com\"\nmax_tracked_runs = 3").unwrap();
        assert_eq!(config.email_to, "qa@example.com");
        assert_eq!(config.max_tracked_runs, 3);
        // 未出现的键保持默认
        assert_eq!(config.log_tail_lines, 200);
    }
}
