//! 邮件发送服务 - 业务能力层
//!
//! 只负责"带附件发一封邮件"能力，不关心流程
//!
//! 对运行器来说这是 fire-and-forget：发送失败只记日志，
//! 不会反过来推翻前面步骤的成果。

use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{EmailError, Result};

/// 邮件发送服务
pub struct EmailSender {
    smtp_server: String,
    smtp_port: u16,
    username: String,
    password: String,
}

impl EmailSender {
    /// 创建新的邮件发送服务
    pub fn new(config: &Config) -> Self {
        Self {
            smtp_server: config.smtp_server.clone(),
            smtp_port: config.smtp_port,
            username: config.smtp_username.clone(),
            password: config.smtp_password.clone(),
        }
    }

    /// 发送带附件的邮件
    ///
    /// # 参数
    /// - `to`: 收件人地址
    /// - `subject`: 主题
    /// - `body`: 正文（纯文本）
    /// - `attachment_name`: 附件文件名
    /// - `attachment`: 附件字节流
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment_name: &str,
        attachment: Vec<u8>,
    ) -> Result<()> {
        info!("📧 正在发送邮件到: {}", to);
        debug!("主题: {}", subject);

        let message = build_message(
            &self.username,
            to,
            subject,
            body,
            attachment_name,
            attachment,
        )?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_server)
            .map_err(|e| EmailError::SendFailed {
                detail: format!("SMTP 传输配置失败: {}", e),
            })?
            .port(self.smtp_port)
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed {
                detail: e.to_string(),
            })?;

        info!("✅ 邮件发送成功");
        Ok(())
    }
}

/// 构建 MIME 邮件（正文 + PDF 附件）
fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
    attachment_name: &str,
    attachment: Vec<u8>,
) -> Result<Message, EmailError> {
    let from: Mailbox = from.parse().map_err(|e| EmailError::BuildFailed {
        detail: format!("发件地址无效: {}", e),
    })?;
    let to: Mailbox = to.parse().map_err(|e| EmailError::BuildFailed {
        detail: format!("收件地址无效: {}", e),
    })?;
    let content_type =
        ContentType::parse("application/pdf").map_err(|e| EmailError::BuildFailed {
            detail: format!("附件类型无效: {}", e),
        })?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body.to_string()))
                .singlepart(
                    Attachment::new(attachment_name.to_string()).body(attachment, content_type),
                ),
        )
        .map_err(|e| EmailError::BuildFailed {
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_message_with_attachment() {
        let message = build_message(
            "agent@example.com",
            "recipient@example.com",
            "AI-Filled TREC Form 10-6",
            "The filled form is attached.",
            "filled_10-6_form.pdf",
            b"%PDF-1.5 fake".to_vec(),
        )
        .unwrap();

        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("Subject: AI-Filled TREC Form 10-6"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("filled_10-6_form.pdf"));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let err = build_message(
            "not an address",
            "recipient@example.com",
            "s",
            "b",
            "a.pdf",
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EmailError::BuildFailed { .. }));
    }
}
