//! Outbound email for invites, credentials, reset codes and booking notices.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail delivery is not configured")]
    NotConfigured,

    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<(), MailError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, MailError> {
        if !config.is_mail_configured() {
            return Err(MailError::NotConfigured);
        }

        let from: Mailbox = config
            .mail_from
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.mail_from.clone()))?;

        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.mail_host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.mail_port);

        let builder = if config.mail_user.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.mail_user.clone(),
                config.mail_pass.clone(),
            ))
        };

        info!(host = %config.mail_host, port = config.mail_port, "SMTP mailer initialized");

        Ok(Self {
            transport: Arc::new(builder.build()),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<(), MailError> {
        let to_addr: Mailbox = to
            .parse()
            .map_err(|_| MailError::InvalidAddress(to.to_string()))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to_addr)
            .subject(subject);

        let message = match html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            )),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.to_string()),
        }
        .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        debug!(subject, "Email sent");
        Ok(())
    }
}

/// Used when SMTP settings are absent. Every send reports `NotConfigured`.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_mail(&self, _to: &str, subject: &str, _text: &str, _html: Option<&str>) -> Result<(), MailError> {
        warn!(subject, "Mail delivery disabled, message dropped");
        Err(MailError::NotConfigured)
    }
}

pub fn mailer_from_config(config: &AppConfig) -> Arc<dyn Mailer> {
    match SmtpMailer::from_config(config) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            debug!("Falling back to disabled mailer: {}", e);
            Arc::new(DisabledMailer)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// In-memory mailer for tests. Records every message, optionally failing each send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, to: &str, subject: &str, text: &str, _html: Option<&str>) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                text: text.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smtp_requires_configuration() {
        let config = AppConfig::default();
        assert!(matches!(SmtpMailer::from_config(&config), Err(MailError::NotConfigured)));
    }

    #[test]
    fn invalid_from_address_is_reported() {
        let config = AppConfig {
            mail_host: "smtp.clinic.test".to_string(),
            mail_from: "not an address".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(SmtpMailer::from_config(&config), Err(MailError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn disabled_mailer_reports_not_configured() {
        let mailer = mailer_from_config(&AppConfig::default());
        let result = mailer.send_mail("a@b.c", "Hi", "body", None).await;
        assert!(matches!(result, Err(MailError::NotConfigured)));
    }

    #[tokio::test]
    async fn recording_mailer_keeps_messages() {
        let mailer = RecordingMailer::new();
        mailer.send_mail("a@b.c", "Subject", "Body", Some("<p>Body</p>")).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.sent()[0].subject, "Subject");

        let failing = RecordingMailer::failing();
        assert!(failing.send_mail("a@b.c", "S", "B", None).await.is_err());
    }
}
