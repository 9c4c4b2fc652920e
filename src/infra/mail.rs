//! Outgoing email.
//!
//! With SMTP configured, messages go out through lettre. Without it, or when
//! a send fails, the message is written to the log instead so development
//! flows (OTP codes, reset links) stay usable.

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::SmtpConfig;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Email delivery.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: EmailMessage) -> AppResult<()>;
}

fn log_email(from: &str, email: &EmailMessage) {
    tracing::info!(
        "=== EMAIL (not sent) ===\n\
         From: {}\n\
         To: {}\n\
         Subject: {}\n\
         Body:\n{}\n\
         ========================",
        from,
        email.to,
        email.subject,
        email.text
    );
}

/// Logs every message instead of sending it
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: EmailMessage) -> AppResult<()> {
        log_email(&self.from, &email);
        Ok(())
    }
}

/// SMTP delivery through a STARTTLS relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(host: &str, config: &SmtpConfig) -> AppResult<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::internal(format!("Invalid SMTP relay {}: {}", host, e)))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.user, &config.pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
        })
    }

    fn build_message(&self, email: &EmailMessage) -> AppResult<Message> {
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| AppError::internal(format!("Invalid sender address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::internal(format!("Invalid recipient address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| AppError::internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: EmailMessage) -> AppResult<()> {
        let sent = match self.build_message(&email) {
            Ok(message) => self
                .transport
                .send(message)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match sent {
            Ok(()) => {
                tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
            }
            Err(reason) => {
                tracing::warn!(to = %email.to, error = %reason, "SMTP send failed, logging email instead");
                log_email(&self.from, &email);
            }
        }
        Ok(())
    }
}

/// Pick SMTP delivery when a host is configured, the log mailer otherwise.
pub fn from_config(config: &SmtpConfig) -> Arc<dyn Mailer> {
    match config.host.as_deref() {
        Some(host) => match SmtpMailer::new(host, config) {
            Ok(mailer) => {
                tracing::info!(host = %host, port = config.port, "SMTP mailer configured");
                Arc::new(mailer)
            }
            Err(e) => {
                tracing::warn!(error = %e, "SMTP setup failed, emails will be logged");
                Arc::new(LogMailer::new(config.from.clone()))
            }
        },
        None => {
            tracing::warn!("SMTP not configured, emails will be logged instead of sent");
            Arc::new(LogMailer::new(config.from.clone()))
        }
    }
}
