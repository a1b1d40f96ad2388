//! SMTP email channel.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::warn;

use super::config::SmtpConfig;

#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("message build error: {0}")]
    Build(String),
    #[error("smtp error: {0}")]
    Transport(String),
}

impl EmailError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

/// Production sender over a STARTTLS SMTP relay.
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| EmailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("{e}")))?;

        let email = LettreMessage::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        (|| async {
            self.mailer
                .send(email.clone())
                .await
                .map(|_| ())
                .map_err(|e| EmailError::Transport(e.to_string()))
        })
        .retry(
            &ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30))
                .with_max_times(3)
                .with_jitter(),
        )
        .when(|e: &EmailError| e.should_retry())
        .notify(|e, dur| {
            warn!(
                "SMTP send failed, retrying after {:.2}s: {}",
                dur.as_secs_f64(),
                e
            )
        })
        .await
    }
}
