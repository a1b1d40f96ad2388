//! SMS channel over the provider's HTTP JSON API.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use super::config::SmsConfig;

#[derive(Debug, Clone, Error)]
pub enum SmsError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
}

impl SmsError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            Self::InvalidApiKey => false,
        }
    }
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError>;
}

#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    sender: &'a str,
    to: &'a str,
    text: &'a str,
}

/// Production sender posting to the SMS vendor endpoint.
pub struct HttpSmsSender {
    http: Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl HttpSmsSender {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("services-artisans/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SmsError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        })
    }

    async fn post_sms(&self, to: &str, text: &str) -> Result<(), SmsError> {
        let request = SmsRequest {
            sender: &self.sender,
            to,
            text,
        };

        let res = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(SmsError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(SmsError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(SmsError::Http { status, body })
            }
        }
    }
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        (|| async { self.post_sms(to, body).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &SmsError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "SMS send failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }
}
