//! Environment-driven runtime configuration.

use std::env;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub admin_token: String,
    pub max_assignments_per_lead: i64,
    pub offer_ttl_minutes: i64,
    pub expiry_poll_seconds: u64,
    pub smtp: Option<SmtpConfig>,
    pub sms: Option<SmsConfig>,
    pub webhook_url: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Read configuration from the environment. Channel blocks (SMTP, SMS)
    /// are optional: a missing block disables that channel rather than
    /// failing startup.
    pub fn from_env() -> Self {
        let smtp = match (env::var("SMTP_HOST"), env::var("SMTP_USERNAME")) {
            (Ok(host), Ok(username)) => Some(SmtpConfig {
                host,
                port: env_or("SMTP_PORT", "587").parse().unwrap_or(587),
                username,
                password: env_or("SMTP_PASSWORD", ""),
                from_address: env_or("SMTP_FROM_ADDRESS", "noreply@servicesartisans.fr"),
                from_name: env_or("SMTP_FROM_NAME", "ServicesArtisans"),
            }),
            _ => None,
        };

        let sms = match (env::var("SMS_API_URL"), env::var("SMS_API_KEY")) {
            (Ok(api_url), Ok(api_key)) => Some(SmsConfig {
                api_url,
                api_key,
                sender: env_or("SMS_SENDER", "SrvArtisans"),
            }),
            _ => None,
        };

        Self {
            database_url: env_or("DATABASE_URL", "sqlite:services_artisans.db"),
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:3001"),
            admin_token: env_or("ADMIN_TOKEN", ""),
            max_assignments_per_lead: env_or("MAX_ASSIGNMENTS_PER_LEAD", "3")
                .parse()
                .unwrap_or(3),
            offer_ttl_minutes: env_or("OFFER_TTL_MINUTES", "2880").parse().unwrap_or(2880),
            expiry_poll_seconds: env_or("EXPIRY_POLL_SECONDS", "60").parse().unwrap_or(60),
            smtp,
            sms,
            webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
        }
    }
}
