use std::{sync::Arc, time::Duration};

use db::DBService;
use server::{AppState, app_router};
use services::services::{
    assignment_expiry::AssignmentExpiryService,
    config::Config,
    email::{EmailSender, SmtpEmailSender},
    notification::Notifier,
    sms::{HttpSmsSender, SmsSender},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::logging::init("info,sqlx=warn");

    let config = Config::from_env();

    let db = DBService::new(&config.database_url).await?;

    let email: Option<Arc<dyn EmailSender>> = match &config.smtp {
        Some(smtp) => Some(Arc::new(SmtpEmailSender::new(smtp)?)),
        None => {
            warn!("SMTP not configured - email channel disabled");
            None
        }
    };

    let sms: Option<Arc<dyn SmsSender>> = match &config.sms {
        Some(sms) => Some(Arc::new(HttpSmsSender::new(sms)?)),
        None => {
            warn!("SMS provider not configured - sms channel disabled");
            None
        }
    };

    if config.admin_token.is_empty() {
        warn!("ADMIN_TOKEN not set - admin endpoints are disabled");
    }

    let notifier = Notifier::new(db.pool.clone(), email, sms, config.webhook_url.clone());

    AssignmentExpiryService::spawn(
        db.clone(),
        notifier.clone(),
        Duration::from_secs(config.expiry_poll_seconds),
        config.offer_ttl_minutes,
        config.max_assignments_per_lead,
    )
    .await;

    let state = AppState {
        db,
        notifier,
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app_router(state)).await?;

    Ok(())
}
