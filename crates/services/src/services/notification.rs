//! Multi-channel notification fan-out.
//!
//! Idempotency is delegated entirely to the database: every send is claimed
//! first as a `notification_deliveries` row, and the UNIQUE constraint on
//! (event_id, channel, recipient) turns any second claim into a skip. There
//! is no in-process coordination.

use std::{sync::Arc, time::Duration};

use db::models::notification::{Notification, NotificationChannel, NotificationDelivery};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{email::EmailSender, sms::SmsSender, templates::NotificationEvent};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Per-event tallies returned to callers and to the admin replay endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct DeliveryReport {
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[derive(Clone)]
pub struct Notifier {
    pool: SqlitePool,
    email: Option<Arc<dyn EmailSender>>,
    sms: Option<Arc<dyn SmsSender>>,
    webhook_url: Option<String>,
    http: reqwest::Client,
}

impl Notifier {
    pub fn new(
        pool: SqlitePool,
        email: Option<Arc<dyn EmailSender>>,
        sms: Option<Arc<dyn SmsSender>>,
        webhook_url: Option<String>,
    ) -> Self {
        Self {
            pool,
            email,
            sms,
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    fn channel_available(&self, channel: NotificationChannel) -> bool {
        match channel {
            NotificationChannel::Email => self.email.is_some(),
            NotificationChannel::Sms => self.sms.is_some(),
            NotificationChannel::InApp => true,
            NotificationChannel::Webhook => self.webhook_url.is_some(),
        }
    }

    /// Fan an event out to every configured (channel, recipient) tuple.
    ///
    /// Tuples already recorded for the event are skipped; send failures are
    /// recorded on the delivery row and never propagate to the caller's
    /// primary write.
    pub async fn dispatch_event(
        &self,
        event: &NotificationEvent,
    ) -> Result<DeliveryReport, NotificationError> {
        let event_id = event.event_id();
        let subject = event.subject();
        let body = event.body();

        let mut targets = event.recipients();
        if let Some(url) = &self.webhook_url {
            targets.push((NotificationChannel::Webhook, url.clone()));
        }

        let mut report = DeliveryReport::default();
        for (channel, recipient) in targets {
            let Some(delivery) = NotificationDelivery::claim(
                &self.pool,
                Uuid::new_v4(),
                &event_id,
                channel,
                &recipient,
                &subject,
                &body,
            )
            .await?
            else {
                debug!(%event_id, %channel, "delivery already recorded, skipping");
                report.skipped += 1;
                continue;
            };

            // Unconfigured channels leave a skipped row so the tuple is
            // still visible in the admin delivery log.
            if !self.channel_available(channel) {
                debug!(%event_id, %channel, "channel not configured, skipping");
                NotificationDelivery::mark_skipped(
                    &self.pool,
                    delivery.id,
                    "channel not configured",
                )
                .await?;
                report.skipped += 1;
                continue;
            }

            self.attempt(&mut report, &delivery).await?;
        }

        info!(
            %event_id,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            "notification fan-out complete"
        );

        Ok(report)
    }

    /// Re-attempt an event's failed deliveries. Sent and skipped tuples are
    /// untouched.
    pub async fn replay_event(&self, event_id: &str) -> Result<DeliveryReport, NotificationError> {
        let reclaimed = NotificationDelivery::reclaim_failed(&self.pool, event_id).await?;

        let mut report = DeliveryReport::default();
        if reclaimed.is_empty() {
            debug!(%event_id, "no failed deliveries to replay");
            return Ok(report);
        }

        info!(%event_id, count = reclaimed.len(), "replaying failed deliveries");

        for delivery in &reclaimed {
            self.attempt(&mut report, delivery).await?;
        }

        Ok(report)
    }

    async fn attempt(
        &self,
        report: &mut DeliveryReport,
        delivery: &NotificationDelivery,
    ) -> Result<(), NotificationError> {
        match self.send(delivery).await {
            Ok(()) => {
                NotificationDelivery::mark_sent(&self.pool, delivery.id).await?;
                report.sent += 1;
            }
            Err(err) => {
                warn!(
                    event_id = %delivery.event_id,
                    channel = %delivery.channel,
                    error = %err,
                    "notification delivery failed"
                );
                NotificationDelivery::mark_failed(&self.pool, delivery.id, &err).await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn send(&self, delivery: &NotificationDelivery) -> Result<(), String> {
        match delivery.channel {
            NotificationChannel::Email => match &self.email {
                Some(sender) => sender
                    .send(&delivery.recipient, &delivery.subject, &delivery.body)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("email channel not configured".to_string()),
            },
            NotificationChannel::Sms => match &self.sms {
                Some(sender) => sender
                    .send(&delivery.recipient, &delivery.body)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("sms channel not configured".to_string()),
            },
            NotificationChannel::InApp => Notification::create(
                &self.pool,
                Uuid::new_v4(),
                &delivery.recipient,
                &delivery.subject,
                &delivery.body,
            )
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
            NotificationChannel::Webhook => {
                let kind = delivery.event_id.split(':').next().unwrap_or_default();
                let payload = serde_json::json!({
                    "kind": kind,
                    "event_id": delivery.event_id,
                    "subject": delivery.subject,
                    "body": delivery.body,
                });
                self.http
                    .post(&delivery.recipient)
                    .timeout(Duration::from_secs(15))
                    .json(&payload)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use db::{
        DBService,
        models::{
            artisan::{Artisan, ServiceCategory},
            lead::{Lead, LeadStatus},
            notification::DeliveryStatus,
        },
    };

    use super::*;
    use crate::services::{email::EmailError, sms::SmsError};

    struct MockEmailSender {
        sent: AtomicU32,
        fail_times: AtomicU32,
    }

    impl MockEmailSender {
        fn new(fail_times: u32) -> Arc<Self> {
            Arc::new(Self {
                sent: AtomicU32::new(0),
                fail_times: AtomicU32::new(fail_times),
            })
        }
    }

    #[async_trait]
    impl EmailSender for MockEmailSender {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), EmailError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(EmailError::Transport("mock smtp down".to_string()));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockSmsSender {
        sent: AtomicU32,
    }

    impl MockSmsSender {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl SmsSender for MockSmsSender {
        async fn send(&self, _to: &str, _body: &str) -> Result<(), SmsError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_artisan(phone: Option<&str>) -> Artisan {
        Artisan {
            id: Uuid::new_v4(),
            company_name: "Dubois Plomberie".to_string(),
            contact_name: "Jean Dubois".to_string(),
            email: "contact@dubois-plomberie.fr".to_string(),
            phone: phone.map(|p| p.to_string()),
            city: "Lyon".to_string(),
            department: "69".to_string(),
            verified: true,
            active: true,
            rating_avg: Some(4.5),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_lead() -> Lead {
        let id = Uuid::new_v4();
        Lead {
            id,
            reference: Lead::new_reference(id),
            category: ServiceCategory::Plumbing,
            description: "Fuite sous l'évier de la cuisine".to_string(),
            city: "Lyon".to_string(),
            postal_code: "69003".to_string(),
            department: "69".to_string(),
            budget_cents: Some(25_000),
            client_name: "Marie Martin".to_string(),
            client_email: "marie.martin@example.fr".to_string(),
            client_phone: None,
            status: LeadStatus::Received,
            dispatched_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn assigned_event(phone: Option<&str>) -> NotificationEvent {
        NotificationEvent::LeadAssigned {
            assignment_id: Uuid::new_v4(),
            lead: sample_lead(),
            artisan: sample_artisan(phone),
        }
    }

    #[test]
    fn test_event_id_is_deterministic() {
        let event = assigned_event(None);
        assert_eq!(event.event_id(), event.event_id());
        assert!(event.event_id().starts_with("lead_assigned:"));
    }

    #[tokio::test]
    async fn test_fan_out_is_idempotent() {
        let db = DBService::new_in_memory().await.unwrap();
        let email = MockEmailSender::new(0);
        let sms = MockSmsSender::new();
        let notifier = Notifier::new(
            db.pool.clone(),
            Some(email.clone()),
            Some(sms.clone()),
            None,
        );

        let event = assigned_event(Some("+33612345678"));

        let first = notifier.dispatch_event(&event).await.unwrap();
        assert_eq!(first.sent, 3); // email + in_app + sms
        assert_eq!(first.skipped, 0);

        let second = notifier.dispatch_event(&event).await.unwrap();
        assert_eq!(second.sent, 0);
        assert_eq!(second.skipped, 3);

        // The unique constraint kept each channel at a single send.
        assert_eq!(email.sent.load(Ordering::SeqCst), 1);
        assert_eq!(sms.sent.load(Ordering::SeqCst), 1);

        let deliveries = NotificationDelivery::find_by_event(&db.pool, &event.event_id())
            .await
            .unwrap();
        assert_eq!(deliveries.len(), 3);
        assert!(deliveries.iter().all(|d| d.status == DeliveryStatus::Sent));
    }

    #[tokio::test]
    async fn test_failed_delivery_recorded_and_replayed() {
        let db = DBService::new_in_memory().await.unwrap();
        let email = MockEmailSender::new(1); // first email attempt fails
        let notifier = Notifier::new(db.pool.clone(), Some(email.clone()), None, None);

        let event = assigned_event(None);
        let report = notifier.dispatch_event(&event).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.sent, 1); // in_app still went through

        let deliveries = NotificationDelivery::find_by_event(&db.pool, &event.event_id())
            .await
            .unwrap();
        let failed: Vec<_> = deliveries
            .iter()
            .filter(|d| d.status == DeliveryStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].channel, NotificationChannel::Email);
        assert!(failed[0].error.is_some());

        // Replay touches only the failed tuple.
        let replay = notifier.replay_event(&event.event_id()).await.unwrap();
        assert_eq!(replay.sent, 1);
        assert_eq!(replay.failed, 0);
        assert_eq!(email.sent.load(Ordering::SeqCst), 1);

        let deliveries = NotificationDelivery::find_by_event(&db.pool, &event.event_id())
            .await
            .unwrap();
        assert!(deliveries.iter().all(|d| d.status == DeliveryStatus::Sent));

        // Replaying a fully-sent event is a no-op.
        let replay = notifier.replay_event(&event.event_id()).await.unwrap();
        assert_eq!(replay.sent, 0);
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_recorded_as_skipped() {
        let db = DBService::new_in_memory().await.unwrap();
        let email = MockEmailSender::new(0);
        let notifier = Notifier::new(db.pool.clone(), Some(email.clone()), None, None);

        // Artisan has a phone but no SMS sender is configured.
        let event = assigned_event(Some("+33612345678"));
        let report = notifier.dispatch_event(&event).await.unwrap();
        assert_eq!(report.sent, 2); // email + in_app
        assert_eq!(report.skipped, 1);

        let deliveries = NotificationDelivery::find_by_event(&db.pool, &event.event_id())
            .await
            .unwrap();
        let sms = deliveries
            .iter()
            .find(|d| d.channel == NotificationChannel::Sms)
            .unwrap();
        assert_eq!(sms.status, DeliveryStatus::Skipped);
        assert_eq!(sms.error.as_deref(), Some("channel not configured"));

        // Skipped rows are terminal: replay ignores them.
        let replay = notifier.replay_event(&event.event_id()).await.unwrap();
        assert_eq!(replay.sent, 0);
    }

    #[tokio::test]
    async fn test_in_app_delivery_lands_in_inbox() {
        let db = DBService::new_in_memory().await.unwrap();
        let notifier = Notifier::new(db.pool.clone(), None, None, None);

        let artisan = sample_artisan(None);
        let event = NotificationEvent::LeadAssigned {
            assignment_id: Uuid::new_v4(),
            lead: sample_lead(),
            artisan: artisan.clone(),
        };
        notifier.dispatch_event(&event).await.unwrap();

        let inbox = Notification::find_for_recipient(
            &db.pool,
            &format!("artisan:{}", artisan.id),
            false,
            10,
            0,
        )
        .await
        .unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(!inbox[0].read);
        assert!(inbox[0].title.contains("demande de devis"));
    }
}
