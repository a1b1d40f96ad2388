//! Background service for expiring unanswered offers and redispatching
//! their leads.

use std::time::Duration;

use db::{
    DBService,
    models::{
        artisan::Artisan,
        assignment::LeadAssignment,
        dispatch_log::{DispatchAction, DispatchLog},
        lead::Lead,
    },
};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use super::{dispatch::DispatchService, notification::Notifier, templates::NotificationEvent};

#[derive(Debug, Error)]
pub enum AssignmentExpiryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Background service turning stale offers into expired assignments.
pub struct AssignmentExpiryService {
    db: DBService,
    notifier: Notifier,
    poll_interval: Duration,
    offer_ttl_minutes: i64,
    max_assignments_per_lead: i64,
}

impl AssignmentExpiryService {
    /// Spawn the background expiry service.
    pub async fn spawn(
        db: DBService,
        notifier: Notifier,
        poll_interval: Duration,
        offer_ttl_minutes: i64,
        max_assignments_per_lead: i64,
    ) -> tokio::task::JoinHandle<()> {
        let service = Self {
            db,
            notifier,
            poll_interval,
            offer_ttl_minutes,
            max_assignments_per_lead,
        };
        tokio::spawn(async move {
            service.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting assignment expiry service with interval {:?}, offer ttl: {} min",
            self.poll_interval, self.offer_ttl_minutes
        );

        let mut interval = interval(self.poll_interval);

        loop {
            interval.tick().await;
            if let Err(e) = Self::run_once(
                &self.db.pool,
                &self.notifier,
                self.offer_ttl_minutes,
                self.max_assignments_per_lead,
            )
            .await
            {
                error!("Error expiring stale offers: {}", e);
            }
        }
    }

    /// One expiry pass. Returns the number of offers expired.
    pub async fn run_once(
        pool: &SqlitePool,
        notifier: &Notifier,
        ttl_minutes: i64,
        max_assignments: i64,
    ) -> Result<usize, AssignmentExpiryError> {
        let stale = LeadAssignment::find_expired(pool, ttl_minutes).await?;

        if stale.is_empty() {
            debug!("expiry: no stale offers");
            return Ok(0);
        }

        let mut expired_count = 0;
        for assignment in stale {
            // The artisan may have answered between the query and this update.
            if LeadAssignment::expire(pool, assignment.id).await? == 0 {
                continue;
            }
            expired_count += 1;

            info!(
                assignment_id = %assignment.id,
                lead_id = %assignment.lead_id,
                "expiry: offer lapsed"
            );

            DispatchLog::create(
                pool,
                assignment.lead_id,
                DispatchAction::Expired,
                Some(format!(
                    "offer {} to artisan {} lapsed after {} min",
                    assignment.id, assignment.artisan_id, ttl_minutes
                )),
            )
            .await?;

            let lead = Lead::find_by_id(pool, assignment.lead_id).await?;
            let artisan = Artisan::find_by_id(pool, assignment.artisan_id).await?;
            if let (Some(lead), Some(artisan)) = (lead, artisan) {
                let event = NotificationEvent::AssignmentExpired {
                    assignment_id: assignment.id,
                    lead,
                    artisan,
                };
                if let Err(e) = notifier.dispatch_event(&event).await {
                    warn!(assignment_id = %assignment.id, error = %e, "expiry notification failed");
                }
            }

            // Free slot: hand the lead to the next eligible artisan.
            if let Err(e) =
                DispatchService::dispatch_lead(pool, notifier, assignment.lead_id, max_assignments)
                    .await
            {
                warn!(lead_id = %assignment.lead_id, error = %e, "expiry: redispatch failed");
            }
        }

        Ok(expired_count)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        artisan::{CreateArtisan, ServiceCategory},
        assignment::AssignmentStatus,
        lead::CreateLead,
    };
    use uuid::Uuid;

    use super::*;

    async fn insert_artisan(pool: &SqlitePool, email: &str) -> Artisan {
        let artisan = Artisan::create(
            pool,
            &CreateArtisan {
                company_name: format!("Entreprise {email}"),
                contact_name: "Contact".to_string(),
                email: email.to_string(),
                phone: None,
                city: "Lyon".to_string(),
                department: "69".to_string(),
                skills: vec![ServiceCategory::Plumbing],
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        Artisan::set_skills(pool, artisan.id, &[ServiceCategory::Plumbing])
            .await
            .unwrap();
        Artisan::set_verified(pool, artisan.id, true).await.unwrap();
        artisan
    }

    #[tokio::test]
    async fn test_stale_offer_expires_and_lead_is_redispatched() {
        let db = DBService::new_in_memory().await.unwrap();
        let notifier = Notifier::new(db.pool.clone(), None, None, None);

        let first = insert_artisan(&db.pool, "a@ex.fr").await;
        let lead = Lead::create(
            &db.pool,
            &CreateLead {
                category: ServiceCategory::Plumbing,
                description: "Fuite".to_string(),
                city: "Lyon".to_string(),
                postal_code: "69001".to_string(),
                budget_cents: None,
                client_name: "Client".to_string(),
                client_email: "client@example.fr".to_string(),
                client_phone: None,
            },
            Uuid::new_v4(),
            "69",
        )
        .await
        .unwrap();

        DispatchService::dispatch_lead(&db.pool, &notifier, lead.id, 1)
            .await
            .unwrap();

        // Age the offer past any TTL.
        sqlx::query(
            "UPDATE lead_assignments SET offered_at = datetime('now', '-3 days') WHERE lead_id = $1",
        )
        .bind(lead.id)
        .execute(&db.pool)
        .await
        .unwrap();

        let second = insert_artisan(&db.pool, "b@ex.fr").await;

        let expired = AssignmentExpiryService::run_once(&db.pool, &notifier, 60, 1)
            .await
            .unwrap();
        assert_eq!(expired, 1);

        let assignments = LeadAssignment::find_by_lead(&db.pool, lead.id).await.unwrap();
        assert_eq!(assignments.len(), 2);

        let by_artisan = |id| {
            assignments
                .iter()
                .find(|a| a.artisan_id == id)
                .unwrap()
                .status
        };
        assert_eq!(by_artisan(first.id), AssignmentStatus::Expired);
        assert_eq!(by_artisan(second.id), AssignmentStatus::Offered);
    }

    #[tokio::test]
    async fn test_fresh_offers_are_untouched() {
        let db = DBService::new_in_memory().await.unwrap();
        let notifier = Notifier::new(db.pool.clone(), None, None, None);

        insert_artisan(&db.pool, "a@ex.fr").await;
        let lead = Lead::create(
            &db.pool,
            &CreateLead {
                category: ServiceCategory::Plumbing,
                description: "Fuite".to_string(),
                city: "Lyon".to_string(),
                postal_code: "69001".to_string(),
                budget_cents: None,
                client_name: "Client".to_string(),
                client_email: "client@example.fr".to_string(),
                client_phone: None,
            },
            Uuid::new_v4(),
            "69",
        )
        .await
        .unwrap();

        DispatchService::dispatch_lead(&db.pool, &notifier, lead.id, 1)
            .await
            .unwrap();

        let expired = AssignmentExpiryService::run_once(&db.pool, &notifier, 60, 1)
            .await
            .unwrap();
        assert_eq!(expired, 0);
    }
}
