//! Lead dispatch: match a devis request against eligible artisans, write
//! assignment rows and fan out the notifications.

use db::models::{
    artisan::Artisan,
    assignment::LeadAssignment,
    dispatch_log::{DispatchAction, DispatchLog},
    lead::{Lead, LeadStatus},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{notification::Notifier, templates::NotificationEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("lead not found")]
    LeadNotFound,
    #[error("artisan not found")]
    ArtisanNotFound,
    #[error("lead is {0}, not dispatchable")]
    LeadNotDispatchable(LeadStatus),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DispatchOutcome {
    pub lead_id: Uuid,
    pub action: DispatchAction,
    pub assigned_artisan_ids: Vec<Uuid>,
}

pub struct DispatchService;

impl DispatchService {
    /// Match the lead against eligible artisans and offer it to up to
    /// `max_assignments` of them (counting offers still active).
    ///
    /// Safe to invoke repeatedly for the same lead: matching excludes
    /// already-assigned artisans and every notification is deduplicated by
    /// the delivery table's unique constraint. Notification failures are
    /// logged and recorded, never unwound into the assignment writes.
    pub async fn dispatch_lead(
        pool: &SqlitePool,
        notifier: &Notifier,
        lead_id: Uuid,
        max_assignments: i64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let lead = Lead::find_by_id(pool, lead_id)
            .await?
            .ok_or(DispatchError::LeadNotFound)?;

        if matches!(lead.status, LeadStatus::Closed | LeadStatus::Cancelled) {
            return Err(DispatchError::LeadNotDispatchable(lead.status));
        }

        let first_dispatch = lead.dispatched_at.is_none();

        // Client confirmation. Emitted on every pass; the deterministic
        // event id collapses redispatches onto the original delivery rows.
        if let Err(e) = notifier
            .dispatch_event(&NotificationEvent::LeadReceived { lead: lead.clone() })
            .await
        {
            warn!(lead_id = %lead.id, error = %e, "client confirmation notification failed");
        }

        let action = if first_dispatch {
            DispatchAction::Dispatched
        } else {
            DispatchAction::Redispatched
        };

        let active = LeadAssignment::count_active_for_lead(pool, lead_id).await?;
        let slots = (max_assignments - active).max(0);

        if slots == 0 {
            info!(lead_id = %lead.id, active, "dispatch: assignment cap reached");
            return Ok(DispatchOutcome {
                lead_id,
                action,
                assigned_artisan_ids: vec![],
            });
        }

        let eligible =
            Artisan::find_eligible_for_lead(pool, lead_id, lead.category, &lead.department, slots)
                .await?;

        if eligible.is_empty() {
            if active == 0 {
                Lead::update_status(pool, lead_id, LeadStatus::Unmatched).await?;
                DispatchLog::create(
                    pool,
                    lead_id,
                    DispatchAction::Unmatched,
                    Some(format!(
                        "no eligible artisan for {} in department {}",
                        lead.category, lead.department
                    )),
                )
                .await?;
                info!(lead_id = %lead.id, "dispatch: no eligible artisan");
                return Ok(DispatchOutcome {
                    lead_id,
                    action: DispatchAction::Unmatched,
                    assigned_artisan_ids: vec![],
                });
            }
            // Offers are still out; nothing new to add.
            return Ok(DispatchOutcome {
                lead_id,
                action,
                assigned_artisan_ids: vec![],
            });
        }

        let mut assigned = Vec::with_capacity(eligible.len());
        for artisan in eligible {
            let assignment = LeadAssignment::create(pool, Uuid::new_v4(), lead_id, artisan.id).await?;

            info!(
                lead_id = %lead.id,
                artisan_id = %artisan.id,
                assignment_id = %assignment.id,
                "dispatch: lead offered"
            );

            let event = NotificationEvent::LeadAssigned {
                assignment_id: assignment.id,
                lead: lead.clone(),
                artisan: artisan.clone(),
            };
            if let Err(e) = notifier.dispatch_event(&event).await {
                warn!(assignment_id = %assignment.id, error = %e, "assignment notification failed");
            }

            assigned.push(artisan.id);
        }

        Lead::mark_dispatched(pool, lead_id).await?;
        DispatchLog::create(
            pool,
            lead_id,
            action,
            Some(format!("offered to {} artisan(s)", assigned.len())),
        )
        .await?;

        Ok(DispatchOutcome {
            lead_id,
            action,
            assigned_artisan_ids: assigned,
        })
    }

    /// Artisan answers an open offer. Returns `None` when the assignment is
    /// not in a respondable state (already answered or expired).
    pub async fn respond_to_assignment(
        pool: &SqlitePool,
        notifier: &Notifier,
        assignment_id: Uuid,
        accept: bool,
    ) -> Result<Option<LeadAssignment>, DispatchError> {
        let Some(assignment) = LeadAssignment::respond(pool, assignment_id, accept).await? else {
            return Ok(None);
        };

        let lead = Lead::find_by_id(pool, assignment.lead_id)
            .await?
            .ok_or(DispatchError::LeadNotFound)?;
        let artisan = Artisan::find_by_id(pool, assignment.artisan_id)
            .await?
            .ok_or(DispatchError::ArtisanNotFound)?;

        let event = if accept {
            NotificationEvent::AssignmentAccepted {
                assignment_id: assignment.id,
                lead,
                artisan,
            }
        } else {
            NotificationEvent::AssignmentDeclined {
                assignment_id: assignment.id,
                lead,
                artisan,
            }
        };
        if let Err(e) = notifier.dispatch_event(&event).await {
            warn!(assignment_id = %assignment.id, error = %e, "response notification failed");
        }

        Ok(Some(assignment))
    }
}
