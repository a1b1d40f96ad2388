use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "assignment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Offered,
    Viewed,
    Accepted,
    Declined,
    Expired,
}

/// One lead offered to one artisan. `UNIQUE(lead_id, artisan_id)` keeps
/// redispatch from offering the same lead twice.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct LeadAssignment {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub artisan_id: Uuid,
    pub status: AssignmentStatus,
    pub offered_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AssignmentWithArtisan {
    #[serde(flatten)]
    #[ts(flatten)]
    #[sqlx(flatten)]
    pub assignment: LeadAssignment,
    pub company_name: String,
    pub contact_name: String,
}

impl std::ops::Deref for AssignmentWithArtisan {
    type Target = LeadAssignment;
    fn deref(&self) -> &Self::Target {
        &self.assignment
    }
}

impl LeadAssignment {
    pub async fn create(
        pool: &SqlitePool,
        assignment_id: Uuid,
        lead_id: Uuid,
        artisan_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, LeadAssignment>(
            r#"INSERT INTO lead_assignments (id, lead_id, artisan_id)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(assignment_id)
        .bind(lead_id)
        .bind(artisan_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LeadAssignment>("SELECT * FROM lead_assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_lead(pool: &SqlitePool, lead_id: Uuid) -> Result<Vec<AssignmentWithArtisan>, sqlx::Error> {
        sqlx::query_as::<_, AssignmentWithArtisan>(
            r#"SELECT la.*, ar.company_name, ar.contact_name
               FROM lead_assignments la
               JOIN artisans ar ON ar.id = la.artisan_id
               WHERE la.lead_id = $1
               ORDER BY la.offered_at ASC"#,
        )
        .bind(lead_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_artisan(
        pool: &SqlitePool,
        artisan_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, LeadAssignment>(
            r#"SELECT * FROM lead_assignments
               WHERE artisan_id = $1
               ORDER BY offered_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(artisan_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_active_for_lead(pool: &SqlitePool, lead_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM lead_assignments
               WHERE lead_id = $1 AND status IN ('offered', 'viewed', 'accepted')"#,
        )
        .bind(lead_id)
        .fetch_one(pool)
        .await
    }

    /// Artisan accepts or declines an open offer. Returns `None` when the
    /// assignment is not in a respondable state (already responded, expired).
    pub async fn respond(
        pool: &SqlitePool,
        id: Uuid,
        accept: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let status = if accept {
            AssignmentStatus::Accepted
        } else {
            AssignmentStatus::Declined
        };
        sqlx::query_as::<_, LeadAssignment>(
            r#"UPDATE lead_assignments
               SET status = $2, responded_at = CURRENT_TIMESTAMP
               WHERE id = $1 AND status IN ('offered', 'viewed')
               RETURNING *"#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_viewed(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE lead_assignments SET status = 'viewed' WHERE id = $1 AND status = 'offered'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Offers still unanswered after the TTL.
    pub async fn find_expired(
        pool: &SqlitePool,
        ttl_minutes: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let cutoff = format!("-{} minutes", ttl_minutes);
        sqlx::query_as::<_, LeadAssignment>(
            r#"SELECT * FROM lead_assignments
               WHERE status IN ('offered', 'viewed')
                 AND datetime(offered_at) < datetime('now', $1)
               ORDER BY offered_at ASC"#,
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await
    }

    pub async fn expire(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE lead_assignments
               SET status = 'expired', responded_at = CURRENT_TIMESTAMP
               WHERE id = $1 AND status IN ('offered', 'viewed')"#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
