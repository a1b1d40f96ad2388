use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Outcome recorded for each dispatch pass over a lead.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display,
)]
#[sqlx(type_name = "dispatch_action", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DispatchAction {
    Dispatched,
    Redispatched,
    Unmatched,
    Expired,
    Error,
}

/// Audit trail consumed by the admin back-office.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct DispatchLog {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub action: DispatchAction,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DispatchLog {
    pub async fn create(
        pool: &SqlitePool,
        lead_id: Uuid,
        action: DispatchAction,
        detail: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, DispatchLog>(
            r#"INSERT INTO dispatch_logs (id, lead_id, action, detail)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(id)
        .bind(lead_id)
        .bind(action)
        .bind(detail)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_lead(pool: &SqlitePool, lead_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, DispatchLog>(
            r#"SELECT * FROM dispatch_logs
               WHERE lead_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(lead_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_latest_by_lead(
        pool: &SqlitePool,
        lead_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DispatchLog>(
            r#"SELECT * FROM dispatch_logs
               WHERE lead_id = $1
               ORDER BY created_at DESC
               LIMIT 1"#,
        )
        .bind(lead_id)
        .fetch_optional(pool)
        .await
    }
}
