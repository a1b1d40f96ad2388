use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "notification_channel", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    InApp,
    Webhook,
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Failed,
    Skipped,
}

/// In-app inbox entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// One attempted send, keyed by (event_id, channel, recipient).
///
/// The UNIQUE constraint on that tuple is the pipeline's only idempotency
/// mechanism: a conflicting insert means the tuple was already attempted and
/// the send must not run again.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct NotificationDelivery {
    pub id: Uuid,
    pub event_id: String,
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub async fn create(
        pool: &SqlitePool,
        notification_id: Uuid,
        recipient: &str,
        title: &str,
        body: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"INSERT INTO notifications (id, recipient, title, body)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(notification_id)
        .bind(recipient)
        .bind(title)
        .bind(body)
        .fetch_one(pool)
        .await
    }

    pub async fn find_for_recipient(
        pool: &SqlitePool,
        recipient: &str,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"SELECT * FROM notifications
               WHERE recipient = $1 AND ($2 = 0 OR read = 0)
               ORDER BY created_at DESC
               LIMIT $3 OFFSET $4"#,
        )
        .bind(recipient)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_read(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl NotificationDelivery {
    /// Claim the (event, channel, recipient) tuple before sending.
    ///
    /// Returns `None` when the tuple already has a delivery row, in which
    /// case the caller must skip the send.
    pub async fn claim(
        pool: &SqlitePool,
        delivery_id: Uuid,
        event_id: &str,
        channel: NotificationChannel,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, NotificationDelivery>(
            r#"INSERT INTO notification_deliveries (id, event_id, channel, recipient, subject, body)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (event_id, channel, recipient) DO NOTHING
               RETURNING *"#,
        )
        .bind(delivery_id)
        .bind(event_id)
        .bind(channel)
        .bind(recipient)
        .bind(subject)
        .bind(body)
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_sent(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE notification_deliveries
               SET status = 'sent', error = NULL, completed_at = CURRENT_TIMESTAMP
               WHERE id = $1"#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &SqlitePool, id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE notification_deliveries
               SET status = 'failed', error = $2, completed_at = CURRENT_TIMESTAMP
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a deliberate non-send (e.g. the channel has no configured
    /// sender). Skipped rows are never replayed.
    pub async fn mark_skipped(
        pool: &SqlitePool,
        id: Uuid,
        reason: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE notification_deliveries
               SET status = 'skipped', error = $2, completed_at = CURRENT_TIMESTAMP
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Reset an event's failed tuples to pending for replay. Sent and
    /// skipped rows are untouched.
    pub async fn reclaim_failed(
        pool: &SqlitePool,
        event_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, NotificationDelivery>(
            r#"UPDATE notification_deliveries
               SET status = 'pending', error = NULL, completed_at = NULL
               WHERE event_id = $1 AND status = 'failed'
               RETURNING *"#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_event(
        pool: &SqlitePool,
        event_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, NotificationDelivery>(
            r#"SELECT * FROM notification_deliveries
               WHERE event_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_recent(
        pool: &SqlitePool,
        status: Option<DeliveryStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, NotificationDelivery>(
            r#"SELECT * FROM notification_deliveries
               WHERE ($1 IS NULL OR status = $1)
               ORDER BY created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}
