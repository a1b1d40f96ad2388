use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display,
)]
#[sqlx(type_name = "message_sender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageSender {
    Client,
    Artisan,
}

/// A chat message inside an assignment thread (client <-> artisan).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Message {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub sender: MessageSender,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMessage {
    pub sender: MessageSender,
    pub body: String,
}

impl Message {
    pub async fn create(
        pool: &SqlitePool,
        message_id: Uuid,
        assignment_id: Uuid,
        data: &CreateMessage,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"INSERT INTO messages (id, assignment_id, sender, body)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(message_id)
        .bind(assignment_id)
        .bind(data.sender)
        .bind(&data.body)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_assignment(
        pool: &SqlitePool,
        assignment_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"SELECT * FROM messages
               WHERE assignment_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(assignment_id)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_read(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = CURRENT_TIMESTAMP WHERE id = $1 AND read_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
