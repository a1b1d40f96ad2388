use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "review_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Client review of a completed booking. Published only after moderation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub artisan_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub status: ReviewStatus,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateReview {
    pub booking_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

impl Review {
    pub async fn create(
        pool: &SqlitePool,
        review_id: Uuid,
        booking_id: Uuid,
        artisan_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"INSERT INTO reviews (id, booking_id, artisan_id, rating, comment)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING *"#,
        )
        .bind(review_id)
        .bind(booking_id)
        .bind(artisan_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Moderation decision on a pending review. Returns `None` when the
    /// review was already moderated.
    pub async fn moderate(
        pool: &SqlitePool,
        id: Uuid,
        approve: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let status = if approve {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Rejected
        };
        sqlx::query_as::<_, Review>(
            r#"UPDATE reviews
               SET status = $2, moderated_at = CURRENT_TIMESTAMP
               WHERE id = $1 AND status = 'pending'
               RETURNING *"#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    /// Published reviews for an artisan's public profile.
    pub async fn find_approved_by_artisan(
        pool: &SqlitePool,
        artisan_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"SELECT * FROM reviews
               WHERE artisan_id = $1 AND status = 'approved'
               ORDER BY created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(artisan_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Moderation queue, oldest first.
    pub async fn find_pending(
        pool: &SqlitePool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"SELECT * FROM reviews
               WHERE status = 'pending'
               ORDER BY created_at ASC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}
