use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// Transitions allowed from `self`.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

/// An intervention scheduled from an accepted assignment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Booking {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateBooking {
    pub assignment_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Booking {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateBooking,
        booking_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"INSERT INTO bookings (id, assignment_id, scheduled_for, notes)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(booking_id)
        .bind(data.assignment_id)
        .bind(data.scheduled_for)
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_assignment(
        pool: &SqlitePool,
        assignment_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE assignment_id = $1")
            .bind(assignment_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_artisan(
        pool: &SqlitePool,
        artisan_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"SELECT b.* FROM bookings b
               JOIN lead_assignments la ON la.id = b.assignment_id
               WHERE la.artisan_id = $1
               ORDER BY b.scheduled_for DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(artisan_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Guarded status change. Returns `None` when the transition is illegal
    /// for the booking's current state.
    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        next: BookingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let allowed_from: &[&str] = match next {
            BookingStatus::Confirmed => &["pending"],
            BookingStatus::Completed => &["confirmed"],
            BookingStatus::Cancelled => &["pending", "confirmed"],
            BookingStatus::Pending => return Ok(None),
        };

        // Two source states at most; bind both slots.
        let from_a = allowed_from[0];
        let from_b = allowed_from.get(1).copied().unwrap_or(allowed_from[0]);

        sqlx::query_as::<_, Booking>(
            r#"UPDATE bookings
               SET status = $2, updated_at = CURRENT_TIMESTAMP
               WHERE id = $1 AND status IN ($3, $4)
               RETURNING *"#,
        )
        .bind(id)
        .bind(next)
        .bind(from_a)
        .bind(from_b)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_transitions() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Pending));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Confirmed));
    }
}
