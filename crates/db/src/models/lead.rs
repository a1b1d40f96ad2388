use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::artisan::ServiceCategory;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "lead_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    Received,
    Dispatched,
    Unmatched,
    Closed,
    Cancelled,
}

/// A quote request (demande de devis) submitted by a prospective client.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Lead {
    pub id: Uuid,
    pub reference: String,
    pub category: ServiceCategory,
    pub description: String,
    pub city: String,
    pub postal_code: String,
    pub department: String,
    pub budget_cents: Option<i64>,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub status: LeadStatus,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateLead {
    pub category: ServiceCategory,
    pub description: String,
    pub city: String,
    pub postal_code: String,
    pub budget_cents: Option<i64>,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
}

/// French département code from a 5-digit postal code.
///
/// Overseas (97x/98x) uses the 3-digit prefix. Corsica's 20xxx codes cannot
/// be split into 2A/2B from the postal code alone; they map to 2A.
pub fn department_from_postal(postal_code: &str) -> Option<String> {
    let digits = postal_code.trim();
    if digits.len() != 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.starts_with("97") || digits.starts_with("98") {
        return Some(digits[..3].to_string());
    }
    if digits.starts_with("20") {
        return Some("2A".to_string());
    }
    Some(digits[..2].to_string())
}

impl Lead {
    /// Human-facing reference printed on every devis (e.g. `DEV-3F2A9C01`).
    pub fn new_reference(id: Uuid) -> String {
        let hex: String = id.simple().to_string()[..8].to_uppercase();
        format!("DEV-{hex}")
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateLead,
        lead_id: Uuid,
        department: &str,
    ) -> Result<Self, sqlx::Error> {
        let reference = Self::new_reference(lead_id);
        sqlx::query_as::<_, Lead>(
            r#"INSERT INTO leads (id, reference, category, description, city, postal_code,
                                  department, budget_cents, client_name, client_email, client_phone)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING *"#,
        )
        .bind(lead_id)
        .bind(reference)
        .bind(data.category)
        .bind(&data.description)
        .bind(&data.city)
        .bind(&data.postal_code)
        .bind(department)
        .bind(data.budget_cents)
        .bind(&data.client_name)
        .bind(&data.client_email)
        .bind(&data.client_phone)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_reference(
        pool: &SqlitePool,
        reference: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE reference = $1")
            .bind(reference)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &SqlitePool,
        status: Option<LeadStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Lead>(
            r#"SELECT * FROM leads
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

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: LeadStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE leads SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Stamp the first successful dispatch. Later redispatches keep the
    /// original timestamp.
    pub async fn mark_dispatched(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE leads
               SET status = 'dispatched',
                   dispatched_at = COALESCE(dispatched_at, CURRENT_TIMESTAMP),
                   updated_at = CURRENT_TIMESTAMP
               WHERE id = $1"#,
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_from_postal_metropole() {
        assert_eq!(department_from_postal("75011").as_deref(), Some("75"));
        assert_eq!(department_from_postal("13001").as_deref(), Some("13"));
    }

    #[test]
    fn test_department_from_postal_overseas() {
        assert_eq!(department_from_postal("97400").as_deref(), Some("974"));
        assert_eq!(department_from_postal("98800").as_deref(), Some("988"));
    }

    #[test]
    fn test_department_from_postal_corsica() {
        assert_eq!(department_from_postal("20000").as_deref(), Some("2A"));
    }

    #[test]
    fn test_department_from_postal_invalid() {
        assert!(department_from_postal("7501").is_none());
        assert!(department_from_postal("ABCDE").is_none());
        assert!(department_from_postal("").is_none());
    }

    #[test]
    fn test_reference_shape() {
        let id = Uuid::new_v4();
        let reference = Lead::new_reference(id);
        assert!(reference.starts_with("DEV-"));
        assert_eq!(reference.len(), 12);
    }
}
