use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Trade categories offered on the marketplace.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "service_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceCategory {
    Plumbing,
    Electrical,
    Painting,
    Carpentry,
    Masonry,
    Roofing,
    Heating,
    Locksmith,
    Gardening,
    Renovation,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Artisan {
    pub id: Uuid,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: String,
    pub department: String,
    pub verified: bool,
    pub active: bool,
    pub rating_avg: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateArtisan {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub city: String,
    pub department: String,
    pub skills: Vec<ServiceCategory>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateArtisan {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub department: Option<String>,
    pub skills: Option<Vec<ServiceCategory>>,
}

/// Artisan profile plus skills, as served to the directory pages.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ArtisanWithSkills {
    #[serde(flatten)]
    #[ts(flatten)]
    pub artisan: Artisan,
    pub skills: Vec<ServiceCategory>,
}

impl Artisan {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateArtisan,
        artisan_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Artisan>(
            r#"INSERT INTO artisans (id, company_name, contact_name, email, phone, city, department)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING *"#,
        )
        .bind(artisan_id)
        .bind(&data.company_name)
        .bind(&data.contact_name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.city)
        .bind(&data.department)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Artisan>("SELECT * FROM artisans WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        company_name: String,
        contact_name: String,
        email: String,
        phone: Option<String>,
        city: String,
        department: String,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Artisan>(
            r#"UPDATE artisans
               SET company_name = $2, contact_name = $3, email = $4, phone = $5,
                   city = $6, department = $7, updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(company_name)
        .bind(contact_name)
        .bind(email)
        .bind(phone)
        .bind(city)
        .bind(department)
        .fetch_one(pool)
        .await
    }

    pub async fn set_verified(
        pool: &SqlitePool,
        id: Uuid,
        verified: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE artisans SET verified = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(verified)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_active(pool: &SqlitePool, id: Uuid, active: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE artisans SET active = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM artisans WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Directory search. Both filters optional; inactive artisans are never
    /// listed publicly.
    pub async fn search(
        pool: &SqlitePool,
        category: Option<ServiceCategory>,
        department: Option<String>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Artisan>(
            r#"SELECT DISTINCT a.*
               FROM artisans a
               LEFT JOIN artisan_skills s ON s.artisan_id = a.id
               WHERE a.active = 1
                 AND ($1 IS NULL OR s.category = $1)
                 AND ($2 IS NULL OR a.department = $2)
               ORDER BY a.rating_avg IS NULL, a.rating_avg DESC, a.created_at ASC
               LIMIT $3 OFFSET $4"#,
        )
        .bind(category)
        .bind(department)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Artisans a lead can be offered to: verified, active, holding the
    /// lead's category, in the lead's department, not yet assigned to it.
    pub async fn find_eligible_for_lead(
        pool: &SqlitePool,
        lead_id: Uuid,
        category: ServiceCategory,
        department: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Artisan>(
            r#"SELECT a.*
               FROM artisans a
               JOIN artisan_skills s ON s.artisan_id = a.id
               WHERE s.category = $1
                 AND a.department = $2
                 AND a.active = 1
                 AND a.verified = 1
                 AND a.id NOT IN (SELECT artisan_id FROM lead_assignments WHERE lead_id = $3)
               ORDER BY a.rating_avg IS NULL, a.rating_avg DESC, a.created_at ASC
               LIMIT $4"#,
        )
        .bind(category)
        .bind(department)
        .bind(lead_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_skills(
        pool: &SqlitePool,
        artisan_id: Uuid,
    ) -> Result<Vec<ServiceCategory>, sqlx::Error> {
        let rows: Vec<(ServiceCategory,)> = sqlx::query_as(
            "SELECT category FROM artisan_skills WHERE artisan_id = $1 ORDER BY category",
        )
        .bind(artisan_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    /// Replace the artisan's skill set.
    pub async fn set_skills(
        pool: &SqlitePool,
        artisan_id: Uuid,
        skills: &[ServiceCategory],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM artisan_skills WHERE artisan_id = $1")
            .bind(artisan_id)
            .execute(&mut *tx)
            .await?;

        for skill in skills {
            sqlx::query(
                "INSERT INTO artisan_skills (artisan_id, category) VALUES ($1, $2)
                 ON CONFLICT (artisan_id, category) DO NOTHING",
            )
            .bind(artisan_id)
            .bind(skill)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }

    /// Recompute the cached average from approved reviews.
    pub async fn recompute_rating(pool: &SqlitePool, artisan_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE artisans
               SET rating_avg = (SELECT AVG(rating) FROM reviews
                                 WHERE artisan_id = $1 AND status = 'approved'),
                   updated_at = CURRENT_TIMESTAMP
               WHERE id = $1"#,
        )
        .bind(artisan_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn with_skills(self, pool: &SqlitePool) -> Result<ArtisanWithSkills, sqlx::Error> {
        let skills = Self::find_skills(pool, self.id).await?;
        Ok(ArtisanWithSkills {
            artisan: self,
            skills,
        })
    }
}
