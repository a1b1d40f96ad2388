//! Public directory routes.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    artisan::{Artisan, ArtisanWithSkills, ServiceCategory},
    assignment::LeadAssignment,
    booking::Booking,
    review::Review,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::page_window};

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    pub category: Option<ServiceCategory>,
    pub department: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Public profile: artisan, skills and published reviews.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ArtisanProfile {
    #[serde(flatten)]
    #[ts(flatten)]
    pub artisan: ArtisanWithSkills,
    pub reviews: Vec<Review>,
}

/// GET /api/artisans
/// Directory search by category and department.
pub async fn search_artisans(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ArtisanWithSkills>>>, ApiError> {
    let (limit, offset) = page_window(query.page, query.per_page);
    let artisans = Artisan::search(
        &state.db.pool,
        query.category,
        query.department,
        limit,
        offset,
    )
    .await?;

    let mut out = Vec::with_capacity(artisans.len());
    for artisan in artisans {
        out.push(artisan.with_skills(&state.db.pool).await?);
    }

    Ok(ResponseJson(ApiResponse::success(out)))
}

pub async fn get_artisan(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ArtisanProfile>>, ApiError> {
    let artisan = Artisan::find_by_id(&state.db.pool, artisan_id)
        .await?
        .ok_or(ApiError::NotFound("artisan"))?;
    let artisan = artisan.with_skills(&state.db.pool).await?;
    let reviews = Review::find_approved_by_artisan(&state.db.pool, artisan_id, 20, 0).await?;

    Ok(ResponseJson(ApiResponse::success(ArtisanProfile {
        artisan,
        reviews,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn get_artisan_reviews(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Review>>>, ApiError> {
    Artisan::find_by_id(&state.db.pool, artisan_id)
        .await?
        .ok_or(ApiError::NotFound("artisan"))?;
    let (limit, offset) = page_window(query.page, query.per_page);
    let reviews =
        Review::find_approved_by_artisan(&state.db.pool, artisan_id, limit, offset).await?;
    Ok(ResponseJson(ApiResponse::success(reviews)))
}

/// Artisan dashboard: offers received, newest first.
pub async fn get_artisan_assignments(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<LeadAssignment>>>, ApiError> {
    Artisan::find_by_id(&state.db.pool, artisan_id)
        .await?
        .ok_or(ApiError::NotFound("artisan"))?;
    let (limit, offset) = page_window(query.page, query.per_page);
    let assignments =
        LeadAssignment::find_by_artisan(&state.db.pool, artisan_id, limit, offset).await?;
    Ok(ResponseJson(ApiResponse::success(assignments)))
}

/// Artisan dashboard: scheduled interventions.
pub async fn get_artisan_bookings(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Booking>>>, ApiError> {
    Artisan::find_by_id(&state.db.pool, artisan_id)
        .await?
        .ok_or(ApiError::NotFound("artisan"))?;
    let (limit, offset) = page_window(query.page, query.per_page);
    let bookings = Booking::find_by_artisan(&state.db.pool, artisan_id, limit, offset).await?;
    Ok(ResponseJson(ApiResponse::success(bookings)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/artisans",
        Router::new()
            .route("/", get(search_artisans))
            .route("/{artisan_id}", get(get_artisan))
            .route("/{artisan_id}/reviews", get(get_artisan_reviews))
            .route("/{artisan_id}/assignments", get(get_artisan_assignments))
            .route("/{artisan_id}/bookings", get(get_artisan_bookings)),
    )
}
