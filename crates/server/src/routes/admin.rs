//! Admin back-office routes: lead oversight, dispatch replay, delivery
//! inspection, review moderation and artisan management.
//!
//! The platform's real authentication lives in front of this service; these
//! routes are gated by a shared-secret header only.

use axum::{
    Router,
    extract::{Path, Query, Request, State},
    middleware::{self, Next},
    response::{Json as ResponseJson, Response},
    routing::{get, post, put},
};
use db::models::{
    artisan::{Artisan, ArtisanWithSkills, CreateArtisan, UpdateArtisan},
    dispatch_log::DispatchLog,
    lead::{Lead, LeadStatus},
    notification::{DeliveryStatus, NotificationDelivery},
    review::Review,
};
use serde::{Deserialize, Serialize};
use services::services::{
    dispatch::{DispatchOutcome, DispatchService},
    notification::DeliveryReport,
    templates::NotificationEvent,
};
use tracing::error;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::page_window};

async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok());

    // An empty configured token disables the back-office entirely.
    if state.config.admin_token.is_empty()
        || provided != Some(state.config.admin_token.as_str())
    {
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct AdminLeadsQuery {
    pub status: Option<LeadStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<AdminLeadsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Lead>>>, ApiError> {
    let (limit, offset) = page_window(query.page, query.per_page);
    let leads = Lead::list(&state.db.pool, query.status, limit, offset).await?;
    Ok(ResponseJson(ApiResponse::success(leads)))
}

/// POST /api/admin/leads/{id}/redispatch
/// Re-run matching for a lead. Runs synchronously so the operator sees the
/// outcome; deliveries already recorded are skipped by the unique constraint.
pub async fn redispatch_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<DispatchOutcome>>, ApiError> {
    let outcome = DispatchService::dispatch_lead(
        &state.db.pool,
        &state.notifier,
        lead_id,
        state.config.max_assignments_per_lead,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub async fn get_dispatch_log(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<DispatchLog>>>, ApiError> {
    Lead::find_by_id(&state.db.pool, lead_id)
        .await?
        .ok_or(ApiError::NotFound("lead"))?;
    let logs = DispatchLog::find_by_lead(&state.db.pool, lead_id).await?;
    Ok(ResponseJson(ApiResponse::success(logs)))
}

#[derive(Debug, Deserialize)]
pub struct DeliveriesQuery {
    pub status: Option<DeliveryStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<DeliveriesQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<NotificationDelivery>>>, ApiError> {
    let (limit, offset) = page_window(query.page, query.per_page);
    let deliveries =
        NotificationDelivery::list_recent(&state.db.pool, query.status, limit, offset).await?;
    Ok(ResponseJson(ApiResponse::success(deliveries)))
}

pub async fn get_event_deliveries(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<NotificationDelivery>>>, ApiError> {
    let deliveries = NotificationDelivery::find_by_event(&state.db.pool, &event_id).await?;
    Ok(ResponseJson(ApiResponse::success(deliveries)))
}

/// POST /api/admin/events/{event_id}/replay
/// Re-attempt an event's failed deliveries only.
pub async fn replay_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<DeliveryReport>>, ApiError> {
    let report = state.notifier.replay_event(&event_id).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

#[derive(Debug, Deserialize)]
pub struct PendingReviewsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub async fn list_pending_reviews(
    State(state): State<AppState>,
    Query(query): Query<PendingReviewsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Review>>>, ApiError> {
    let (limit, offset) = page_window(query.page, query.per_page);
    let reviews = Review::find_pending(&state.db.pool, limit, offset).await?;
    Ok(ResponseJson(ApiResponse::success(reviews)))
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ModerateRequest {
    pub approve: bool,
}

/// POST /api/admin/reviews/{id}/moderate
pub async fn moderate_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ModerateRequest>,
) -> Result<ResponseJson<ApiResponse<Review>>, ApiError> {
    Review::find_by_id(&state.db.pool, review_id)
        .await?
        .ok_or(ApiError::NotFound("review"))?;

    let review = Review::moderate(&state.db.pool, review_id, payload.approve)
        .await?
        .ok_or_else(|| ApiError::Conflict("review already moderated".to_string()))?;

    if payload.approve {
        Artisan::recompute_rating(&state.db.pool, review.artisan_id).await?;

        if let Some(artisan) = Artisan::find_by_id(&state.db.pool, review.artisan_id).await? {
            let notifier = state.notifier.clone();
            let event = NotificationEvent::ReviewApproved {
                review: review.clone(),
                artisan,
            };
            tokio::spawn(async move {
                if let Err(e) = notifier.dispatch_event(&event).await {
                    error!(error = %e, "review notification failed");
                }
            });
        }
    }

    Ok(ResponseJson(ApiResponse::success(review)))
}

fn validate_artisan(email: &str, company_name: &str) -> Result<(), ApiError> {
    if company_name.trim().is_empty() {
        return Err(ApiError::BadRequest("company_name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("invalid email".to_string()));
    }
    Ok(())
}

pub async fn create_artisan(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateArtisan>,
) -> Result<ResponseJson<ApiResponse<ArtisanWithSkills>>, ApiError> {
    validate_artisan(&payload.email, &payload.company_name)?;

    let artisan = Artisan::create(&state.db.pool, &payload, Uuid::new_v4()).await?;
    Artisan::set_skills(&state.db.pool, artisan.id, &payload.skills).await?;
    let artisan = artisan.with_skills(&state.db.pool).await?;

    Ok(ResponseJson(ApiResponse::success(artisan)))
}

pub async fn update_artisan(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateArtisan>,
) -> Result<ResponseJson<ApiResponse<ArtisanWithSkills>>, ApiError> {
    let existing = Artisan::find_by_id(&state.db.pool, artisan_id)
        .await?
        .ok_or(ApiError::NotFound("artisan"))?;

    let email = payload.email.unwrap_or(existing.email);
    let company_name = payload.company_name.unwrap_or(existing.company_name);
    validate_artisan(&email, &company_name)?;

    let artisan = Artisan::update(
        &state.db.pool,
        artisan_id,
        company_name,
        payload.contact_name.unwrap_or(existing.contact_name),
        email,
        payload.phone.or(existing.phone),
        payload.city.unwrap_or(existing.city),
        payload.department.unwrap_or(existing.department),
    )
    .await?;

    if let Some(skills) = &payload.skills {
        Artisan::set_skills(&state.db.pool, artisan_id, skills).await?;
    }

    let artisan = artisan.with_skills(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(artisan)))
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct VerifyRequest {
    pub verified: bool,
}

pub async fn verify_artisan(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
    axum::Json(payload): axum::Json<VerifyRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let updated = Artisan::set_verified(&state.db.pool, artisan_id, payload.verified).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("artisan"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ActiveRequest {
    pub active: bool,
}

/// Deactivated artisans stay in the database but leave the directory and
/// the matching pool.
pub async fn set_artisan_active(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ActiveRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let updated = Artisan::set_active(&state.db.pool, artisan_id, payload.active).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("artisan"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn delete_artisan(
    State(state): State<AppState>,
    Path(artisan_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = Artisan::delete(&state.db.pool, artisan_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("artisan"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/admin",
        Router::new()
            .route("/leads", get(list_leads))
            .route("/leads/{lead_id}/redispatch", post(redispatch_lead))
            .route("/leads/{lead_id}/dispatch-log", get(get_dispatch_log))
            .route("/deliveries", get(list_deliveries))
            .route("/events/{event_id}/deliveries", get(get_event_deliveries))
            .route("/events/{event_id}/replay", post(replay_event))
            .route("/reviews/pending", get(list_pending_reviews))
            .route("/reviews/{review_id}/moderate", post(moderate_review))
            .route("/artisans", post(create_artisan))
            .route(
                "/artisans/{artisan_id}",
                put(update_artisan).delete(delete_artisan),
            )
            .route("/artisans/{artisan_id}/verify", post(verify_artisan))
            .route("/artisans/{artisan_id}/active", post(set_artisan_active))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                require_admin,
            )),
    )
}
