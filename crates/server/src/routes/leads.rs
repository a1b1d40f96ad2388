//! Routes for devis requests (leads).

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    assignment::{AssignmentWithArtisan, LeadAssignment},
    lead::{CreateLead, Lead, department_from_postal},
};
use services::services::dispatch::DispatchService;
use tracing::error;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

fn validate(payload: &CreateLead) -> Result<(), ApiError> {
    if payload.description.trim().is_empty() {
        return Err(ApiError::BadRequest("description is required".to_string()));
    }
    if payload.city.trim().is_empty() {
        return Err(ApiError::BadRequest("city is required".to_string()));
    }
    if payload.client_name.trim().is_empty() {
        return Err(ApiError::BadRequest("client_name is required".to_string()));
    }
    if !payload.client_email.contains('@') {
        return Err(ApiError::BadRequest("invalid client_email".to_string()));
    }
    Ok(())
}

/// POST /api/leads
/// Record a devis request and hand it to the dispatch pipeline.
pub async fn create_lead(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateLead>,
) -> Result<ResponseJson<ApiResponse<Lead>>, ApiError> {
    validate(&payload)?;

    let department = department_from_postal(&payload.postal_code)
        .ok_or_else(|| ApiError::BadRequest("invalid postal_code".to_string()))?;

    let lead = Lead::create(&state.db.pool, &payload, Uuid::new_v4(), &department).await?;

    // Fire and forget: the response never waits for matching or sends.
    // Failures are logged and visible in the admin dispatch log.
    let pool = state.db.pool.clone();
    let notifier = state.notifier.clone();
    let max_assignments = state.config.max_assignments_per_lead;
    let lead_id = lead.id;
    tokio::spawn(async move {
        if let Err(e) =
            DispatchService::dispatch_lead(&pool, &notifier, lead_id, max_assignments).await
        {
            error!(lead_id = %lead_id, error = %e, "lead dispatch failed");
        }
    });

    Ok(ResponseJson(ApiResponse::success(lead)))
}

pub async fn get_lead(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Lead>>, ApiError> {
    let lead = Lead::find_by_id(&state.db.pool, lead_id)
        .await?
        .ok_or(ApiError::NotFound("lead"))?;
    Ok(ResponseJson(ApiResponse::success(lead)))
}

pub async fn get_lead_assignments(
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<AssignmentWithArtisan>>>, ApiError> {
    Lead::find_by_id(&state.db.pool, lead_id)
        .await?
        .ok_or(ApiError::NotFound("lead"))?;
    let assignments = LeadAssignment::find_by_lead(&state.db.pool, lead_id).await?;
    Ok(ResponseJson(ApiResponse::success(assignments)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/leads",
        Router::new()
            .route("/", post(create_lead))
            .route("/{lead_id}", get(get_lead))
            .route("/{lead_id}/assignments", get(get_lead_assignments)),
    )
}
