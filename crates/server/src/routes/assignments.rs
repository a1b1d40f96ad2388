//! Routes for artisan offers and the chat thread attached to each one.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    artisan::Artisan,
    assignment::LeadAssignment,
    lead::Lead,
    message::{CreateMessage, Message},
};
use serde::{Deserialize, Serialize};
use services::services::{dispatch::DispatchService, templates::NotificationEvent};
use tracing::error;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RespondRequest {
    pub accept: bool,
}

/// POST /api/assignments/{id}/respond
/// Artisan accepts or declines an offered lead.
pub async fn respond_to_assignment(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    axum::Json(payload): axum::Json<RespondRequest>,
) -> Result<ResponseJson<ApiResponse<LeadAssignment>>, ApiError> {
    LeadAssignment::find_by_id(&state.db.pool, assignment_id)
        .await?
        .ok_or(ApiError::NotFound("assignment"))?;

    let assignment = DispatchService::respond_to_assignment(
        &state.db.pool,
        &state.notifier,
        assignment_id,
        payload.accept,
    )
    .await?
    .ok_or_else(|| ApiError::Conflict("assignment already answered or expired".to_string()))?;

    Ok(ResponseJson(ApiResponse::success(assignment)))
}

/// POST /api/assignments/{id}/viewed
pub async fn mark_assignment_viewed(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    LeadAssignment::find_by_id(&state.db.pool, assignment_id)
        .await?
        .ok_or(ApiError::NotFound("assignment"))?;
    LeadAssignment::mark_viewed(&state.db.pool, assignment_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Message>>>, ApiError> {
    LeadAssignment::find_by_id(&state.db.pool, assignment_id)
        .await?
        .ok_or(ApiError::NotFound("assignment"))?;
    let messages = Message::find_by_assignment(&state.db.pool, assignment_id).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

/// POST /api/assignments/{id}/messages
/// Post a chat message; the other party is notified through the pipeline.
pub async fn post_message(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateMessage>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    if payload.body.trim().is_empty() {
        return Err(ApiError::BadRequest("message body is required".to_string()));
    }

    let assignment = LeadAssignment::find_by_id(&state.db.pool, assignment_id)
        .await?
        .ok_or(ApiError::NotFound("assignment"))?;

    let lead = Lead::find_by_id(&state.db.pool, assignment.lead_id)
        .await?
        .ok_or(ApiError::NotFound("lead"))?;
    let artisan = Artisan::find_by_id(&state.db.pool, assignment.artisan_id)
        .await?
        .ok_or(ApiError::NotFound("artisan"))?;

    let message = Message::create(&state.db.pool, Uuid::new_v4(), assignment_id, &payload).await?;

    let notifier = state.notifier.clone();
    let event = NotificationEvent::MessagePosted {
        message: message.clone(),
        lead,
        artisan,
    };
    tokio::spawn(async move {
        if let Err(e) = notifier.dispatch_event(&event).await {
            error!(error = %e, "message notification failed");
        }
    });

    Ok(ResponseJson(ApiResponse::success(message)))
}

/// POST /api/messages/{id}/read
pub async fn mark_message_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    Message::find_by_id(&state.db.pool, message_id)
        .await?
        .ok_or(ApiError::NotFound("message"))?;
    Message::mark_read(&state.db.pool, message_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .nest(
            "/assignments/{assignment_id}",
            Router::new()
                .route("/respond", post(respond_to_assignment))
                .route("/viewed", post(mark_assignment_viewed))
                .route("/messages", get(get_messages).post(post_message)),
        )
        .route("/messages/{message_id}/read", post(mark_message_read))
}
