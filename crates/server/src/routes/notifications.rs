//! Routes for the in-app notification inbox.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::notification::Notification;
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::page_window};

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub recipient: String,
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// GET /api/notifications?recipient=artisan:{id}
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let (limit, offset) = page_window(query.page, query.per_page);
    let notifications = Notification::find_for_recipient(
        &state.db.pool,
        &query.recipient,
        query.unread_only,
        limit,
        offset,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

/// POST /api/notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let updated = Notification::mark_read(&state.db.pool, notification_id).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("notification"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            post(mark_notification_read),
        )
}
