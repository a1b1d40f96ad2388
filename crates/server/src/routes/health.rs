use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Liveness probe with a database ping.
pub async fn health(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<String>>, ApiError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.db.pool)
        .await?;
    Ok(ResponseJson(ApiResponse::success("ok".to_string())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/health", get(health))
}
