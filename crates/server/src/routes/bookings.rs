//! Routes for interventions booked from accepted assignments.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    artisan::Artisan,
    assignment::{AssignmentStatus, LeadAssignment},
    booking::{Booking, BookingStatus, CreateBooking},
    lead::Lead,
};
use serde::{Deserialize, Serialize};
use services::services::templates::NotificationEvent;
use tracing::error;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// POST /api/bookings
/// Schedule an intervention. Only an accepted assignment can be booked, and
/// only once (unique constraint on assignment_id).
pub async fn create_booking(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateBooking>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let assignment = LeadAssignment::find_by_id(&state.db.pool, payload.assignment_id)
        .await?
        .ok_or(ApiError::NotFound("assignment"))?;

    if assignment.status != AssignmentStatus::Accepted {
        return Err(ApiError::Conflict(format!(
            "assignment is {}, only accepted assignments can be booked",
            assignment.status
        )));
    }

    if Booking::find_by_assignment(&state.db.pool, assignment.id)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "assignment already has a booking".to_string(),
        ));
    }

    let booking = Booking::create(&state.db.pool, &payload, Uuid::new_v4()).await?;

    let lead = Lead::find_by_id(&state.db.pool, assignment.lead_id)
        .await?
        .ok_or(ApiError::NotFound("lead"))?;
    let artisan = Artisan::find_by_id(&state.db.pool, assignment.artisan_id)
        .await?
        .ok_or(ApiError::NotFound("artisan"))?;

    let notifier = state.notifier.clone();
    let event = NotificationEvent::BookingScheduled {
        booking: booking.clone(),
        lead,
        artisan,
    };
    tokio::spawn(async move {
        if let Err(e) = notifier.dispatch_event(&event).await {
            error!(error = %e, "booking notification failed");
        }
    });

    Ok(ResponseJson(ApiResponse::success(booking)))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    let booking = Booking::find_by_id(&state.db.pool, booking_id)
        .await?
        .ok_or(ApiError::NotFound("booking"))?;
    Ok(ResponseJson(ApiResponse::success(booking)))
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BookingStatusRequest {
    pub status: BookingStatus,
}

/// POST /api/bookings/{id}/status
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    axum::Json(payload): axum::Json<BookingStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Booking>>, ApiError> {
    Booking::find_by_id(&state.db.pool, booking_id)
        .await?
        .ok_or(ApiError::NotFound("booking"))?;

    let booking = Booking::update_status(&state.db.pool, booking_id, payload.status)
        .await?
        .ok_or_else(|| {
            ApiError::Conflict(format!("cannot move booking to {}", payload.status))
        })?;

    Ok(ResponseJson(ApiResponse::success(booking)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/bookings",
        Router::new()
            .route("/", post(create_booking))
            .route("/{booking_id}", get(get_booking))
            .route("/{booking_id}/status", post(update_booking_status)),
    )
}
