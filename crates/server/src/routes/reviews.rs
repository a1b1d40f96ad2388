//! Routes for client reviews.

use axum::{
    Router, extract::State, response::Json as ResponseJson, routing::post,
};
use db::models::{
    assignment::LeadAssignment,
    booking::{Booking, BookingStatus},
    review::{CreateReview, Review},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// POST /api/reviews
/// Submit a review for a completed booking. One review per booking; it
/// enters the moderation queue as pending.
pub async fn create_review(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateReview>,
) -> Result<ResponseJson<ApiResponse<Review>>, ApiError> {
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let booking = Booking::find_by_id(&state.db.pool, payload.booking_id)
        .await?
        .ok_or(ApiError::NotFound("booking"))?;

    if booking.status != BookingStatus::Completed {
        return Err(ApiError::Conflict(
            "only completed bookings can be reviewed".to_string(),
        ));
    }

    let assignment = LeadAssignment::find_by_id(&state.db.pool, booking.assignment_id)
        .await?
        .ok_or(ApiError::NotFound("assignment"))?;

    let review = Review::create(
        &state.db.pool,
        Uuid::new_v4(),
        booking.id,
        assignment.artisan_id,
        payload.rating,
        payload.comment.clone(),
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(review)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/reviews", post(create_review))
}
