use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::models::booking::ConfirmPaymentPayload;
use crate::services::reservation;
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::AppState;

/// Called by the payment collaborator (or the client acting on its behalf)
/// once funds have moved.
pub async fn confirm_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentPayload>,
) -> Result<Response, AppError> {
    let booking =
        reservation::confirm_booking(&state.pool, booking_id, auth.user_id, payload).await?;
    Ok(success(booking, "Booking confirmed"))
}
