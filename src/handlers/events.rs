use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;
use crate::models::booking::RegisterPayload;
use crate::models::event::{CreateEventPayload, ListEventsQuery, UpdateEventPayload};
use crate::services::{events, reservation};
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};
use crate::AppState;

pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateEventPayload>,
) -> Result<Response, AppError> {
    let event = events::create_event(&state.pool, auth.user_id, payload).await?;
    Ok(created(event, "Event created successfully"))
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Response, AppError> {
    let listing = events::list_events(&state.pool, query).await?;
    Ok(success(listing, "Events retrieved successfully"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = events::get_event(&state.pool, event_id).await?;
    Ok(success(event, "Event retrieved successfully"))
}

pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<UpdateEventPayload>,
) -> Result<Response, AppError> {
    let event = events::update_event(&state.pool, event_id, auth.user_id, payload).await?;
    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    events::delete_event(&state.pool, event_id, auth.user_id).await?;
    Ok(empty_success("Event deleted successfully"))
}

pub async fn list_my_events(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Response, AppError> {
    let events = events::list_my_events(&state.pool, auth.user_id).await?;
    Ok(success(events, "Events retrieved successfully"))
}

pub async fn list_my_registrations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Response, AppError> {
    let events = events::list_my_registrations(&state.pool, auth.user_id).await?;
    Ok(success(events, "Registrations retrieved successfully"))
}

pub async fn register_for_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Response, AppError> {
    let booking =
        reservation::register_for_event(&state.pool, event_id, auth.user_id, payload).await?;
    Ok(created(booking, "Booking successful"))
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    reservation::cancel_registration(&state.pool, event_id, auth.user_id).await?;
    Ok(empty_success("Registration cancelled successfully"))
}
