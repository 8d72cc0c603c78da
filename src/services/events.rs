//! Event lifecycle: creation, listing, updates under the capacity-floor
//! invariant, cancellation cascade, and guarded deletion.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::event::{
    merge_starts_at, parse_starts_at, CreateEventPayload, Event, EventListResponse, EventStatus,
    ListEventsQuery, UpdateEventPayload,
};
use crate::store::{bookings, events};
use crate::utils::error::AppError;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

pub async fn create_event(
    pool: &PgPool,
    organizer_id: Uuid,
    payload: CreateEventPayload,
) -> Result<Event, AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::ValidationError("title is required".to_string()));
    }
    if payload.description.trim().is_empty() {
        return Err(AppError::ValidationError(
            "description is required".to_string(),
        ));
    }
    if payload.capacity < 1 {
        return Err(AppError::ValidationError(
            "capacity must be a positive integer".to_string(),
        ));
    }
    if payload.ticket_price.is_sign_negative() {
        return Err(AppError::ValidationError(
            "ticketPrice must not be negative".to_string(),
        ));
    }

    let starts_at = parse_starts_at(&payload.date, payload.time.as_deref())?;
    let location = payload.location.normalize();
    if location.venue.trim().is_empty() {
        return Err(AppError::ValidationError("venue is required".to_string()));
    }

    let event = events::insert_event(
        pool,
        events::NewEvent {
            organizer_id,
            title: payload.title,
            description: payload.description,
            starts_at,
            location,
            capacity: payload.capacity,
            ticket_price: payload.ticket_price,
            categories: payload.categories,
        },
    )
    .await?;

    tracing::info!(event_id = %event.id, %organizer_id, "event created");

    Ok(event)
}

pub async fn get_event(pool: &PgPool, id: Uuid) -> Result<Event, AppError> {
    events::fetch_event(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {id} not found")))
}

pub async fn list_events(
    pool: &PgPool,
    query: ListEventsQuery,
) -> Result<EventListResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let status = query.status.unwrap_or(EventStatus::Published);
    let offset = i64::from(page - 1) * i64::from(limit);

    let (events, total) =
        events::list_events(pool, status, query.category.as_deref(), i64::from(limit), offset)
            .await?;

    Ok(EventListResponse {
        events,
        total,
        total_pages: total_pages(total, limit),
        page,
    })
}

pub async fn list_my_events(pool: &PgPool, organizer_id: Uuid) -> Result<Vec<Event>, AppError> {
    Ok(events::list_events_by_organizer(pool, organizer_id).await?)
}

pub async fn list_my_registrations(pool: &PgPool, user_id: Uuid) -> Result<Vec<Event>, AppError> {
    Ok(events::list_registered_events(pool, user_id).await?)
}

/// Update any mutable field. Runs under the event row lock so the capacity
/// floor is checked against a consistent occupancy figure, and so a
/// cancellation cascade cannot interleave with a registration.
pub async fn update_event(
    pool: &PgPool,
    event_id: Uuid,
    caller_id: Uuid,
    payload: UpdateEventPayload,
) -> Result<Event, AppError> {
    let mut tx = pool.begin().await?;

    let mut event = events::fetch_event_for_update(&mut tx, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;

    if event.organizer_id != caller_id {
        return Err(AppError::Forbidden(
            "Only the organizer may modify this event".to_string(),
        ));
    }
    if event.status == EventStatus::Cancelled {
        return Err(AppError::InvalidState(
            "Cancelled events cannot be modified".to_string(),
        ));
    }

    if let Some(title) = payload.title {
        if title.trim().is_empty() {
            return Err(AppError::ValidationError("title must not be empty".to_string()));
        }
        event.title = title;
    }
    if let Some(description) = payload.description {
        if description.trim().is_empty() {
            return Err(AppError::ValidationError(
                "description must not be empty".to_string(),
            ));
        }
        event.description = description;
    }
    if payload.date.is_some() || payload.time.is_some() {
        event.starts_at = merge_starts_at(
            event.starts_at,
            payload.date.as_deref(),
            payload.time.as_deref(),
        )?;
    }
    if let Some(location) = payload.location {
        event.location = location.normalize();
    }
    if let Some(price) = payload.ticket_price {
        if price.is_sign_negative() {
            return Err(AppError::ValidationError(
                "ticketPrice must not be negative".to_string(),
            ));
        }
        event.ticket_price = price;
    }
    if let Some(categories) = payload.categories {
        event.categories = categories;
    }

    if let Some(capacity) = payload.capacity {
        if capacity < 1 {
            return Err(AppError::ValidationError(
                "capacity must be a positive integer".to_string(),
            ));
        }
        let occupied = bookings::occupied_seats(&mut tx, event_id).await?;
        ensure_capacity_floor(capacity, occupied)?;
        event.capacity = capacity;
    }

    if let Some(status) = payload.status {
        if event.status == EventStatus::Published && status == EventStatus::Draft {
            return Err(AppError::InvalidState(
                "A published event cannot return to draft".to_string(),
            ));
        }
        if status == EventStatus::Cancelled {
            // Cancelling an event voids every active booking with it.
            let voided = bookings::cancel_all_active_for_event(&mut tx, event_id).await?;
            events::clear_attendees(&mut tx, event_id).await?;
            event.attendees.clear();
            tracing::info!(%event_id, bookings = voided, "event cancelled, bookings voided");
        }
        event.status = status;
    }

    let updated = events::update_event_row(&mut tx, &event).await?;

    tx.commit().await?;

    Ok(updated)
}

/// Hard deletion is refused while any active booking exists; organizers
/// cancel the event instead.
pub async fn delete_event(pool: &PgPool, event_id: Uuid, caller_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let event = events::fetch_event_for_update(&mut tx, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;

    if event.organizer_id != caller_id {
        return Err(AppError::Forbidden(
            "Only the organizer may delete this event".to_string(),
        ));
    }

    let occupied = bookings::occupied_seats(&mut tx, event_id).await?;
    if occupied > 0 {
        return Err(AppError::InvalidState(format!(
            "Event still has {occupied} reserved seats; cancel it instead"
        )));
    }

    events::delete_event_row(&mut tx, event_id).await?;

    tx.commit().await?;

    tracing::info!(%event_id, "event deleted");

    Ok(())
}

/// Capacity may move, but never below the seats already reserved. The check
/// runs under the event row lock so the occupancy figure cannot go stale
/// between read and write, and a rejected update leaves capacity unchanged.
fn ensure_capacity_floor(capacity: i32, occupied: i64) -> Result<(), AppError> {
    if i64::from(capacity) < occupied {
        return Err(AppError::InvariantViolation(format!(
            "capacity {capacity} is below the {occupied} seats already reserved"
        )));
    }
    Ok(())
}

fn total_pages(total: i64, limit: u32) -> i64 {
    let limit = i64::from(limit);
    (total + limit - 1) / limit
}
