//! Event Store: every query that touches the `events` table.
//!
//! Row-lock helpers take `&mut PgConnection` so callers must hold a
//! transaction; plain reads take the pool.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::event::{Event, EventStatus, Location};

pub struct NewEvent {
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub location: Location,
    pub capacity: i32,
    pub ticket_price: rust_decimal::Decimal,
    pub categories: Vec<String>,
}

pub async fn insert_event(pool: &PgPool, new: NewEvent) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        INSERT INTO events
            (organizer_id, title, description, starts_at,
             venue, address, lat, lng,
             capacity, ticket_price, categories, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'draft')
        RETURNING *
        "#,
    )
    .bind(new.organizer_id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.starts_at)
    .bind(&new.location.venue)
    .bind(&new.location.address)
    .bind(new.location.lat)
    .bind(new.location.lng)
    .bind(new.capacity)
    .bind(new.ticket_price)
    .bind(&new.categories)
    .fetch_one(pool)
    .await
}

pub async fn fetch_event(pool: &PgPool, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Load an event under a row lock. Serializes all capacity-bearing mutations
/// for one event while leaving other events untouched.
pub async fn fetch_event_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn list_events(
    pool: &PgPool,
    status: EventStatus,
    category: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Event>, i64), sqlx::Error> {
    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT * FROM events
        WHERE status = $1 AND ($2::TEXT IS NULL OR $2 = ANY(categories))
        ORDER BY starts_at ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(status)
    .bind(category)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM events
        WHERE status = $1 AND ($2::TEXT IS NULL OR $2 = ANY(categories))
        "#,
    )
    .bind(status)
    .bind(category)
    .fetch_one(pool)
    .await?;

    Ok((events, total))
}

pub async fn list_events_by_organizer(
    pool: &PgPool,
    organizer_id: Uuid,
) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        "SELECT * FROM events WHERE organizer_id = $1 ORDER BY starts_at ASC",
    )
    .bind(organizer_id)
    .fetch_all(pool)
    .await
}

/// Events for which the user holds at least one active booking.
pub async fn list_registered_events(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Event>, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        SELECT DISTINCT e.* FROM events e
        JOIN bookings b ON b.event_id = e.id
        WHERE b.user_id = $1 AND b.status <> 'cancelled'
        ORDER BY e.starts_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Persist a fully merged event. Callers lock the row first and apply field
/// changes in memory, so this writes every mutable column in one statement.
pub async fn update_event_row(conn: &mut PgConnection, event: &Event) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(
        r#"
        UPDATE events SET
            title = $2, description = $3, starts_at = $4,
            venue = $5, address = $6, lat = $7, lng = $8,
            capacity = $9, ticket_price = $10, categories = $11, status = $12,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.starts_at)
    .bind(&event.location.venue)
    .bind(&event.location.address)
    .bind(event.location.lat)
    .bind(event.location.lng)
    .bind(event.capacity)
    .bind(event.ticket_price)
    .bind(&event.categories)
    .bind(event.status)
    .fetch_one(conn)
    .await
}

pub async fn delete_event_row(conn: &mut PgConnection, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Add a user to the denormalized attendee view. No-op when already present,
/// so a second booking by the same user does not duplicate the entry.
pub async fn add_attendee(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE events
        SET attendees = array_append(attendees, $2), updated_at = now()
        WHERE id = $1 AND NOT ($2 = ANY(attendees))
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn remove_attendee(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE events
        SET attendees = array_remove(attendees, $2), updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn clear_attendees(conn: &mut PgConnection, event_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE events SET attendees = '{}', updated_at = now() WHERE id = $1")
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}
