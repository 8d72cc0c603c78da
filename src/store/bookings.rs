//! Booking Store: every query that touches the `bookings` table.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::models::booking::Booking;

pub struct NewBooking {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_count: i32,
    pub total_price: Decimal,
    pub confirmation_code: String,
    pub payment_method: Option<String>,
}

/// Sum of tickets across non-cancelled bookings: the source of truth for how
/// many seats an event has issued. The event's `attendees` array is only a
/// cache of who holds them.
pub async fn occupied_seats(conn: &mut PgConnection, event_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(ticket_count), 0)::BIGINT
        FROM bookings
        WHERE event_id = $1 AND status <> 'cancelled'
        "#,
    )
    .bind(event_id)
    .fetch_one(conn)
    .await
}

pub async fn insert_booking(
    conn: &mut PgConnection,
    new: NewBooking,
) -> Result<Booking, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        r#"
        INSERT INTO bookings
            (event_id, user_id, ticket_count, total_price, confirmation_code,
             status, payment_method)
        VALUES ($1, $2, $3, $4, $5, 'pending', $6)
        RETURNING *
        "#,
    )
    .bind(new.event_id)
    .bind(new.user_id)
    .bind(new.ticket_count)
    .bind(new.total_price)
    .bind(&new.confirmation_code)
    .bind(&new.payment_method)
    .fetch_one(conn)
    .await
}

/// Soft-cancel every active booking the user holds for the event. Returns how
/// many bookings were flipped; zero means there was nothing to cancel.
pub async fn cancel_active_for_user(
    conn: &mut PgConnection,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = 'cancelled', updated_at = now()
        WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'
        "#,
    )
    .bind(event_id)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Cascade used when an event itself is cancelled.
pub async fn cancel_all_active_for_event(
    conn: &mut PgConnection,
    event_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = 'cancelled', updated_at = now()
        WHERE event_id = $1 AND status <> 'cancelled'
        "#,
    )
    .bind(event_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Flip a pending booking to confirmed and attach the payment reference.
/// Scoped to the owning user and the `pending` status so the update itself is
/// the authorization and state check.
pub async fn confirm_booking_row(
    conn: &mut PgConnection,
    booking_id: Uuid,
    user_id: Uuid,
    transaction_id: &str,
    method: &str,
) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>(
        r#"
        UPDATE bookings
        SET status = 'confirmed',
            payment_transaction_id = $3,
            payment_method = $4,
            updated_at = now()
        WHERE id = $1 AND user_id = $2 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(booking_id)
    .bind(user_id)
    .bind(transaction_id)
    .bind(method)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_booking_for_user(
    conn: &mut PgConnection,
    booking_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Booking>, sqlx::Error> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 AND user_id = $2")
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
}
