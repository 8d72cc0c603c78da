//! Reservation and Cancellation services.
//!
//! Every capacity-bearing mutation runs inside one Postgres transaction that
//! first takes a `FOR UPDATE` row lock on the event. The lock serializes
//! registrations and cancellations per event, and the occupancy figure is
//! recomputed from the bookings table inside the lock, so two concurrent
//! requests for the last seat can never both pass the check. Lost races that
//! still surface from the driver (SQLSTATE 40001/40P01) are classified as
//! `ConcurrencyConflict` and rerun with a fresh capacity check.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::booking::{generate_confirmation_code, Booking, ConfirmPaymentPayload,
    RegisterPayload};
use crate::models::event::EventStatus;
use crate::store::{bookings, events};
use crate::utils::error::AppError;

/// Bounded rerun budget for transactions that lose a race.
const MAX_RESERVE_ATTEMPTS: u32 = 3;

pub async fn register_for_event(
    pool: &PgPool,
    event_id: Uuid,
    user_id: Uuid,
    payload: RegisterPayload,
) -> Result<Booking, AppError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_register(pool, event_id, user_id, &payload).await {
            Err(e) if e.is_retryable() => {
                if attempt < MAX_RESERVE_ATTEMPTS {
                    tracing::warn!(%event_id, attempt, "reservation lost a race, retrying");
                    continue;
                }
                return Err(registration_conflict_exhausted(e));
            }
            result => return result,
        }
    }
}

/// A conflict that survives the retry budget means the event is under heavy
/// contention for its remaining seats. The raw conflict never reaches the
/// client on the registration path; it surfaces as the sold-out error so
/// callers get the same messaging they would after losing the seat outright.
fn registration_conflict_exhausted(err: AppError) -> AppError {
    match err {
        AppError::ConcurrencyConflict(_) => AppError::CapacityExceeded(
            "Event is sold out or under heavy demand, no seats could be reserved".to_string(),
        ),
        other => other,
    }
}

async fn try_register(
    pool: &PgPool,
    event_id: Uuid,
    user_id: Uuid,
    payload: &RegisterPayload,
) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;

    let event = events::fetch_event_for_update(&mut tx, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;

    if event.status != EventStatus::Published {
        return Err(AppError::InvalidState(
            "Event is not open for registration".to_string(),
        ));
    }

    if payload.number_of_tickets < 1 {
        return Err(AppError::ValidationError(
            "numberOfTickets must be at least 1".to_string(),
        ));
    }

    // Occupancy comes from the bookings table, not the attendees cache.
    let occupied = bookings::occupied_seats(&mut tx, event_id).await?;
    ensure_capacity(occupied, payload.number_of_tickets, event.capacity)?;

    let booking = bookings::insert_booking(
        &mut tx,
        bookings::NewBooking {
            event_id,
            user_id,
            ticket_count: payload.number_of_tickets,
            total_price: total_price(event.ticket_price, payload.number_of_tickets),
            confirmation_code: generate_confirmation_code(),
            payment_method: payload.payment_method.clone(),
        },
    )
    .await?;

    events::add_attendee(&mut tx, event_id, user_id).await?;

    tx.commit().await?;

    tracing::info!(
        %event_id, %user_id, booking_id = %booking.id,
        tickets = booking.ticket_count, "registration created"
    );

    Ok(booking)
}

pub async fn cancel_registration(
    pool: &PgPool,
    event_id: Uuid,
    user_id: Uuid,
) -> Result<(), AppError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_cancel(pool, event_id, user_id).await {
            Err(e) if e.is_retryable() => {
                if attempt < MAX_RESERVE_ATTEMPTS {
                    tracing::warn!(%event_id, attempt, "cancellation lost a race, retrying");
                    continue;
                }
                return Err(cancellation_conflict_exhausted(e));
            }
            result => return result,
        }
    }
}

/// Cancellation has no sold-out analogue, so an exhausted retry budget
/// degrades to a generic retriable server error. The transaction rolled
/// back, so no partial state is visible.
fn cancellation_conflict_exhausted(err: AppError) -> AppError {
    match err {
        AppError::ConcurrencyConflict(_) => AppError::InternalServerError(
            "Could not cancel the registration, please try again".to_string(),
        ),
        other => other,
    }
}

async fn try_cancel(pool: &PgPool, event_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    // Same lock order as registration: event row first.
    events::fetch_event_for_update(&mut tx, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;

    let voided = bookings::cancel_active_for_user(&mut tx, event_id, user_id).await?;
    let cancelled = classify_cancellation(voided)?;

    events::remove_attendee(&mut tx, event_id, user_id).await?;

    tx.commit().await?;

    tracing::info!(%event_id, %user_id, bookings = cancelled, "registration cancelled");

    Ok(())
}

/// Payment-collaborator seam: flips `pending -> confirmed` and records the
/// payment reference. The conditional update carries the state check; a miss
/// is classified afterwards so the caller can tell 404 from a bad state.
pub async fn confirm_booking(
    pool: &PgPool,
    booking_id: Uuid,
    user_id: Uuid,
    payload: ConfirmPaymentPayload,
) -> Result<Booking, AppError> {
    let mut tx = pool.begin().await?;

    let confirmed = bookings::confirm_booking_row(
        &mut tx,
        booking_id,
        user_id,
        &payload.transaction_id,
        &payload.method,
    )
    .await?;

    let booking = match confirmed {
        Some(booking) => booking,
        None => {
            // Bookings owned by someone else stay invisible.
            return match bookings::fetch_booking_for_user(&mut tx, booking_id, user_id).await? {
                Some(_) => Err(AppError::InvalidState(
                    "Only pending bookings can be confirmed".to_string(),
                )),
                None => Err(AppError::NotFound(format!("Booking {booking_id} not found"))),
            };
        }
    };

    tx.commit().await?;

    tracing::info!(booking_id = %booking.id, "booking confirmed");

    Ok(booking)
}

/// Zero voided bookings means there was nothing to cancel: the first
/// cancellation already ran (or never existed), so the repeat attempt fails
/// with `NotFound` and the enclosing transaction changes nothing.
fn classify_cancellation(voided: u64) -> Result<u64, AppError> {
    if voided == 0 {
        return Err(AppError::NotFound(
            "Registration not found or already cancelled".to_string(),
        ));
    }
    Ok(voided)
}

/// The central invariant: issued seats never exceed capacity.
fn ensure_capacity(occupied: i64, requested: i32, capacity: i32) -> Result<(), AppError> {
    if occupied + i64::from(requested) > i64::from(capacity) {
        let remaining = (i64::from(capacity) - occupied).max(0);
        return Err(AppError::CapacityExceeded(format!(
            "Event is sold out: {remaining} of {capacity} seats remaining, {requested} requested"
        )));
    }
    Ok(())
}

/// Price is snapshotted onto the booking; later event price changes do not
/// reprice it.
fn total_price(ticket_price: Decimal, tickets: i32) -> Decimal {
    ticket_price * Decimal::from(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_fills_the_event() {
        // 3 booked of 5, asking for 2 lands exactly on capacity.
        assert!(ensure_capacity(3, 2, 5).is_ok());
    }

    #[test]
    fn one_over_capacity_is_rejected() {
        // 3 booked of 5, asking for 3 would oversell.
        let err = ensure_capacity(3, 3, 5).unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));
    }

    #[test]
    fn last_seat_goes_to_exactly_one_request() {
        // Both callers observe occupied = 0 only if serialized; the second
        // one recomputes under the lock and sees 1.
        assert!(ensure_capacity(0, 1, 1).is_ok());
        assert!(ensure_capacity(1, 1, 1).is_err());
    }

    #[test]
    fn a_full_event_rejects_any_request() {
        let err = ensure_capacity(5, 1, 5).unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));
    }

    #[test]
    fn cancellation_frees_seats_for_the_next_caller() {
        // Scenario from the contract: 5 of 5 taken, a 2-ticket cancellation
        // makes a 2-ticket registration possible again.
        assert!(ensure_capacity(5, 2, 5).is_err());
        assert!(ensure_capacity(3, 2, 5).is_ok());
    }

    #[test]
    fn total_price_scales_with_ticket_count() {
        assert_eq!(total_price(Decimal::from(500), 2), Decimal::from(1000));
        assert_eq!(total_price(Decimal::from(1000), 1), Decimal::from(1000));
    }

    #[test]
    fn free_events_price_at_zero() {
        assert_eq!(total_price(Decimal::ZERO, 4), Decimal::ZERO);
    }

    #[test]
    fn repeat_cancellation_fails_with_not_found() {
        // The first cancellation voids the bookings; the second finds none.
        assert_eq!(classify_cancellation(1).unwrap(), 1);
        assert!(matches!(
            classify_cancellation(0),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn exhausted_registration_conflict_surfaces_as_sold_out() {
        let surfaced =
            registration_conflict_exhausted(AppError::ConcurrencyConflict("lost race".into()));
        assert!(matches!(surfaced, AppError::CapacityExceeded(_)));
        // Non-conflicts pass through untouched.
        let other = registration_conflict_exhausted(AppError::NotFound("event".into()));
        assert!(matches!(other, AppError::NotFound(_)));
    }

    #[test]
    fn exhausted_cancellation_conflict_stays_generic() {
        let surfaced =
            cancellation_conflict_exhausted(AppError::ConcurrencyConflict("lost race".into()));
        assert!(matches!(surfaced, AppError::InternalServerError(_)));
    }

    // In-memory replay of the decision logic the two services compose. The
    // ledger mirrors the storage semantics: occupancy is always recomputed
    // from active bookings, the attendee view adds a user only when absent
    // and drops them once they hold no active booking.
    mod ledger {
        use super::super::{classify_cancellation, ensure_capacity};
        use crate::utils::error::AppError;
        use uuid::Uuid;

        #[derive(Default)]
        pub struct Ledger {
            pub bookings: Vec<(Uuid, i32, bool)>, // (user, tickets, active)
            pub attendees: Vec<Uuid>,
        }

        impl Ledger {
            pub fn occupied(&self) -> i64 {
                self.bookings
                    .iter()
                    .filter(|(_, _, active)| *active)
                    .map(|(_, n, _)| i64::from(*n))
                    .sum()
            }

            pub fn register(&mut self, user: Uuid, tickets: i32, capacity: i32) -> Result<(), AppError> {
                ensure_capacity(self.occupied(), tickets, capacity)?;
                self.bookings.push((user, tickets, true));
                if !self.attendees.contains(&user) {
                    self.attendees.push(user);
                }
                Ok(())
            }

            pub fn cancel(&mut self, user: Uuid) -> Result<(), AppError> {
                let mut voided = 0u64;
                for booking in &mut self.bookings {
                    if booking.0 == user && booking.2 {
                        booking.2 = false;
                        voided += 1;
                    }
                }
                classify_cancellation(voided)?;
                self.attendees.retain(|a| *a != user);
                Ok(())
            }

            /// The lockstep invariant: the attendee view is exactly the set
            /// of users with at least one active booking.
            pub fn is_consistent(&self) -> bool {
                let mut active_users: Vec<Uuid> = self
                    .bookings
                    .iter()
                    .filter(|(_, _, active)| *active)
                    .map(|(u, _, _)| *u)
                    .collect();
                active_users.sort();
                active_users.dedup();
                let mut attendees = self.attendees.clone();
                attendees.sort();
                attendees == active_users
            }
        }
    }

    #[test]
    fn cancel_then_rebook_keeps_accounting_consistent() {
        use ledger::Ledger;
        let capacity = 5;
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut ledger = Ledger::default();

        // Fill the event: 3 + 2 of 5.
        ledger.register(alice, 3, capacity).unwrap();
        ledger.register(bob, 2, capacity).unwrap();
        assert_eq!(ledger.occupied(), 5);
        assert!(ledger.is_consistent());

        // Sold out for carol.
        assert!(matches!(
            ledger.register(carol, 2, capacity),
            Err(AppError::CapacityExceeded(_))
        ));

        // Bob cancels; his 2 seats free up and he leaves the attendee view.
        ledger.cancel(bob).unwrap();
        assert_eq!(ledger.occupied(), 3);
        assert!(ledger.is_consistent());
        assert!(!ledger.attendees.contains(&bob));

        // Cancelling again changes nothing.
        let before = ledger.occupied();
        assert!(matches!(ledger.cancel(bob), Err(AppError::NotFound(_))));
        assert_eq!(ledger.occupied(), before);
        assert!(ledger.is_consistent());

        // Carol's 2 tickets now fit where they did not before.
        ledger.register(carol, 2, capacity).unwrap();
        assert_eq!(ledger.occupied(), 5);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn multiple_bookings_by_one_user_list_them_once() {
        use ledger::Ledger;
        let user = Uuid::new_v4();
        let mut ledger = Ledger::default();
        ledger.register(user, 1, 10).unwrap();
        ledger.register(user, 2, 10).unwrap();
        assert_eq!(ledger.occupied(), 3);
        assert_eq!(ledger.attendees.len(), 1);
        assert!(ledger.is_consistent());

        // One cancellation voids every booking the user holds.
        ledger.cancel(user).unwrap();
        assert_eq!(ledger.occupied(), 0);
        assert!(ledger.attendees.is_empty());
        assert!(ledger.is_consistent());
    }
}
