use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_count: i32,
    /// Snapshot of `ticket_count * event.ticket_price` at booking time.
    /// Later price changes on the event do not touch existing bookings.
    pub total_price: Decimal,
    pub confirmation_code: String,
    pub status: BookingStatus,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub number_of_tickets: i32,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentPayload {
    pub transaction_id: String,
    pub method: String,
}

/// Presentation token for a booking, formerly rendered as a QR payload.
/// Uniqueness is backed by the UUID source and enforced again by the unique
/// index on `bookings.confirmation_code`.
pub fn generate_confirmation_code() -> String {
    format!("TKT-{}", Uuid::new_v4().simple().to_string().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_codes_are_distinct() {
        let a = generate_confirmation_code();
        let b = generate_confirmation_code();
        assert_ne!(a, b);
    }

    #[test]
    fn confirmation_codes_carry_the_ticket_prefix() {
        let code = generate_confirmation_code();
        assert!(code.starts_with("TKT-"));
        assert_eq!(code.len(), "TKT-".len() + 32);
    }

    #[test]
    fn register_payload_accepts_the_documented_body() {
        let payload: RegisterPayload = serde_json::from_value(serde_json::json!({
            "numberOfTickets": 2,
            "paymentMethod": "mpesa"
        }))
        .unwrap();
        assert_eq!(payload.number_of_tickets, 2);
        assert_eq!(payload.payment_method.as_deref(), Some("mpesa"));
    }
}
