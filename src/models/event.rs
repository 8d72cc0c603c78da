use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
}

/// Canonical location form. The flat string variant of the legacy API is
/// normalized into a venue-only record at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub venue: String,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub location: Location,
    pub capacity: i32,
    pub ticket_price: Decimal,
    pub categories: Vec<String>,
    pub status: EventStatus,
    /// Users holding at least one active booking. Denormalized view of the
    /// bookings table; only the reservation and cancellation paths write it.
    pub attendees: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Location as clients may send it: the structured record, or the legacy
/// free-text string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LocationInput {
    Text(String),
    Structured {
        venue: String,
        address: Option<String>,
        coordinates: Option<Coordinates>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl LocationInput {
    pub fn normalize(self) -> Location {
        match self {
            LocationInput::Text(venue) => Location {
                venue,
                address: None,
                lat: None,
                lng: None,
            },
            LocationInput::Structured {
                venue,
                address,
                coordinates,
            } => Location {
                venue,
                address,
                lat: coordinates.as_ref().map(|c| c.lat),
                lng: coordinates.as_ref().map(|c| c.lng),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventPayload {
    pub title: String,
    pub description: String,
    /// RFC 3339 timestamp, or a plain `YYYY-MM-DD` paired with `time`.
    pub date: String,
    /// Legacy `HH:MM` field, only meaningful with a plain date.
    pub time: Option<String>,
    pub location: LocationInput,
    pub capacity: i32,
    pub ticket_price: Decimal,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<LocationInput>,
    pub capacity: Option<i32>,
    pub ticket_price: Option<Decimal>,
    pub categories: Option<Vec<String>>,
    pub status: Option<EventStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub status: Option<EventStatus>,
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub events: Vec<Event>,
    pub total: i64,
    pub total_pages: i64,
    pub page: u32,
}

/// Combine the two schedule shapes seen in the wild into one UTC timestamp:
/// either a full RFC 3339 timestamp, or a calendar date plus an `HH:MM` time
/// (midnight when the time is absent).
pub fn parse_starts_at(date: &str, time: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Ok(dt.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
        AppError::ValidationError(format!(
            "'{date}' is not an RFC 3339 timestamp or a YYYY-MM-DD date"
        ))
    })?;

    let clock = match time {
        Some(raw) => NaiveTime::parse_from_str(raw, "%H:%M")
            .map_err(|_| AppError::ValidationError(format!("'{raw}' is not an HH:MM time")))?,
        None => NaiveTime::MIN,
    };

    Ok(Utc.from_utc_datetime(&day.and_time(clock)))
}

/// Apply a partial schedule update on top of the stored timestamp: a new
/// date keeps the existing time-of-day unless a time (or a full RFC 3339
/// timestamp) comes with it, and a bare time re-clocks the existing date.
pub fn merge_starts_at(
    current: DateTime<Utc>,
    date: Option<&str>,
    time: Option<&str>,
) -> Result<DateTime<Utc>, AppError> {
    let base = match date {
        Some(raw) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                dt.with_timezone(&Utc)
            } else {
                let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    AppError::ValidationError(format!(
                        "'{raw}' is not an RFC 3339 timestamp or a YYYY-MM-DD date"
                    ))
                })?;
                Utc.from_utc_datetime(&day.and_time(current.time()))
            }
        }
        None => current,
    };

    match time {
        Some(raw) => {
            let clock = NaiveTime::parse_from_str(raw, "%H:%M")
                .map_err(|_| AppError::ValidationError(format!("'{raw}' is not an HH:MM time")))?;
            Ok(Utc.from_utc_datetime(&base.date_naive().and_time(clock)))
        }
        None => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_rfc3339_timestamps() {
        let dt = parse_starts_at("2025-06-01T18:30:00Z", None).unwrap();
        assert_eq!(dt.hour(), 18);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn combines_legacy_date_and_time_fields() {
        let dt = parse_starts_at("2025-06-01", Some("19:00")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-06-01T19:00:00+00:00");
    }

    #[test]
    fn plain_date_defaults_to_midnight() {
        let dt = parse_starts_at("2025-06-01", None).unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn rejects_unparseable_schedules() {
        assert!(parse_starts_at("next friday", None).is_err());
        assert!(parse_starts_at("2025-06-01", Some("7pm")).is_err());
    }

    #[test]
    fn date_only_update_keeps_the_stored_time_of_day() {
        let current = parse_starts_at("2025-06-01T19:30:00Z", None).unwrap();
        let merged = merge_starts_at(current, Some("2025-07-04"), None).unwrap();
        assert_eq!(merged.to_rfc3339(), "2025-07-04T19:30:00+00:00");
    }

    #[test]
    fn time_only_update_keeps_the_stored_date() {
        let current = parse_starts_at("2025-06-01T19:30:00Z", None).unwrap();
        let merged = merge_starts_at(current, None, Some("09:00")).unwrap();
        assert_eq!(merged.to_rfc3339(), "2025-06-01T09:00:00+00:00");
    }

    #[test]
    fn full_timestamp_replaces_the_schedule() {
        let current = parse_starts_at("2025-06-01T19:30:00Z", None).unwrap();
        let merged = merge_starts_at(current, Some("2025-08-10T12:00:00Z"), None).unwrap();
        assert_eq!(merged.to_rfc3339(), "2025-08-10T12:00:00+00:00");
    }

    #[test]
    fn merged_updates_still_reject_bad_input() {
        let current = parse_starts_at("2025-06-01T19:30:00Z", None).unwrap();
        assert!(merge_starts_at(current, Some("soon"), None).is_err());
        assert!(merge_starts_at(current, None, Some("noon")).is_err());
    }

    #[test]
    fn free_text_location_becomes_venue_only_record() {
        let loc = LocationInput::Text("Uhuru Gardens".to_string()).normalize();
        assert_eq!(loc.venue, "Uhuru Gardens");
        assert!(loc.address.is_none());
        assert!(loc.lat.is_none());
    }

    #[test]
    fn structured_location_keeps_coordinates() {
        let input: LocationInput = serde_json::from_value(serde_json::json!({
            "venue": "KICC",
            "address": "Harambee Ave, Nairobi",
            "coordinates": { "lat": -1.2895, "lng": 36.8235 }
        }))
        .unwrap();
        let loc = input.normalize();
        assert_eq!(loc.venue, "KICC");
        assert_eq!(loc.address.as_deref(), Some("Harambee Ave, Nairobi"));
        assert_eq!(loc.lat, Some(-1.2895));
        assert_eq!(loc.lng, Some(36.8235));
    }

    #[test]
    fn legacy_string_location_still_deserializes() {
        let input: LocationInput =
            serde_json::from_value(serde_json::json!("City Hall")).unwrap();
        assert!(matches!(input, LocationInput::Text(_)));
    }
}
