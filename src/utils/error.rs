use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

/// SQLSTATE codes that mean the transaction lost a race and is safe to rerun.
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Database error")]
    DatabaseError(sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::CapacityExceeded(_) => StatusCode::BAD_REQUEST,
            AppError::InvariantViolation(_) => StatusCode::CONFLICT,
            AppError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            AppError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            AppError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// True when the reservation transaction may be rerun after losing a race.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidState(msg)
            | AppError::CapacityExceeded(msg)
            | AppError::InvariantViolation(msg)
            | AppError::ConcurrencyConflict(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

/// Classify driver errors before they cross a service boundary: lost races
/// become `ConcurrencyConflict` so the caller can rerun the transaction,
/// everything else stays an opaque `DatabaseError`.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if let Some(code) = db_err.code() {
                if is_retryable_sqlstate(&code) {
                    return AppError::ConcurrencyConflict(format!(
                        "transaction aborted by concurrent update (SQLSTATE {code})"
                    ));
                }
            }
        }
        AppError::DatabaseError(e)
    }
}

pub fn is_retryable_sqlstate(code: &str) -> bool {
    RETRYABLE_SQLSTATES.contains(&code)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::InvalidState(msg)
            | AppError::CapacityExceeded(msg)
            | AppError::InvariantViolation(msg)
            | AppError::ConcurrencyConflict(msg)
            | AppError::InternalServerError(msg) => msg.clone(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
        };

        // Do not expose internal details in the API response
        let details = None;

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_exceeded_is_a_client_error_with_its_own_code() {
        let err = AppError::CapacityExceeded("sold out".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "CAPACITY_EXCEEDED");
        // Clients must be able to tell "sold out" from generic bad input.
        assert_ne!(err.code(), AppError::ValidationError(String::new()).code());
    }

    #[test]
    fn invariant_violation_maps_to_conflict() {
        let err = AppError::InvariantViolation("capacity below occupied".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn only_concurrency_conflicts_are_retryable() {
        assert!(AppError::ConcurrencyConflict("lost race".into()).is_retryable());
        assert!(!AppError::CapacityExceeded("sold out".into()).is_retryable());
        assert!(!AppError::NotFound("event".into()).is_retryable());
    }

    #[test]
    fn serialization_and_deadlock_sqlstates_are_retryable() {
        assert!(is_retryable_sqlstate("40001"));
        assert!(is_retryable_sqlstate("40P01"));
        assert!(!is_retryable_sqlstate("23505"));
        assert!(!is_retryable_sqlstate("42P01"));
    }
}
