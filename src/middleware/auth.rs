//! Bearer-token extractor. Token issuance and refresh live in the auth
//! collaborator; this service only verifies the signature and hands the
//! user id to handlers.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};

use crate::utils::error::AppError;
use crate::utils::jwt::verify_jwt;
use crate::AppState;

#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::AuthError("Missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| AppError::AuthError("Invalid Authorization header".to_string()))?;

        let token = raw
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::AuthError("Invalid token format".to_string()))?;

        let user_id = verify_jwt(token, &state.config.jwt_secret)
            .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))?;

        Ok(AuthUser { user_id })
    }
}
