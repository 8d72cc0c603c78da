use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    exp: usize,
}

/// Token issuance lives in the auth collaborator; the server only verifies.
/// This counterpart exists so the tests can mint tokens to verify against.
#[cfg(test)]
pub fn create_jwt(user_id: Uuid, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: user_id,
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Verify a bearer token and return the user id it was issued for.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Uuid, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(data.claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_the_user_id() {
        let user_id = Uuid::new_v4();
        let token = create_jwt(user_id, "test-secret").unwrap();
        assert_eq!(verify_jwt(&token, "test-secret").unwrap(), user_id);
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        let token = create_jwt(Uuid::new_v4(), "secret-a").unwrap();
        assert!(verify_jwt(&token, "secret-b").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(verify_jwt("not-a-token", "test-secret").is_err());
    }
}
