//! Token issuing, verification and the authenticated-user extractor.
//!
//! Tokens are HS256 JWTs carrying the account name, sent back by clients in
//! the `token` header. Verification resolves the account row so handlers
//! always see a live user; disabled accounts are rejected here.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use veld_core::error::{Error, Result};
use veld_store::User;

use crate::error::ApiError;
use crate::server::AppState;

/// bcrypt work factor for stored password hashes.
const BCRYPT_COST: u32 = 12;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    name: String,
    authorized: bool,
    exp: i64,
}

/// Issues a token for an account name.
///
/// # Errors
///
/// Returns an internal error when signing fails.
pub fn issue_token(secret: &str, name: &str, ttl: std::time::Duration) -> Result<String> {
    let exp = bson::DateTime::now().timestamp_millis() / 1000
        + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    let claims = Claims {
        name: name.to_string(),
        authorized: true,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| Error::internal(format!("failed to sign token: {err}")))
}

/// Verifies a token and returns the account name it names.
///
/// # Errors
///
/// Returns [`ApiError::invalid_token`] for bad signatures or expiry.
pub fn verify_token(secret: &str, token: &str) -> std::result::Result<String, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.name)
    .map_err(|_| ApiError::invalid_token())
}

/// Hashes a plaintext password for storage.
///
/// # Errors
///
/// Returns an internal error when hashing fails.
pub fn hash_password(raw: &str) -> Result<String> {
    bcrypt::hash(raw, BCRYPT_COST)
        .map_err(|err| Error::internal(format!("failed to hash password: {err}")))
}

/// Checks a plaintext password against a stored hash.
#[must_use]
pub fn verify_password(raw: &str, hash: &str) -> bool {
    bcrypt::verify(raw, hash).unwrap_or(false)
}

/// The authenticated account, resolved from the `token` header.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("token")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(ApiError::missing_auth)?;

        let name = verify_token(&state.config.jwt_secret, token)?;
        let user = state
            .store
            .find_user_by_name(&name)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(ApiError::invalid_token)?;
        if !user.enabled {
            return Err(ApiError::forbidden("account disabled"));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token =
            issue_token("secret", "ada", std::time::Duration::from_secs(60)).expect("issue");
        let name = verify_token("secret", &token).expect("verify");
        assert_eq!(name, "ada");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token =
            issue_token("secret", "ada", std::time::Duration::from_secs(60)).expect("issue");
        assert!(verify_token("other", &token).is_err());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse battery").expect("hash");
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong", &hash));
    }
}
