//! Account signup and signin.
//!
//! ## Routes
//!
//! - `POST /api/signup` - Create an account, returning a token
//! - `POST /api/signin` - Verify credentials, returning a token

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use veld_store::User;

use crate::auth::{hash_password, issue_token, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Hard cap on accounts; this is a small self-hosted service.
const MAX_USERS: u64 = 1000;
const MIN_PASSWORD_LEN: usize = 8;

/// Credentials for signup and signin.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    /// Account name (alphanumeric).
    pub name: String,
    /// Plaintext password.
    pub password: String,
}

/// The user routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/signin", post(signin))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<String> {
    if request.name.is_empty() || !request.name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::bad_request("name must be alphanumeric"));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("password less than 8 characters"));
    }

    if state.store.count_users().await.map_err(ApiError::from)? >= MAX_USERS {
        return Err(ApiError::conflict("user limit reached"));
    }
    if state
        .store
        .find_user_by_name(&request.name)
        .await
        .map_err(ApiError::from)?
        .is_some()
    {
        return Err(ApiError::conflict("user name already exists"));
    }

    let hash = hash_password(&request.password).map_err(ApiError::from)?;
    let mut user = User::new(&request.name, hash);
    state
        .store
        .save_user(&mut user)
        .await
        .map_err(ApiError::from)?;
    tracing::info!(user_id = %user.id, name = %user.name, "account created");

    let token = issue_token(&state.config.jwt_secret, &user.name, state.config.token_ttl)
        .map_err(ApiError::from)?;
    Ok(token)
}

async fn signin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CredentialsRequest>,
) -> ApiResult<String> {
    let user = state
        .store
        .find_user_by_name(&request.name)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(ApiError::invalid_token)?;

    if !verify_password(&request.password, &user.password) {
        return Err(ApiError::invalid_token());
    }

    let token = issue_token(&state.config.jwt_secret, &user.name, state.config.token_ttl)
        .map_err(ApiError::from)?;
    Ok(token)
}
