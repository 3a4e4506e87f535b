//! HTTP route handlers.

pub mod boundaries;
pub mod rasters;
pub mod users;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// All `/api` routes except the liveness probe.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(users::routes())
        .merge(boundaries::routes())
        .merge(rasters::routes())
}
