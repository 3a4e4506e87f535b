//! API server wiring.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use veld_core::error::{Error, Result};
use veld_store::{BlobStore, Datastore};

use crate::config::ApiConfig;
use crate::routes;

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: ApiConfig,
    /// The document store.
    pub store: Arc<dyn Datastore>,
    /// The application bucket.
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Creates the application state.
    #[must_use]
    pub fn new(config: ApiConfig, store: Arc<dyn Datastore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            config,
            store,
            blobs,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &"<Datastore>")
            .field("blobs", &"<BlobStore>")
            .finish()
    }
}

/// Builds the full router over the given state.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/alive", get(alive))
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds and serves until the process is stopped.
///
/// # Errors
///
/// Returns bind and serve failures.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "api listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|err| Error::internal(format!("server stopped: {err}")))
}

async fn alive() -> &'static str {
    "veld geo service alive"
}
