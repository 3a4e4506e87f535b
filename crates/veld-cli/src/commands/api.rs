//! `veld api` - serve the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;

use veld_api::{ApiConfig, AppState};

use crate::config::Config;
use crate::ApiArgs;

/// Connects the backing services and serves until stopped.
pub async fn execute(args: ApiArgs, config: &Config) -> Result<()> {
    if let Some(name) = &args.name {
        tracing::info!(name = %name, "starting api");
    }

    let store = super::build_store(config).await?;
    let blobs = super::build_blobs(config, Arc::clone(&store)).await?;

    let api_config = ApiConfig::new(&config.jwt_secret)
        .with_bind_addr(SocketAddr::from(([0, 0, 0, 0], args.port)));
    let state = Arc::new(AppState::new(api_config, store, blobs));
    veld_api::serve(state).await?;
    Ok(())
}
