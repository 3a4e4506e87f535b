//! Command implementations.

pub mod api;
pub mod worker;

use std::sync::Arc;

use veld_blob::{S3BlobStore, S3Config, S3SatelliteSource, SatelliteConfig};
use veld_core::error::Result;
use veld_store::{BlobStore, Datastore, MongoConfig, MongoStore, SatelliteSource};

use crate::config::Config;

/// Connects the document store.
pub(crate) async fn build_store(config: &Config) -> Result<Arc<dyn Datastore>> {
    let store = MongoStore::connect(&MongoConfig {
        uri: config.mongodb_uri.clone(),
        database: config.database.clone(),
    })
    .await?;
    tracing::info!(database = %config.database, "document store connected");
    Ok(Arc::new(store))
}

/// Builds the application bucket adapter over the store's audit collection.
pub(crate) async fn build_blobs(
    config: &Config,
    store: Arc<dyn Datastore>,
) -> Result<Arc<dyn BlobStore>> {
    let mut s3_config = S3Config::for_bucket(&config.bucket);
    if !config.is_prod() {
        s3_config.endpoint = config.object_store_endpoint.clone();
        s3_config.access_key = config.object_store_key.clone();
        s3_config.secret_key = config.object_store_secret.clone();
    }
    let blobs = S3BlobStore::new(&s3_config, store).await;
    tracing::info!(bucket = %config.bucket, "application bucket client ready");
    Ok(Arc::new(blobs))
}

/// Builds the anonymous satellite bucket reader.
pub(crate) async fn build_satellite(config: &Config) -> Arc<dyn SatelliteSource> {
    let mut satellite_config = SatelliteConfig::default();
    if let Some(endpoint) = &config.inventory_endpoint {
        satellite_config.inventory_endpoint = Some(endpoint.clone());
    }
    if let Some(endpoint) = &config.imagery_endpoint {
        satellite_config.imagery_endpoint = Some(endpoint.clone());
    }
    Arc::new(S3SatelliteSource::new(satellite_config).await)
}
