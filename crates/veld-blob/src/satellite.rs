//! The provider's read-only inventory and imagery buckets.

use std::path::Path;

use async_trait::async_trait;

use veld_core::error::Result;
use veld_store::{SatelliteBucket, SatelliteSource};

use crate::s3::build_client;
use crate::transfer::download_to_file;

/// Satellite bucket configuration.
///
/// The provider publishes both buckets for anonymous reads; the imagery
/// endpoint is configurable so a mirror or cache can be pointed at.
#[derive(Debug, Clone)]
pub struct SatelliteConfig {
    /// Daily inventory bucket (manifest + gzipped CSV listings).
    pub inventory_bucket: String,
    /// Imagery bucket (band rasters + sidecar metadata).
    pub imagery_bucket: String,
    /// Inventory endpoint override.
    pub inventory_endpoint: Option<String>,
    /// Imagery endpoint override.
    pub imagery_endpoint: Option<String>,
    /// AWS region.
    pub region: String,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            inventory_bucket: "sentinel-cogs-inventory".to_string(),
            imagery_bucket: "sentinel-cogs".to_string(),
            inventory_endpoint: Some("https://s3.us-west-2.amazonaws.com".to_string()),
            imagery_endpoint: None,
            region: "us-west-2".to_string(),
        }
    }
}

/// Anonymous-credential reader for the satellite buckets.
#[derive(Clone)]
pub struct S3SatelliteSource {
    inventory: aws_sdk_s3::Client,
    imagery: aws_sdk_s3::Client,
    config: SatelliteConfig,
}

impl S3SatelliteSource {
    /// Builds clients for both buckets.
    pub async fn new(config: SatelliteConfig) -> Self {
        let inventory = build_client(
            &config.region,
            config.inventory_endpoint.as_deref(),
            None,
            true,
        )
        .await;
        let imagery = build_client(
            &config.region,
            config.imagery_endpoint.as_deref(),
            None,
            true,
        )
        .await;
        Self {
            inventory,
            imagery,
            config,
        }
    }
}

#[async_trait]
impl SatelliteSource for S3SatelliteSource {
    async fn fetch(
        &self,
        local_path: &Path,
        object_path: &str,
        bucket: SatelliteBucket,
    ) -> Result<()> {
        let (client, bucket_name) = match bucket {
            SatelliteBucket::Inventory => (&self.inventory, &self.config.inventory_bucket),
            SatelliteBucket::Imagery => (&self.imagery, &self.config.imagery_bucket),
        };
        let bytes = download_to_file(client, bucket_name, object_path, local_path).await?;
        tracing::debug!(
            bucket = bucket_name.as_str(),
            key = object_path,
            mb = bytes / 1_000_000,
            "downloaded satellite object"
        );
        Ok(())
    }
}
