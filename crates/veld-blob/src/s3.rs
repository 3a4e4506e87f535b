//! The credentialed application bucket.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use aws_smithy_types::timeout::TimeoutConfig;

use veld_core::error::Result;
use veld_store::{BlobStore, Datastore};

use crate::transfer::{download_to_file, upload_file};

/// Application bucket configuration.
///
/// Outside prod the adapter talks to a MinIO-style endpoint with static
/// credentials and path-style addressing; in prod the SDK's default
/// credential chain is used.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// AWS region.
    pub region: String,
    /// Endpoint override (LocalStack/MinIO); implies path-style addressing.
    pub endpoint: Option<String>,
    /// Static access key (non-prod).
    pub access_key: Option<String>,
    /// Static secret key (non-prod).
    pub secret_key: Option<String>,
}

impl S3Config {
    /// Prod-style configuration: default credential chain, no endpoint
    /// override.
    #[must_use]
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: "us-west-2".to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }
}

pub(crate) async fn build_client(
    region: &str,
    endpoint: Option<&str>,
    credentials: Option<(&str, &str)>,
    anonymous: bool,
) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(120))
                .build(),
        );
    if anonymous {
        loader = loader.no_credentials();
    } else if let Some((key, secret)) = credentials {
        loader = loader.credentials_provider(Credentials::new(key, secret, None, None, "static"));
    }
    let shared = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(endpoint) = endpoint {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }
    Client::from_conf(builder.build())
}

/// S3-backed application bucket.
///
/// Every successful `put` and `delete` is mirrored into the `object_store`
/// audit collection.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    audit: Arc<dyn Datastore>,
}

impl S3BlobStore {
    /// Builds the adapter from configuration plus the audit store.
    pub async fn new(config: &S3Config, audit: Arc<dyn Datastore>) -> Self {
        let credentials = config
            .access_key
            .as_deref()
            .zip(config.secret_key.as_deref());
        let client = build_client(
            &config.region,
            config.endpoint.as_deref(),
            credentials,
            false,
        )
        .await;
        Self {
            client,
            bucket: config.bucket.clone(),
            audit,
        }
    }

    /// Wraps an already-built client.
    #[must_use]
    pub fn from_client(
        client: Client,
        bucket: impl Into<String>,
        audit: Arc<dyn Datastore>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            audit,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, local_path: &Path, object_path: &str) -> Result<()> {
        upload_file(&self.client, &self.bucket, object_path, local_path).await?;
        self.audit.record_object(object_path, true).await?;
        tracing::debug!(key = object_path, "uploaded object");
        Ok(())
    }

    async fn get(&self, local_path: &Path, object_path: &str) -> Result<()> {
        let bytes = download_to_file(&self.client, &self.bucket, object_path, local_path).await?;
        tracing::debug!(key = object_path, bytes = bytes, "downloaded object");
        Ok(())
    }

    async fn delete(&self, object_path: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(object_path)
            .send()
            .await
            .map_err(|err| {
                veld_core::Error::blob_with_source(
                    format!("delete {}/{object_path}", self.bucket),
                    err.into_service_error(),
                )
            })?;
        self.audit.record_object(object_path, false).await?;
        tracing::debug!(key = object_path, "deleted object");
        Ok(())
    }
}
