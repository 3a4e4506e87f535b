//! The blob-layer contract.
//!
//! Two distinct roles, two traits:
//!
//! - [`BlobStore`] is the credentialed application bucket. Every successful
//!   mutation is mirrored into the `object_store` audit collection by the
//!   implementation.
//! - [`SatelliteSource`] is the provider's read-only inventory and imagery
//!   buckets, reached with anonymous credentials.
//!
//! Both move whole objects between the store and local files: the band
//! rasters are consumed from disk by the NDVI subprocess, so there is no
//! point streaming them through memory.

use std::path::Path;

use async_trait::async_trait;

use veld_core::error::Result;

/// The credentialed application bucket.
///
/// A missing object on `get` surfaces as [`veld_core::Error::NotFound`];
/// `delete` of a missing object succeeds (idempotent).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads a local file under the given key and records
    /// `(path, exists=true)` in the audit collection.
    async fn put(&self, local_path: &Path, object_path: &str) -> Result<()>;

    /// Downloads an object to a local file.
    async fn get(&self, local_path: &Path, object_path: &str) -> Result<()>;

    /// Deletes an object and records `(path, exists=false)` in the audit
    /// collection.
    async fn delete(&self, object_path: &str) -> Result<()>;
}

/// Which provider bucket an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatelliteBucket {
    /// The daily inventory (manifest JSON + gzipped CSV listings).
    Inventory,
    /// The imagery bucket (band rasters + sidecar metadata).
    Imagery,
}

/// The provider's read-only buckets.
///
/// A missing object surfaces as [`veld_core::Error::NotFound`], which the
/// manifest probe relies on to fall through to its second date-key
/// candidate.
#[async_trait]
pub trait SatelliteSource: Send + Sync {
    /// Downloads an object to a local file.
    async fn fetch(
        &self,
        local_path: &Path,
        object_path: &str,
        bucket: SatelliteBucket,
    ) -> Result<()>;
}
