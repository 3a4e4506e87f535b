//! # veld-blob
//!
//! S3 implementations of the blob-layer traits defined in `veld-store`:
//!
//! - [`S3BlobStore`]: the credentialed application bucket, mirroring every
//!   mutation into the `object_store` audit collection
//! - [`S3SatelliteSource`]: the provider's read-only inventory and imagery
//!   buckets, reached with anonymous credentials
//!
//! Both move whole objects between S3 and local files; downloads are pulled
//! in 10 MiB ranged parts, uploads above one part switch to a multipart
//! upload.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

mod s3;
mod satellite;
mod transfer;

pub use s3::{S3BlobStore, S3Config};
pub use satellite::{S3SatelliteSource, SatelliteConfig};
