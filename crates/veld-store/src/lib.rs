//! # veld-store
//!
//! The storage layer of the veld satellite imagery service.
//!
//! This crate defines:
//!
//! - The collection entities (`Event`, `Tile`, `Boundary`, `Raster`,
//!   `Setting`, `ObjectRecord`, `User`)
//! - [`Datastore`], the trait covering every document-store operation the
//!   pipeline and the API consume, including the event queue's atomic claim
//! - [`BlobStore`] and [`SatelliteSource`], the blob-layer traits whose S3
//!   implementations live in `veld-blob`
//! - [`MongoStore`], the production MongoDB implementation
//! - [`MemoryStore`] and friends, in-memory implementations with the same
//!   observable semantics for tests
//!
//! Cross-collection consistency is maintained purely through task
//! idempotence; the only mutual-exclusion primitive any implementation must
//! provide is the single-document atomic find-and-modify behind
//! [`Datastore::claim_next_event`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod blob;
pub mod entities;
pub mod memory;
pub mod mongo;
pub mod store;

pub use blob::{BlobStore, SatelliteBucket, SatelliteSource};
pub use entities::{
    Boundary, Event, FileUse, ObjectRecord, Raster, RasterMeta, Setting, Tile, TileFile, User,
    RASTER_KIND_NDVI_MAP,
};
pub use memory::{MemoryBlobStore, MemorySatelliteSource, MemoryStore};
pub use mongo::{MongoConfig, MongoStore};
pub use store::{
    delete_boundary, delete_boundary_rasters, BoundaryFilter, Datastore, EventFilter, TileQuery,
};
