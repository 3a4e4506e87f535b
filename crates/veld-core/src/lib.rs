//! # veld-core
//!
//! Core abstractions for the veld satellite imagery service.
//!
//! This crate provides the foundational types used across all veld components:
//!
//! - **Identifiers**: Strongly-typed IDs for boundaries, tiles, rasters,
//!   events and users
//! - **Geometry**: The GeoJSON-shaped polygon model, UTM/MGRS conversion and
//!   planar area computation
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Logging initialization and span constructors
//! - **Paths**: Blob-key and scratch-file naming conventions
//!
//! ## Crate Boundary
//!
//! `veld-core` is the only crate allowed to define shared primitives. It
//! depends on no storage driver; collection schemas and adapters live in
//! `veld-store`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod geom;
pub mod id;
pub mod observability;
pub mod paths;

pub use error::{Error, Result};
pub use geom::Geometry;
pub use id::{BoundaryId, EventId, ObjectRecordId, RasterId, SettingId, TileId, UserId};
