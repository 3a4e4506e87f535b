//! # veld-api
//!
//! The HTTP surface of the veld satellite imagery service.
//!
//! Provides account signup/signin with JWT bearer-style tokens (sent in the
//! `token` header), boundary CRUD with MGRS/acreage validation, and raster
//! listing plus image retrieval. Boundary creation seeds a map-build event
//! so freshly drawn boundaries get rasters from already-ingested tiles
//! without waiting for new imagery.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use server::{router, serve, AppState};
