//! # veld-flow
//!
//! The event pipeline of the veld satellite imagery service.
//!
//! This crate implements:
//!
//! - **Worker loop**: claims events from the durable queue, dispatches to
//!   the registered handler with a per-type timeout, and settles the event
//! - **Observer**: the periodic scheduler seeding index discovery
//! - **Tasks**: the three pipeline stages — index discovery, per-file
//!   ingest, per-boundary map generation
//! - **NDVI tool contract**: the subprocess that turns band rasters and
//!   boundary polygons into per-boundary PNG + statistics
//!
//! ## Guarantees
//!
//! - **At-least-once**: a crashed or timed-out handler releases its event
//!   for retry until the attempt budget is spent
//! - **Idempotent handlers**: re-running any task converges on the same
//!   store state (guarded file appends, coalesced build events,
//!   delete-then-insert rasters)
//!
//! Horizontal scaling is N worker processes contending only through the
//! store's atomic claim; there is no in-process parallelism across events.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod context;
pub mod metrics;
pub mod ndvi;
pub mod observer;
pub mod registry;
pub mod tasks;
pub mod worker;

pub use context::TaskContext;
pub use ndvi::{NdviTool, StaticNdviTool, SubprocessNdviTool};
pub use observer::Observer;
pub use registry::{TaskDefinition, TaskHandler, TaskRegistry};
pub use worker::Worker;
