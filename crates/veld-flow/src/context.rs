//! The service registry handed to every task run.

use std::path::PathBuf;
use std::sync::Arc;

use veld_store::{BlobStore, Datastore, SatelliteSource};

use crate::ndvi::NdviTool;

/// Default number of recent tiles considered when partitioning boundaries.
pub const DEFAULT_RECENT_TILE_WINDOW: usize = 10;

/// Everything a task handler needs, constructed once at boot and shared by
/// reference. There are no process-wide singletons; tests assemble a context
/// from the in-memory implementations.
#[derive(Clone)]
pub struct TaskContext {
    /// The document store.
    pub store: Arc<dyn Datastore>,
    /// The credentialed application bucket.
    pub blobs: Arc<dyn BlobStore>,
    /// The provider's read-only buckets.
    pub satellite: Arc<dyn SatelliteSource>,
    /// The NDVI computation tool.
    pub ndvi: Arc<dyn NdviTool>,
    /// Parent directory for per-run scratch directories.
    pub scratch_root: PathBuf,
    /// How many recent tiles a map build partitions boundaries across.
    pub recent_tile_window: usize,
}

impl TaskContext {
    /// Assembles a context with the default scratch root (the system temp
    /// directory) and tile window.
    #[must_use]
    pub fn new(
        store: Arc<dyn Datastore>,
        blobs: Arc<dyn BlobStore>,
        satellite: Arc<dyn SatelliteSource>,
        ndvi: Arc<dyn NdviTool>,
    ) -> Self {
        Self {
            store,
            blobs,
            satellite,
            ndvi,
            scratch_root: std::env::temp_dir(),
            recent_tile_window: DEFAULT_RECENT_TILE_WINDOW,
        }
    }

    /// Overrides the scratch directory root.
    #[must_use]
    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    /// Overrides the recent-tile window.
    #[must_use]
    pub fn with_recent_tile_window(mut self, window: usize) -> Self {
        self.recent_tile_window = window;
        self
    }
}
