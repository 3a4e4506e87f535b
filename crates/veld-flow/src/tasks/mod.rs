//! The three pipeline stages.
//!
//! Discovery walks the provider's daily inventory and seeds one ingest
//! event per interesting object; ingest files each object into its tile and
//! coalesces map-build work per grid square; the build stage renders NDVI
//! rasters for every boundary a tile touches.

mod file_ingest;
mod index_discovery;
mod line_filter;
mod map_build;
mod object_path;

pub use file_ingest::FileIngestTask;
pub use index_discovery::IndexDiscoveryTask;
pub use line_filter::LineFilter;
pub use map_build::BoundaryMapBuildTask;
pub use object_path::{parse_object_path, ParsedObjectPath};

use veld_store::Event;

/// Event type tag for the inventory discovery stage.
pub const INDEX_DISCOVERY: &str = "IndexDiscovery";
/// Event type tag for the per-file ingest stage.
pub const FILE_INGEST: &str = "FileIngest";
/// Event type tag for the per-boundary map generation stage.
pub const BOUNDARY_MAP_BUILD: &str = "BoundaryMapBuild";

/// Builds the ingest event for one discovered object.
#[must_use]
pub fn file_ingest_event(object_path: &str, size: &str) -> Event {
    Event::new(FILE_INGEST)
        .with_priority(5)
        .with_max_attempts(1)
        .with_data("objectPath", object_path)
        .with_data("size", size)
}

/// Builds the coalesced map-build event for a grid square.
#[must_use]
pub fn boundary_map_build_event(mgrs_code: &str) -> Event {
    Event::new(BOUNDARY_MAP_BUILD)
        .with_priority(4)
        .with_max_attempts(1)
        .with_data("mgrsCode", mgrs_code)
}

/// Builds the map-build event targeting a single freshly created boundary.
#[must_use]
pub fn boundary_map_build_event_for(mgrs_code: &str, boundary_id: veld_core::BoundaryId) -> Event {
    Event::new(BOUNDARY_MAP_BUILD)
        .with_priority(5)
        .with_max_attempts(1)
        .with_data("mgrsCode", mgrs_code)
        .with_data("boundaryId", boundary_id.to_hex())
}
