//! Generated per-boundary rasters.

use serde::{Deserialize, Serialize};

use veld_core::{BoundaryId, RasterId, TileId, UserId};

/// Raster kind tag for NDVI maps.
pub const RASTER_KIND_NDVI_MAP: &str = "NDVI_MAP";

/// Statistics and georeferencing emitted by the NDVI tool.
///
/// The field names are shared between the tool's meta JSON and the stored
/// document, so this struct parses both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterMeta {
    /// `[[lat, lon], [lat, lon]]` corners of the rendered image.
    pub image_bounds: Vec<Vec<f64>>,
    /// Minimum index value inside the boundary.
    pub raster_min: f64,
    /// Maximum index value inside the boundary.
    pub raster_max: f64,
    /// Median index value inside the boundary.
    pub raster_median: f64,
    /// Mean index value inside the boundary.
    pub raster_mean: f64,
    /// Fraction of boundary pixels classified as cloud.
    pub raster_percent_covered_by_clouds: f64,
}

/// A generated per-boundary artifact: a PNG in the blob store plus the
/// statistics describing it.
///
/// For each `(boundary_id, kind)` only the latest generation is retained;
/// regeneration deletes older rows and their blobs first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    /// Identifier; nil until first saved.
    #[serde(rename = "_id")]
    pub id: RasterId,
    /// Owner, denormalized from the boundary.
    pub user_id: UserId,
    /// The boundary this raster was generated for.
    pub boundary_id: BoundaryId,
    /// Artifact kind (e.g. [`RASTER_KIND_NDVI_MAP`]).
    #[serde(rename = "type")]
    pub kind: String,
    /// Blob key of the PNG image.
    pub image_path: String,
    /// Tool-reported statistics.
    pub meta_data: RasterMeta,
    /// Source tiles (parallel to `tile_dates`).
    pub tile_ids: Vec<TileId>,
    /// Source tile capture dates (parallel to `tile_ids`).
    pub tile_dates: Vec<bson::DateTime>,
}
