//! Blob-key and scratch-file naming conventions.
//!
//! Every path or file name that crosses a component boundary (blob store
//! keys, the NDVI tool's scratch directory contract, the inventory bucket
//! layout) is constructed here so producers and consumers cannot drift.

use crate::id::{BoundaryId, RasterId};

/// Blob key prefix for generated raster images.
pub const RASTER_IMAGE_PREFIX: &str = "rasters/images/";

/// Scratch-file prefix for downloaded band rasters (`satData_band04.tif`,
/// `satData_band08.tif`, `satData_bandSCL.tif`).
pub const BAND_FILE_PREFIX: &str = "satData_band";

/// Scratch-file prefix for boundary geometry inputs to the NDVI tool.
pub const BOUNDARY_FILE_PREFIX: &str = "boundary_geometry_";

/// Scratch-file prefix for raster images produced by the NDVI tool.
pub const RASTER_IMAGE_FILE_PREFIX: &str = "raster_image_";

/// Scratch-file prefix for raster metadata produced by the NDVI tool.
pub const RASTER_META_FILE_PREFIX: &str = "raster_meta_";

/// Returns the blob key under which a raster's image is stored.
#[must_use]
pub fn raster_image_key(id: RasterId) -> String {
    format!("{RASTER_IMAGE_PREFIX}{}", id.to_hex())
}

/// Returns the scratch file name for a downloaded band raster.
#[must_use]
pub fn band_file_name(band_suffix: &str) -> String {
    format!("{BAND_FILE_PREFIX}{band_suffix}.tif")
}

/// Returns the scratch file name holding a boundary's geometry JSON.
#[must_use]
pub fn boundary_geometry_file_name(id: BoundaryId) -> String {
    format!("{BOUNDARY_FILE_PREFIX}{}.json", id.to_hex())
}

/// Returns the scratch file name of the NDVI image for a boundary.
#[must_use]
pub fn raster_image_file_name(id: BoundaryId) -> String {
    format!("{RASTER_IMAGE_FILE_PREFIX}{}.png", id.to_hex())
}

/// Returns the scratch file name of the NDVI metadata for a boundary.
#[must_use]
pub fn raster_meta_file_name(id: BoundaryId) -> String {
    format!("{RASTER_META_FILE_PREFIX}{}.json", id.to_hex())
}

/// Returns the inventory bucket key of the manifest for a date key
/// (e.g. `2024-06-01T00-00Z`).
#[must_use]
pub fn inventory_manifest_key(date_key: &str) -> String {
    format!("sentinel-cogs/sentinel-cogs/{date_key}/manifest.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_image_key_embeds_hex_id() {
        let id = RasterId::generate();
        let key = raster_image_key(id);
        assert_eq!(key, format!("rasters/images/{}", id.to_hex()));
    }

    #[test]
    fn test_scratch_file_names_match_tool_contract() {
        let boundary = BoundaryId::nil();
        assert_eq!(band_file_name("04"), "satData_band04.tif");
        assert_eq!(
            boundary_geometry_file_name(boundary),
            "boundary_geometry_000000000000000000000000.json"
        );
        assert_eq!(
            raster_image_file_name(boundary),
            "raster_image_000000000000000000000000.png"
        );
        assert_eq!(
            raster_meta_file_name(boundary),
            "raster_meta_000000000000000000000000.json"
        );
    }

    #[test]
    fn test_inventory_manifest_key_layout() {
        assert_eq!(
            inventory_manifest_key("2024-06-01T00-00Z"),
            "sentinel-cogs/sentinel-cogs/2024-06-01T00-00Z/manifest.json"
        );
    }
}
