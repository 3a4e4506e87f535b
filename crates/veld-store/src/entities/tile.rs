//! Satellite tile captures and their file listings.

use serde::{Deserialize, Serialize};

use veld_core::{Geometry, TileId};

/// What a tile file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileUse {
    /// A spectral band raster (`B04.tif`, `B08.tif`, `SCL.tif`, ...).
    #[serde(rename = "satBand")]
    SatBand,
    /// The sidecar metadata JSON carrying the tile footprint.
    #[serde(rename = "jsonMeta")]
    JsonMeta,
}

/// One object belonging to a tile capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFile {
    /// Band raster or sidecar metadata.
    pub file_use: FileUse,
    /// File name within the scene (e.g. `B04.tif`).
    pub band: String,
    /// Processing version; rasters of the newest version win.
    pub version: i32,
    /// Object size in bytes.
    pub size: i64,
    /// Full key in the imagery bucket.
    pub object_path: String,
}

/// One satellite capture of an MGRS grid square on a given day.
///
/// The natural key is `(date, mgrs_code, source_satellite)`; `files` holds
/// at most one entry per `object_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Identifier; nil until first saved.
    #[serde(rename = "_id")]
    pub id: TileId,
    /// Last mutation time.
    pub updated_date: bson::DateTime,
    /// Capture day (midnight UTC).
    pub date: bson::DateTime,
    /// 5-character MGRS grid square (e.g. `14TNR`).
    pub mgrs_code: String,
    /// Satellite and processing level (e.g. `S2A-L2A`).
    pub source_satellite: String,
    /// Tile footprint, set once the sidecar metadata is ingested.
    #[serde(default)]
    pub geometry: Geometry,
    /// Known objects for this capture.
    #[serde(default)]
    pub files: Vec<TileFile>,
}

impl Tile {
    /// Creates an unsaved tile with no files and no footprint.
    #[must_use]
    pub fn new(
        date: bson::DateTime,
        mgrs_code: impl Into<String>,
        source_satellite: impl Into<String>,
    ) -> Self {
        Self {
            id: TileId::nil(),
            updated_date: bson::DateTime::from_millis(0),
            date,
            mgrs_code: mgrs_code.into(),
            source_satellite: source_satellite.into(),
            geometry: Geometry::default(),
            files: Vec::new(),
        }
    }

    /// Returns the natural key used to de-duplicate tiles within one
    /// discovery run.
    #[must_use]
    pub fn natural_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.date.timestamp_millis(),
            self.mgrs_code,
            self.source_satellite
        )
    }

    /// Returns the highest processing version among the tile's files.
    #[must_use]
    pub fn latest_version(&self) -> i32 {
        self.files.iter().map(|f| f.version).max().unwrap_or(0)
    }

    /// Returns the object path of the given band at the given version.
    #[must_use]
    pub fn band_path(&self, version: i32, band: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.version == version && f.band == band)
            .map(|f| f.object_path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_with_files(files: Vec<TileFile>) -> Tile {
        let mut tile = Tile::new(bson::DateTime::from_millis(0), "18QZG", "S2A-L2A");
        tile.files = files;
        tile
    }

    fn band_file(band: &str, version: i32) -> TileFile {
        TileFile {
            file_use: FileUse::SatBand,
            band: band.to_string(),
            version,
            size: 10,
            object_path: format!("sentinel-s2-l2a-cogs/x/{version}/{band}"),
        }
    }

    #[test]
    fn test_latest_version_and_band_lookup() {
        let tile = tile_with_files(vec![
            band_file("B04.tif", 0),
            band_file("B04.tif", 2),
            band_file("B08.tif", 2),
        ]);
        assert_eq!(tile.latest_version(), 2);
        assert_eq!(
            tile.band_path(2, "B04.tif"),
            Some("sentinel-s2-l2a-cogs/x/2/B04.tif")
        );
        assert_eq!(tile.band_path(2, "SCL.tif"), None);
    }

    #[test]
    fn test_file_use_wire_names() {
        let doc = bson::to_document(&band_file("B04.tif", 1)).expect("serialize");
        assert_eq!(doc.get_str("file_use").expect("field"), "satBand");
    }

    #[test]
    fn test_natural_key_distinguishes_satellites() {
        let a = Tile::new(bson::DateTime::from_millis(86_400_000), "18QZG", "S2A-L2A");
        let b = Tile::new(bson::DateTime::from_millis(86_400_000), "18QZG", "S2B-L2A");
        assert_ne!(a.natural_key(), b.natural_key());
    }
}
