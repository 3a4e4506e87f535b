//! Ingestion filter configuration.

use serde::{Deserialize, Serialize};

use veld_core::SettingId;

/// The single configuration row steering index discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// Identifier.
    #[serde(rename = "_id")]
    pub id: SettingId,
    /// MGRS zone prefixes to ingest (e.g. `39P`, `18Q`).
    pub utm_zones: Vec<String>,
    /// Accepted file suffixes (e.g. `B04.tif`); sidecar metadata JSON is
    /// always accepted.
    pub tile_files: Vec<String>,
    /// Only captures strictly after this date are ingested.
    pub tile_start_date: bson::DateTime,
}

impl Setting {
    /// Creates an unsaved setting row.
    #[must_use]
    pub fn new(
        utm_zones: Vec<String>,
        tile_files: Vec<String>,
        tile_start_date: bson::DateTime,
    ) -> Self {
        Self {
            id: SettingId::generate(),
            utm_zones,
            tile_files,
            tile_start_date,
        }
    }
}
