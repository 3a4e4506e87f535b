//! Imagery object path parsing.
//!
//! Keys in the imagery bucket look like
//! `sentinel-s2-l2a-cogs/18/Q/ZG/2020/1/S2B_18QZG_20200129_0_L2A/B04.tif`:
//! eight `/`-segments, where segments 1-3 are the MGRS grid square, segment
//! 6 is the scene id (`<satellite>_<mgrs>_<yyyymmdd>_<version>_<level>`),
//! and segment 7 is the file name. Both discovery and ingest parse keys
//! through here so the two stages can never disagree on a key's meaning.

use chrono::NaiveDate;

use veld_core::error::{Error, Result};
use veld_store::FileUse;

/// The pieces of one imagery object key.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedObjectPath {
    /// 5-character MGRS grid square (segments 1+2+3).
    pub mgrs_code: String,
    /// Capture day at midnight UTC.
    pub date: bson::DateTime,
    /// Satellite and processing level (e.g. `S2B-L2A`).
    pub source_satellite: String,
    /// Scene processing version.
    pub version: i32,
    /// File name within the scene (e.g. `B04.tif`).
    pub band: String,
    /// Band raster or sidecar metadata.
    pub file_use: FileUse,
}

/// Parses an imagery object key.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for keys that do not match the layout.
pub fn parse_object_path(object_path: &str) -> Result<ParsedObjectPath> {
    let segments: Vec<&str> = object_path.split('/').collect();
    if segments.len() != 8 {
        return Err(Error::InvalidInput(format!(
            "object key has {} segments, expected 8: {object_path}",
            segments.len()
        )));
    }

    let scene_parts: Vec<&str> = segments[6].split('_').collect();
    if scene_parts.len() != 5 {
        return Err(Error::InvalidInput(format!(
            "scene id has {} parts, expected 5: {}",
            scene_parts.len(),
            segments[6]
        )));
    }

    let version: i32 = scene_parts[3].parse().map_err(|_| {
        Error::InvalidInput(format!("scene version is not an integer: {}", scene_parts[3]))
    })?;

    let date = parse_capture_date(scene_parts[2])?;

    let band = segments[7].to_string();
    let sidecar_name = format!("{}.json", segments[6]);
    let file_use = if band == sidecar_name {
        FileUse::JsonMeta
    } else {
        FileUse::SatBand
    };

    Ok(ParsedObjectPath {
        mgrs_code: format!("{}{}{}", segments[1], segments[2], segments[3]),
        date,
        source_satellite: format!("{}-{}", scene_parts[0], scene_parts[4]),
        version,
        band,
        file_use,
    })
}

fn parse_capture_date(raw: &str) -> Result<bson::DateTime> {
    let date = NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map_err(|_| Error::InvalidInput(format!("scene date is not YYYYMMDD: {raw}")))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidInput(format!("scene date out of range: {raw}")))?;
    Ok(bson::DateTime::from_millis(
        midnight.and_utc().timestamp_millis(),
    ))
}
