//! Inventory discovery.
//!
//! Walks the provider's daily inventory: probe the manifest for the target
//! day (two publication-time candidates), stream each gzipped CSV listing
//! through the zone prefilter, validate rows against the configured
//! settings, upsert one tile per natural key, and emit one ingest event per
//! accepted row. Rows that fail validation are skipped silently; any I/O or
//! parse failure aborts the run so the event retries as a whole.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;

use async_trait::async_trait;
use chrono::{Days, Utc};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;

use veld_core::error::{Error, Result};
use veld_core::paths::inventory_manifest_key;
use veld_store::{Event, SatelliteBucket, Setting, Tile};

use crate::context::TaskContext;
use crate::metrics::FlowMetrics;
use crate::registry::TaskHandler;

use super::line_filter::{zone_line_pattern, LineFilter};
use super::object_path::{parse_object_path, ParsedObjectPath};
use super::file_ingest_event;

/// Handler for `IndexDiscovery` events.
pub struct IndexDiscoveryTask;

#[async_trait]
impl TaskHandler for IndexDiscoveryTask {
    async fn run(&self, ctx: &TaskContext, event: &Event) -> Result<()> {
        run_index_discovery(ctx, event).await
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    files: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    key: String,
}

/// One listing row that survived validation.
#[derive(Debug)]
struct AcceptedRow {
    key: String,
    size: String,
    parsed: ParsedObjectPath,
}

async fn run_index_discovery(ctx: &TaskContext, event: &Event) -> Result<()> {
    let scratch = tempfile::Builder::new()
        .prefix("index_discovery")
        .tempdir_in(&ctx.scratch_root)?;

    let manifest = download_manifest(ctx, scratch.path(), event.data_value("manifestDate")).await?;
    tracing::info!(listing_count = manifest.files.len(), "manifest loaded");
    if manifest.files.is_empty() {
        return Err(Error::InvalidInput(
            "inventory manifest lists no index files".to_string(),
        ));
    }

    let setting = ctx
        .store
        .load_setting()
        .await?
        .ok_or_else(|| Error::Config("no settings row configured".to_string()))?;
    tracing::info!(
        zones = ?setting.utm_zones,
        files = ?setting.tile_files,
        "using ingestion settings"
    );

    let metrics = FlowMetrics::new();
    let listing_path = scratch.path().join("index.csv.gz");
    for (index, entry) in manifest.files.iter().enumerate() {
        tracing::info!(
            listing = %entry.key,
            position = index + 1,
            total = manifest.files.len(),
            "processing index listing"
        );
        ctx.satellite
            .fetch(&listing_path, &entry.key, SatelliteBucket::Inventory)
            .await?;

        let rows = {
            let path = listing_path.clone();
            let setting = setting.clone();
            tokio::task::spawn_blocking(move || collect_accepted_rows(&path, &setting))
                .await
                .map_err(|err| Error::internal(format!("listing parse task panicked: {err}")))??
        };
        tracing::info!(accepted = rows.len(), "listing filtered");

        for tile in unique_tiles(&rows) {
            ctx.store.upsert_tile(&tile).await?;
        }
        for row in &rows {
            let mut ingest = file_ingest_event(&row.key, &row.size);
            ctx.store.save_event(&mut ingest).await?;
            metrics.record_emitted(&ingest.event_type);
        }
    }

    Ok(())
}

/// Probes the two manifest date-key candidates and parses the first hit.
async fn download_manifest(
    ctx: &TaskContext,
    scratch: &Path,
    manifest_date: Option<&str>,
) -> Result<Manifest> {
    let local = scratch.join("manifest.json");
    for date_key in manifest_date_keys(manifest_date) {
        let object_path = inventory_manifest_key(&date_key);
        match ctx
            .satellite
            .fetch(&local, &object_path, SatelliteBucket::Inventory)
            .await
        {
            Ok(()) => {
                tracing::info!(key = %object_path, "found inventory manifest");
                let bytes = tokio::fs::read(&local).await?;
                return Ok(serde_json::from_slice(&bytes)?);
            }
            Err(Error::NotFound(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(Error::NotFound(
        "no inventory manifest for either date key".to_string(),
    ))
}

/// The manifest is published under one of two time suffixes; when no date
/// is given, yesterday (UTC) is the day being indexed.
fn manifest_date_keys(manifest_date: Option<&str>) -> [String; 2] {
    let day = match manifest_date {
        Some(date) if !date.is_empty() => date.to_string(),
        _ => {
            let yesterday = Utc::now()
                .date_naive()
                .checked_sub_days(Days::new(1))
                .unwrap_or_else(|| Utc::now().date_naive());
            yesterday.format("%Y-%m-%d").to_string()
        }
    };
    [format!("{day}T00-00Z"), format!("{day}T01-00Z")]
}

/// Streams one gzipped listing and returns the rows worth ingesting.
fn collect_accepted_rows(listing_path: &Path, setting: &Setting) -> Result<Vec<AcceptedRow>> {
    let file = std::fs::File::open(listing_path)?;
    let pattern = zone_line_pattern(&setting.utm_zones)
        .map_err(|err| Error::Config(format!("bad zone pattern: {err}")))?;
    let filtered = LineFilter::new(BufReader::new(MultiGzDecoder::new(file)), pattern);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(filtered);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| Error::serialization(err.to_string()))?;
        if record.len() != 4 {
            continue;
        }
        if let Some(row) = evaluate_row(&record[1], &record[2], setting) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Row schema: `[bucket, key, size, etag]`. Accepts keys in a configured
/// zone, for a listed band file or the scene sidecar, from a Sentinel-2 L2A
/// satellite, captured strictly after the configured start date.
fn evaluate_row(key: &str, size: &str, setting: &Setting) -> Option<AcceptedRow> {
    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() != 8 {
        return None;
    }

    let zone = format!("{}{}", segments[1], segments[2]);
    if !setting.utm_zones.iter().any(|z| z == &zone) {
        return None;
    }

    let sidecar_name = format!("{}.json", segments[6]);
    let listed_band = setting.tile_files.iter().any(|f| f == segments[7]);
    if !listed_band && segments[7] != sidecar_name {
        return None;
    }

    let parsed = parse_object_path(key).ok()?;
    if parsed.source_satellite != "S2A-L2A" && parsed.source_satellite != "S2B-L2A" {
        return None;
    }
    if parsed.date.timestamp_millis() <= setting.tile_start_date.timestamp_millis() {
        return None;
    }

    Some(AcceptedRow {
        key: key.to_string(),
        size: size.to_string(),
        parsed,
    })
}

/// One tile per natural key, with no files; ingest fills the listings in.
fn unique_tiles(rows: &[AcceptedRow]) -> Vec<Tile> {
    let mut tiles: HashMap<String, Tile> = HashMap::new();
    for row in rows {
        let tile = Tile::new(
            row.parsed.date,
            row.parsed.mgrs_code.clone(),
            row.parsed.source_satellite.clone(),
        );
        tiles.entry(tile.natural_key()).or_insert(tile);
    }
    tiles.into_values().collect()
}
