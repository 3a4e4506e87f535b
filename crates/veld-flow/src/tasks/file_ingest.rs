//! Per-file ingest.
//!
//! Files one discovered object into its owning tile. A missing tile is a
//! silent success: the discovery pass that creates tiles may still be
//! catching up, and the object will be rediscovered. The append is guarded
//! by object path, so replays cannot duplicate a listing. Sidecar metadata
//! additionally sets the tile footprint. Finally, one map-build event per
//! grid square is kept outstanding: many file arrivals for one square
//! coalesce into a single build.

use async_trait::async_trait;
use serde::Deserialize;

use veld_core::error::{Error, Result};
use veld_core::Geometry;
use veld_store::{Event, EventFilter, FileUse, SatelliteBucket, TileFile, TileQuery};

use crate::context::TaskContext;
use crate::metrics::FlowMetrics;
use crate::registry::TaskHandler;

use super::object_path::parse_object_path;
use super::{boundary_map_build_event, BOUNDARY_MAP_BUILD};

/// Handler for `FileIngest` events.
pub struct FileIngestTask;

#[async_trait]
impl TaskHandler for FileIngestTask {
    async fn run(&self, ctx: &TaskContext, event: &Event) -> Result<()> {
        run_file_ingest(ctx, event).await
    }
}

async fn run_file_ingest(ctx: &TaskContext, event: &Event) -> Result<()> {
    let object_path = event
        .data_value("objectPath")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidInput("event data missing objectPath".to_string()))?;
    let size: i64 = event
        .data_value("size")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidInput("event data missing size".to_string()))?
        .parse()
        .map_err(|_| Error::InvalidInput("event size is not an integer".to_string()))?;

    let parsed = parse_object_path(object_path)?;
    let tile_file = TileFile {
        file_use: parsed.file_use,
        band: parsed.band.clone(),
        version: parsed.version,
        size,
        object_path: object_path.to_string(),
    };

    let query = TileQuery::by_natural_key(parsed.date, &parsed.mgrs_code, &parsed.source_satellite);
    let Some(tile) = ctx.store.find_tile(&query).await? else {
        // Discovery has not created this tile yet; the next discovery run
        // re-emits the ingest, so yield rather than retry.
        tracing::info!(key = object_path, "tile missing, skipping ingest");
        return Ok(());
    };

    ctx.store.insert_file_into_tile(tile.id, &tile_file).await?;

    if parsed.file_use == FileUse::JsonMeta {
        let geometry = fetch_sidecar_geometry(ctx, object_path).await?;
        ctx.store.set_tile_geometry(tile.id, &geometry).await?;
        tracing::info!(tile_id = %tile.id, "tile footprint set from sidecar");
    }

    let outstanding = ctx
        .store
        .count_events(
            &EventFilter::for_type(BOUNDARY_MAP_BUILD)
                .with_mgrs_code(&tile.mgrs_code)
                .unsettled(),
        )
        .await?;
    if outstanding == 0 {
        let mut build = boundary_map_build_event(&tile.mgrs_code);
        ctx.store.save_event(&mut build).await?;
        FlowMetrics::new().record_emitted(&build.event_type);
        tracing::info!(mgrs_code = %tile.mgrs_code, "map build event emitted");
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct SidecarMeta {
    geometry: Geometry,
}

/// Downloads the sidecar metadata and returns its validated footprint.
async fn fetch_sidecar_geometry(ctx: &TaskContext, object_path: &str) -> Result<Geometry> {
    if !object_path.contains(".json") {
        return Err(Error::InvalidInput(format!(
            "not a sidecar metadata key: {object_path}"
        )));
    }

    let scratch = tempfile::Builder::new()
        .prefix("file_ingest")
        .tempdir_in(&ctx.scratch_root)?;
    let local = scratch.path().join("meta.json");
    ctx.satellite
        .fetch(&local, object_path, SatelliteBucket::Imagery)
        .await?;

    let bytes = tokio::fs::read(&local).await?;
    let meta: SidecarMeta = serde_json::from_slice(&bytes)?;
    meta.geometry.validate_polygon()?;
    Ok(meta.geometry)
}
