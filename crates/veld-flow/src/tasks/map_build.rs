//! Per-boundary map generation.
//!
//! For one grid square: load the recent tiles (newest first), give every
//! affected boundary to the first tile that covers it, and for each
//! non-empty partition download the band rasters, run the NDVI tool, and
//! persist one raster per boundary. Raster persistence is
//! delete-then-insert, so re-running a build converges on the latest
//! generation. A failure saving one boundary's raster is logged and the
//! loop moves on; partial progress beats losing the whole tile.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use veld_core::error::{Error, Result};
use veld_core::paths::{
    band_file_name, boundary_geometry_file_name, raster_image_file_name, raster_image_key,
    raster_meta_file_name, BAND_FILE_PREFIX, BOUNDARY_FILE_PREFIX,
};
use veld_core::{BoundaryId, RasterId};
use veld_store::{
    delete_boundary_rasters, Boundary, BoundaryFilter, Event, Raster, RasterMeta, SatelliteBucket,
    Tile, RASTER_KIND_NDVI_MAP,
};

use crate::context::TaskContext;
use crate::registry::TaskHandler;

/// Handler for `BoundaryMapBuild` events.
pub struct BoundaryMapBuildTask;

#[async_trait]
impl TaskHandler for BoundaryMapBuildTask {
    async fn run(&self, ctx: &TaskContext, event: &Event) -> Result<()> {
        run_map_build(ctx, event).await
    }
}

async fn run_map_build(ctx: &TaskContext, event: &Event) -> Result<()> {
    let mgrs_code = event
        .data_value("mgrsCode")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidInput("event data missing mgrsCode".to_string()))?;
    let boundary_id = event
        .data_value("boundaryId")
        .map(|raw| raw.parse::<BoundaryId>())
        .transpose()?;

    for (tile, boundaries) in partition_boundaries(ctx, mgrs_code, boundary_id).await? {
        if boundaries.is_empty() {
            tracing::debug!(tile_id = %tile.id, "no boundaries left for tile");
            continue;
        }
        tracing::info!(
            tile_id = %tile.id,
            boundary_count = boundaries.len(),
            "building rasters for tile"
        );
        build_tile_rasters(ctx, &tile, &boundaries).await?;
    }

    Ok(())
}

/// Gives every affected boundary to the newest recent tile covering it.
async fn partition_boundaries(
    ctx: &TaskContext,
    mgrs_code: &str,
    boundary_id: Option<BoundaryId>,
) -> Result<Vec<(Tile, Vec<Boundary>)>> {
    let limit = i64::try_from(ctx.recent_tile_window).unwrap_or(i64::MAX);
    let tiles = ctx.store.find_recent_tiles(mgrs_code, limit).await?;
    if tiles.is_empty() {
        tracing::info!(mgrs_code, "no tiles for grid square");
        return Ok(Vec::new());
    }

    let mut claimed: HashSet<BoundaryId> = HashSet::new();
    let mut partitions = Vec::with_capacity(tiles.len());
    for tile in tiles {
        if tile.geometry.is_empty() {
            // Footprint arrives with the sidecar metadata; until then the
            // tile cannot claim boundaries.
            tracing::debug!(tile_id = %tile.id, "tile has no footprint yet");
            continue;
        }

        let boundaries = ctx
            .store
            .find_boundaries(&BoundaryFilter {
                id: boundary_id,
                user_id: None,
                mgrs_code: Some(mgrs_code.to_string()),
                intersects: Some(tile.geometry.clone()),
            })
            .await?;
        let unclaimed: Vec<Boundary> = boundaries
            .into_iter()
            .filter(|b| !claimed.contains(&b.id))
            .collect();
        claimed.extend(unclaimed.iter().map(|b| b.id));
        partitions.push((tile, unclaimed));
    }
    Ok(partitions)
}

async fn build_tile_rasters(ctx: &TaskContext, tile: &Tile, boundaries: &[Boundary]) -> Result<()> {
    let version = tile.latest_version();
    let band04 = tile.band_path(version, "B04.tif");
    let band08 = tile.band_path(version, "B08.tif");
    let band_scl = tile.band_path(version, "SCL.tif");
    let (Some(band04), Some(band08)) = (band04, band08) else {
        return Err(Error::InvalidInput(
            "tile did not have files for bands 4 and 8".to_string(),
        ));
    };

    let scratch = tempfile::Builder::new()
        .prefix("map_build")
        .tempdir_in(&ctx.scratch_root)?;

    ctx.satellite
        .fetch(
            &scratch.path().join(band_file_name("04")),
            band04,
            SatelliteBucket::Imagery,
        )
        .await?;
    ctx.satellite
        .fetch(
            &scratch.path().join(band_file_name("08")),
            band08,
            SatelliteBucket::Imagery,
        )
        .await?;
    if let Some(band_scl) = band_scl {
        ctx.satellite
            .fetch(
                &scratch.path().join(band_file_name("SCL")),
                band_scl,
                SatelliteBucket::Imagery,
            )
            .await?;
    }

    for boundary in boundaries {
        tokio::fs::write(
            scratch.path().join(boundary_geometry_file_name(boundary.id)),
            boundary.geometry.to_json()?,
        )
        .await?;
    }

    ctx.ndvi
        .build(scratch.path(), BAND_FILE_PREFIX, BOUNDARY_FILE_PREFIX)
        .await?;

    for boundary in boundaries {
        let image = scratch.path().join(raster_image_file_name(boundary.id));
        let meta = scratch.path().join(raster_meta_file_name(boundary.id));
        let produced = tokio::fs::try_exists(&image).await.unwrap_or(false)
            && tokio::fs::try_exists(&meta).await.unwrap_or(false);
        if !produced {
            tracing::warn!(boundary_id = %boundary.id, "tool produced no artifacts for boundary");
            continue;
        }
        if let Err(err) = save_boundary_raster(ctx, tile, boundary, &image, &meta).await {
            tracing::warn!(
                boundary_id = %boundary.id,
                error = %err,
                "failed to save boundary raster"
            );
        }
    }

    Ok(())
}

/// Uploads the image, replaces any previous generation, inserts the row.
async fn save_boundary_raster(
    ctx: &TaskContext,
    tile: &Tile,
    boundary: &Boundary,
    image_path: &Path,
    meta_path: &Path,
) -> Result<()> {
    let meta: RasterMeta = serde_json::from_slice(&tokio::fs::read(meta_path).await?)?;

    let mut raster = Raster {
        id: RasterId::generate(),
        user_id: boundary.user_id,
        boundary_id: boundary.id,
        kind: RASTER_KIND_NDVI_MAP.to_string(),
        image_path: String::new(),
        meta_data: meta,
        tile_ids: vec![tile.id],
        tile_dates: vec![tile.date],
    };
    raster.image_path = raster_image_key(raster.id);

    ctx.blobs.put(image_path, &raster.image_path).await?;
    delete_boundary_rasters(
        ctx.store.as_ref(),
        ctx.blobs.as_ref(),
        boundary.id,
        Some(RASTER_KIND_NDVI_MAP),
    )
    .await?;
    ctx.store.save_raster(&mut raster).await?;

    tracing::info!(
        boundary_id = %boundary.id,
        raster_id = %raster.id,
        image = %raster.image_path,
        "boundary raster saved"
    );
    Ok(())
}
