//! Raster retrieval.
//!
//! ## Routes
//!
//! - `GET /api/raster/image/{rasterId}` - The raster PNG as a data URL
//!
//! The image is returned as a `data:image/png;base64,...` payload rather
//! than a redirect: the application bucket is not publicly readable and the
//! images are small crops.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use veld_core::RasterId;
use veld_store::{Raster, RasterMeta};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Raster metadata response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterResponse {
    /// Raster ID (hex).
    pub id: String,
    /// Owner ID (hex).
    pub user_id: String,
    /// Boundary ID (hex).
    pub boundary_id: String,
    /// Artifact kind (e.g. `NDVI_MAP`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Blob key of the image.
    pub image_path: String,
    /// Tool-reported statistics.
    pub meta_data: RasterMeta,
    /// Source tile IDs (hex).
    pub tile_ids: Vec<String>,
    /// Source tile capture dates (epoch millis).
    pub tile_dates: Vec<i64>,
}

impl From<&Raster> for RasterResponse {
    fn from(raster: &Raster) -> Self {
        Self {
            id: raster.id.to_hex(),
            user_id: raster.user_id.to_hex(),
            boundary_id: raster.boundary_id.to_hex(),
            kind: raster.kind.clone(),
            image_path: raster.image_path.clone(),
            meta_data: raster.meta_data.clone(),
            tile_ids: raster.tile_ids.iter().map(|id| id.to_hex()).collect(),
            tile_dates: raster
                .tile_dates
                .iter()
                .map(|date| date.timestamp_millis())
                .collect(),
        }
    }
}

/// The raster routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/raster/image/{rasterId}", get(get_raster_image))
}

async fn get_raster_image(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(raster_id): Path<String>,
) -> ApiResult<String> {
    let id: RasterId = raster_id
        .parse()
        .map_err(|_| ApiError::bad_request("malformed raster id"))?;
    let raster = state
        .store
        .find_raster(id, Some(user.id))
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("raster not found"))?;

    let scratch = tempfile::tempdir().map_err(|err| {
        tracing::error!(error = %err, "failed to create scratch directory");
        ApiError::internal()
    })?;
    let local = scratch.path().join(format!("raster_{}.png", raster.id.to_hex()));
    state
        .blobs
        .get(&local, &raster.image_path)
        .await
        .map_err(ApiError::from)?;
    let bytes = tokio::fs::read(&local).await.map_err(|err| {
        tracing::error!(error = %err, "failed to read downloaded image");
        ApiError::internal()
    })?;

    Ok(format!("data:image/png;base64,{}", BASE64.encode(bytes)))
}
