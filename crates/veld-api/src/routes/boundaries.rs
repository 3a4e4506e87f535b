//! Boundary CRUD.
//!
//! ## Routes
//!
//! - `POST   /api/boundary` - Create a boundary and seed its map build
//! - `GET    /api/boundary` - List the caller's boundaries
//! - `GET    /api/boundary/{boundaryId}` - Get one boundary
//! - `DELETE /api/boundary/{boundaryId}` - Delete a boundary and its rasters
//! - `GET    /api/boundary/{boundaryId}/rasters` - List a boundary's rasters
//!
//! Creation enforces the shape rules: a single-ring polygon, all vertices in
//! one MGRS grid square, an area in (0, 2500] acres, and the per-account
//! quotas.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use veld_core::geom::{boundary_acres, mgrs_codes};
use veld_core::{BoundaryId, Geometry};
use veld_store::{delete_boundary, Boundary, BoundaryFilter};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::rasters::RasterResponse;
use crate::server::AppState;

/// Largest accepted request body for boundary creation.
const MAX_BOUNDARY_BODY: usize = 5000;
/// Largest accepted boundary area.
const MAX_BOUNDARY_ACRES: f64 = 2500.0;

/// Request to create a boundary.
#[derive(Debug, Deserialize)]
pub struct CreateBoundaryRequest {
    /// Display name.
    pub name: String,
    /// The boundary polygon.
    pub geometry: Geometry,
}

/// Boundary response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryResponse {
    /// Boundary ID (hex).
    pub id: String,
    /// Owner ID (hex).
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Denormalized MGRS grid squares.
    pub mgrs_codes: Vec<String>,
    /// The boundary polygon.
    pub geometry: Geometry,
    /// Area in acres.
    pub acres: f64,
}

impl From<&Boundary> for BoundaryResponse {
    fn from(boundary: &Boundary) -> Self {
        Self {
            id: boundary.id.to_hex(),
            user_id: boundary.user_id.to_hex(),
            name: boundary.name.clone(),
            mgrs_codes: boundary.mgrs_codes.clone(),
            geometry: boundary.geometry.clone(),
            acres: boundary.acres,
        }
    }
}

/// List rasters response.
#[derive(Debug, Serialize)]
pub struct RastersResponse {
    /// The boundary's rasters.
    pub rasters: Vec<RasterResponse>,
}

/// The boundary routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/boundary", post(create_boundary).get(list_boundaries))
        .route(
            "/api/boundary/{boundaryId}",
            get(get_boundary).delete(delete_boundary_route),
        )
        .route("/api/boundary/{boundaryId}/rasters", get(list_rasters))
}

async fn create_boundary(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> ApiResult<Json<BoundaryResponse>> {
    if body.len() > MAX_BOUNDARY_BODY {
        return Err(ApiError::bad_request("boundary request too large"));
    }
    let request: CreateBoundaryRequest =
        serde_json::from_slice(&body).map_err(|err| ApiError::bad_request(err.to_string()))?;

    if user.boundaries_created >= user.max_allowed_boundary_creations {
        return Err(ApiError::conflict("boundary creation limit reached"));
    }

    let codes = mgrs_codes(&request.geometry);
    if codes.len() != 1 {
        // Keeping a boundary inside one grid square means one tile family
        // serves it; spanning squares is rejected rather than stitched.
        return Err(ApiError::bad_request(
            "boundary must fall within a single MGRS grid square",
        ));
    }
    let acres = boundary_acres(&request.geometry).map_err(ApiError::from)?;
    if acres <= 0.0 || acres > MAX_BOUNDARY_ACRES {
        return Err(ApiError::bad_request("boundary area outside (0, 2500] acres"));
    }

    let owned = state
        .store
        .count_boundaries(user.id)
        .await
        .map_err(ApiError::from)?;
    if owned >= u64::try_from(user.max_allowed_boundaries).unwrap_or(0) {
        return Err(ApiError::conflict("boundary limit reached"));
    }

    let mut boundary = Boundary::new(user.id, &request.name, request.geometry);
    boundary.mgrs_codes = codes;
    boundary.acres = acres;
    state
        .store
        .save_boundary(&mut boundary)
        .await
        .map_err(ApiError::from)?;
    state
        .store
        .increment_boundaries_created(user.id)
        .await
        .map_err(ApiError::from)?;

    // Seed a build restricted to this boundary so existing tiles produce a
    // raster without waiting for the next ingest.
    let mut build =
        veld_flow::tasks::boundary_map_build_event_for(&boundary.mgrs_codes[0], boundary.id);
    state
        .store
        .save_event(&mut build)
        .await
        .map_err(ApiError::from)?;
    tracing::info!(
        boundary_id = %boundary.id,
        mgrs_code = %boundary.mgrs_codes[0],
        acres = boundary.acres,
        "boundary created"
    );

    Ok(Json(BoundaryResponse::from(&boundary)))
}

async fn list_boundaries(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<BoundaryResponse>>> {
    let boundaries = state
        .store
        .find_boundaries(&BoundaryFilter {
            user_id: Some(user.id),
            ..BoundaryFilter::default()
        })
        .await
        .map_err(ApiError::from)?;
    Ok(Json(boundaries.iter().map(BoundaryResponse::from).collect()))
}

async fn get_boundary(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(boundary_id): Path<String>,
) -> ApiResult<Json<BoundaryResponse>> {
    let id: BoundaryId = boundary_id
        .parse()
        .map_err(|_| ApiError::bad_request("malformed boundary id"))?;
    let boundary = state
        .store
        .find_boundary(id, Some(user.id))
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("boundary not found"))?;
    Ok(Json(BoundaryResponse::from(&boundary)))
}

async fn delete_boundary_route(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(boundary_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: BoundaryId = boundary_id
        .parse()
        .map_err(|_| ApiError::bad_request("malformed boundary id"))?;
    delete_boundary(state.store.as_ref(), state.blobs.as_ref(), id, user.id)
        .await
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_rasters(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(boundary_id): Path<String>,
) -> ApiResult<Json<RastersResponse>> {
    let id: BoundaryId = boundary_id
        .parse()
        .map_err(|_| ApiError::bad_request("malformed boundary id"))?;
    let rasters = state
        .store
        .find_rasters(id, None, Some(user.id))
        .await
        .map_err(ApiError::from)?;
    Ok(Json(RastersResponse {
        rasters: rasters.iter().map(RasterResponse::from).collect(),
    }))
}
