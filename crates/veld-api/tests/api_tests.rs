//! Route tests over the in-memory store and bucket.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use veld_api::{router, ApiConfig, AppState};
use veld_core::{Geometry, RasterId};
use veld_flow::tasks::BOUNDARY_MAP_BUILD;
use veld_store::{
    BlobStore, Datastore, EventFilter, MemoryBlobStore, MemoryStore, Raster, RasterMeta,
    RASTER_KIND_NDVI_MAP,
};

struct Harness {
    store: Arc<MemoryStore>,
    blobs: Arc<MemoryBlobStore>,
    state: Arc<AppState>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::with_audit(
        Arc::clone(&store) as Arc<dyn Datastore>
    ));
    let state = Arc::new(AppState::new(
        ApiConfig::for_tests(),
        Arc::clone(&store) as Arc<dyn Datastore>,
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
    ));
    Harness {
        store,
        blobs,
        state,
    }
}

fn app(h: &Harness) -> Router {
    router(Arc::clone(&h.state))
}

async fn send(
    h: &Harness,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("token", token);
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app(h).oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, bytes.to_vec())
}

async fn signup(h: &Harness, name: &str) -> String {
    let (status, body) = send(
        h,
        "POST",
        "/api/signup",
        None,
        Some(serde_json::json!({ "name": name, "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    String::from_utf8(body).expect("token")
}

/// A small square near Atlanta, inside grid square 16SGC (~12 acres).
fn small_field() -> Geometry {
    square(-84.43, 33.64, 0.001)
}

fn square(lon: f64, lat: f64, half_side: f64) -> Geometry {
    Geometry::polygon(vec![vec![
        vec![lon - half_side, lat - half_side],
        vec![lon + half_side, lat - half_side],
        vec![lon + half_side, lat + half_side],
        vec![lon - half_side, lat + half_side],
        vec![lon - half_side, lat - half_side],
    ]])
}

#[tokio::test]
async fn test_alive() {
    let h = harness();
    let (status, body) = send(&h, "GET", "/api/alive", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).expect("text").contains("alive"));
}

#[tokio::test]
async fn test_signup_then_signin() {
    let h = harness();
    let token = signup(&h, "ada").await;
    assert!(!token.is_empty());

    let (status, _) = send(
        &h,
        "POST",
        "/api/signin",
        None,
        Some(serde_json::json!({ "name": "ada", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h,
        "POST",
        "/api/signin",
        None,
        Some(serde_json::json!({ "name": "ada", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_validation() {
    let h = harness();

    let (status, _) = send(
        &h,
        "POST",
        "/api/signup",
        None,
        Some(serde_json::json!({ "name": "not ok!", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h,
        "POST",
        "/api/signup",
        None,
        Some(serde_json::json!({ "name": "ada", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    signup(&h, "ada").await;
    let (status, _) = send(
        &h,
        "POST",
        "/api/signup",
        None,
        Some(serde_json::json!({ "name": "ada", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_boundary_requires_auth() {
    let h = harness();
    let (status, _) = send(&h, "GET", "/api/boundary", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&h, "GET", "/api/boundary", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_boundary_seeds_build_event() {
    let h = harness();
    let token = signup(&h, "ada").await;

    let (status, body) = send(
        &h,
        "POST",
        "/api/boundary",
        Some(&token),
        Some(serde_json::json!({ "name": "home field", "geometry": small_field() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let created: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(created["mgrsCodes"], serde_json::json!(["16SGC"]));
    let acres = created["acres"].as_f64().expect("acres");
    assert!(acres > 0.0 && acres < 2500.0, "acres {acres}");

    let builds = h
        .store
        .find_events(&EventFilter::for_type(BOUNDARY_MAP_BUILD))
        .await
        .expect("events");
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].data_value("mgrsCode"), Some("16SGC"));
    assert_eq!(
        builds[0].data_value("boundaryId"),
        created["id"].as_str()
    );

    let (status, body) = send(&h, "GET", "/api/boundary", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(listed.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn test_boundary_shape_rules() {
    let h = harness();
    let token = signup(&h, "ada").await;

    // Far too large: ~22 km on a side.
    let (status, _) = send(
        &h,
        "POST",
        "/api/boundary",
        Some(&token),
        Some(serde_json::json!({ "name": "ranch", "geometry": square(-84.43, 33.64, 0.1) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Straddles the equator, so it touches two grid squares.
    let (status, _) = send(
        &h,
        "POST",
        "/api/boundary",
        Some(&token),
        Some(serde_json::json!({ "name": "split", "geometry": square(0.5, 0.0, 0.005) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_boundary_delete_cascades_to_rasters() {
    let h = harness();
    let token = signup(&h, "ada").await;

    let (status, body) = send(
        &h,
        "POST",
        "/api/boundary",
        Some(&token),
        Some(serde_json::json!({ "name": "home field", "geometry": small_field() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let created: serde_json::Value = serde_json::from_slice(&body).expect("json");
    let boundary_id = created["id"].as_str().expect("id").to_string();

    // Attach a raster with a stored blob.
    let user = h
        .store
        .find_user_by_name("ada")
        .await
        .expect("query")
        .expect("user");
    let scratch = tempfile::tempdir().expect("tempdir");
    let png = scratch.path().join("image.png");
    tokio::fs::write(&png, b"\x89PNG\r\n\x1a\n").await.expect("write");

    let mut raster = Raster {
        id: RasterId::generate(),
        user_id: user.id,
        boundary_id: boundary_id.parse().expect("id"),
        kind: RASTER_KIND_NDVI_MAP.to_string(),
        image_path: String::new(),
        meta_data: placeholder_meta(),
        tile_ids: vec![],
        tile_dates: vec![],
    };
    raster.image_path = veld_core::paths::raster_image_key(raster.id);
    h.blobs.put(&png, &raster.image_path).await.expect("put");
    h.store.save_raster(&mut raster).await.expect("save");

    let (status, body) = send(
        &h,
        "GET",
        &format!("/api/boundary/{boundary_id}/rasters"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(listed["rasters"].as_array().expect("array").len(), 1);

    let (status, _) = send(
        &h,
        "DELETE",
        &format!("/api/boundary/{boundary_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(h.blobs.object(&raster.image_path).expect("lookup").is_none());
    let (status, _) = send(
        &h,
        "GET",
        &format!("/api/boundary/{boundary_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_raster_image_returns_data_url() {
    let h = harness();
    let token = signup(&h, "ada").await;
    let user = h
        .store
        .find_user_by_name("ada")
        .await
        .expect("query")
        .expect("user");

    let scratch = tempfile::tempdir().expect("tempdir");
    let png = scratch.path().join("image.png");
    tokio::fs::write(&png, b"\x89PNG\r\n\x1a\n").await.expect("write");

    let mut raster = Raster {
        id: RasterId::generate(),
        user_id: user.id,
        boundary_id: veld_core::BoundaryId::generate(),
        kind: RASTER_KIND_NDVI_MAP.to_string(),
        image_path: String::new(),
        meta_data: placeholder_meta(),
        tile_ids: vec![],
        tile_dates: vec![],
    };
    raster.image_path = veld_core::paths::raster_image_key(raster.id);
    h.blobs.put(&png, &raster.image_path).await.expect("put");
    h.store.save_raster(&mut raster).await.expect("save");

    let (status, body) = send(
        &h,
        "GET",
        &format!("/api/raster/image/{}", raster.id.to_hex()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).expect("text");
    assert!(text.starts_with("data:image/png;base64,"));

    // Another account must not see it.
    let other_token = signup(&h, "grace").await;
    let (status, _) = send(
        &h,
        "GET",
        &format!("/api/raster/image/{}", raster.id.to_hex()),
        Some(&other_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn placeholder_meta() -> RasterMeta {
    RasterMeta {
        image_bounds: vec![vec![33.6, -84.5], vec![33.7, -84.4]],
        raster_min: 0.0,
        raster_max: 0.8,
        raster_median: 0.4,
        raster_mean: 0.41,
        raster_percent_covered_by_clouds: 0.01,
    }
}
