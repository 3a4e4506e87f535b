//! End-to-end pipeline tests over the in-memory implementations.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;

use veld_core::error::{Error, Result};
use veld_core::paths::inventory_manifest_key;
use veld_core::Geometry;
use veld_flow::tasks::{
    boundary_map_build_event, file_ingest_event, BOUNDARY_MAP_BUILD, FILE_INGEST, INDEX_DISCOVERY,
};
use veld_flow::{
    Observer, StaticNdviTool, TaskContext, TaskHandler, TaskRegistry, Worker,
};
use veld_store::{
    BlobStore, Boundary, Datastore, Event, EventFilter, FileUse, MemoryBlobStore,
    MemorySatelliteSource, MemoryStore, SatelliteBucket, SatelliteSource, Setting, Tile, TileFile,
    TileQuery, RASTER_KIND_NDVI_MAP,
};

struct Harness {
    store: Arc<MemoryStore>,
    blobs: Arc<MemoryBlobStore>,
    satellite: Arc<MemorySatelliteSource>,
    worker: Worker,
    _scratch: tempfile::TempDir,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::with_audit(
        Arc::clone(&store) as Arc<dyn Datastore>
    ));
    let satellite = Arc::new(MemorySatelliteSource::new());
    let scratch = tempfile::tempdir().expect("scratch root");

    let ctx = TaskContext::new(
        Arc::clone(&store) as Arc<dyn Datastore>,
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        Arc::clone(&satellite) as Arc<dyn SatelliteSource>,
        Arc::new(StaticNdviTool::with_defaults()),
    )
    .with_scratch_root(scratch.path());

    let worker = Worker::new(Arc::new(ctx), TaskRegistry::standard());
    Harness {
        store,
        blobs,
        satellite,
        worker,
        _scratch: scratch,
    }
}

fn utc_midnight(year: i32, month: u32, day: u32) -> bson::DateTime {
    let millis = chrono::NaiveDate::from_ymd_opt(year, month, day)
        .expect("date")
        .and_hms_opt(0, 0, 0)
        .expect("time")
        .and_utc()
        .timestamp_millis();
    bson::DateTime::from_millis(millis)
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

async fn save_setting(store: &MemoryStore) {
    let mut setting = Setting::new(
        vec!["39P".to_string(), "18Q".to_string()],
        vec!["B04.tif".to_string(), "B08.tif".to_string()],
        utc_midnight(2018, 1, 1),
    );
    store.save_setting(&mut setting).await.expect("setting");
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).expect("compress");
    encoder.finish().expect("finish")
}

const BAND04_39PUL: &str = "sentinel-s2-l2a-cogs/39/P/UL/2019/9/S2A_39PUL_20190914_0_L2A/B04.tif";
const BAND08_39PUL: &str = "sentinel-s2-l2a-cogs/39/P/UL/2019/9/S2A_39PUL_20190914_0_L2A/B08.tif";
const SIDECAR_39PUL: &str =
    "sentinel-s2-l2a-cogs/39/P/UL/2019/9/S2A_39PUL_20190914_0_L2A/S2A_39PUL_20190914_0_L2A.json";
const BAND04_18QZG: &str = "sentinel-s2-l2a-cogs/18/Q/ZG/2020/1/S2B_18QZG_20200129_0_L2A/B04.tif";

#[tokio::test]
async fn test_observer_seeds_exactly_one_discovery_event() {
    let h = harness();
    let observer = Observer::new(Arc::clone(&h.store) as Arc<dyn Datastore>);

    observer.tick().await.expect("tick");
    let events = h
        .store
        .find_events(&EventFilter::for_type(INDEX_DISCOVERY))
        .await
        .expect("find");
    assert_eq!(events.len(), 1);
    let seeded = &events[0];

    // Deferred roughly a week out.
    let defer_ms = seeded.start_after_date.timestamp_millis()
        - bson::DateTime::now().timestamp_millis();
    let week_ms = 7 * 24 * 60 * 60 * 1000;
    assert!((defer_ms - week_ms).abs() < 60_000, "defer was {defer_ms} ms");

    // A second tick must not seed another while one is outstanding.
    observer.tick().await.expect("tick");
    let events = h
        .store
        .find_events(&EventFilter::for_type(INDEX_DISCOVERY))
        .await
        .expect("find");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, seeded.id);
}

#[tokio::test]
async fn test_index_discovery_builds_tiles_and_ingest_events() {
    let h = harness();
    save_setting(&h.store).await;

    // Manifest only under the second date-key candidate, exercising the
    // probe fallback.
    let manifest = r#"{ "files": [ { "key": "sentinel-cogs/sentinel-cogs/data/listing-1.csv.gz" } ] }"#;
    h.satellite
        .insert(
            SatelliteBucket::Inventory,
            inventory_manifest_key("2024-06-01T01-00Z"),
            manifest.as_bytes().to_vec(),
        )
        .expect("seed manifest");

    let listing = format!(
        "sentinel-cogs,{BAND04_39PUL},100,etag1\n\
         sentinel-cogs,{BAND08_39PUL},101,etag2\n\
         sentinel-cogs,{SIDECAR_39PUL},102,etag3\n\
         sentinel-cogs,{BAND04_18QZG},103,etag4\n\
         sentinel-cogs,sentinel-s2-l2a-cogs/12/X/YZ/2019/9/S2A_12XYZ_20190914_0_L2A/B04.tif,104,etag5\n\
         sentinel-cogs,sentinel-s2-l2a-cogs/39/P/UL/2019/9/S2C_39PUL_20190914_0_L1C/B04.tif,105,etag6\n\
         sentinel-cogs,sentinel-s2-l2a-cogs/39/P/UL/2017/9/S2A_39PUL_20170914_0_L2A/B04.tif,106,etag7\n"
    );
    h.satellite
        .insert(
            SatelliteBucket::Inventory,
            "sentinel-cogs/sentinel-cogs/data/listing-1.csv.gz",
            gzip(&listing),
        )
        .expect("seed listing");

    let mut discovery =
        Event::new(INDEX_DISCOVERY).with_data("manifestDate", "2024-06-01");
    h.store.save_event(&mut discovery).await.expect("save");

    assert!(h.worker.process_next_event().await.expect("process"));
    let settled = h.store.get_event(discovery.id).await.expect("reload");
    assert!(settled.passed, "errors: {:?}", settled.errors);

    // Two tiles with the expected natural keys and no files yet.
    let tile1 = h
        .store
        .find_tile(&TileQuery::by_natural_key(
            utc_midnight(2019, 9, 14),
            "39PUL",
            "S2A-L2A",
        ))
        .await
        .expect("query")
        .expect("39PUL tile");
    assert!(tile1.files.is_empty());

    let tile2 = h
        .store
        .find_tile(&TileQuery::by_natural_key(
            utc_midnight(2020, 1, 29),
            "18QZG",
            "S2B-L2A",
        ))
        .await
        .expect("query")
        .expect("18QZG tile");
    assert!(tile2.files.is_empty());

    // Exactly four ingest events carrying the accepted object paths.
    let ingests = h
        .store
        .find_events(&EventFilter::for_type(FILE_INGEST))
        .await
        .expect("find");
    assert_eq!(ingests.len(), 4);
    let mut keys: Vec<&str> = ingests
        .iter()
        .map(|e| e.data_value("objectPath").expect("objectPath"))
        .collect();
    keys.sort_unstable();
    let mut expected = [BAND04_39PUL, BAND08_39PUL, SIDECAR_39PUL, BAND04_18QZG];
    expected.sort_unstable();
    assert_eq!(keys, expected);
    assert!(ingests.iter().all(|e| e.priority == 5 && e.max_attempts == 1));
}

#[tokio::test]
async fn test_file_ingest_appends_once_and_coalesces_builds() {
    let h = harness();

    let tile = h
        .store
        .upsert_tile(&Tile::new(utc_midnight(2020, 1, 29), "18QZG", "S2A-L2A"))
        .await
        .expect("tile");

    let mut b1 = Boundary::new(veld_core::UserId::generate(), "inside", square(0.5, 0.5, 0.1));
    b1.mgrs_codes = vec!["18QZG".to_string()];
    h.store.save_boundary(&mut b1).await.expect("save");
    let mut b2 = Boundary::new(veld_core::UserId::generate(), "elsewhere", square(9.0, 9.0, 0.1));
    b2.mgrs_codes = vec!["31NAA".to_string()];
    h.store.save_boundary(&mut b2).await.expect("save");

    let band04 = "sentinel-s2-l2a-cogs/18/Q/ZG/2020/1/S2A_18QZG_20200129_0_L2A/B04.tif";
    let mut ingest = file_ingest_event(band04, "99");
    h.store.save_event(&mut ingest).await.expect("save");
    assert!(h.worker.process_next_event().await.expect("process"));

    let reloaded = h
        .store
        .find_tile(&TileQuery::by_id(tile.id))
        .await
        .expect("query")
        .expect("tile");
    assert_eq!(reloaded.files.len(), 1);
    let file = &reloaded.files[0];
    assert_eq!(file.file_use, FileUse::SatBand);
    assert_eq!(file.band, "B04.tif");
    assert_eq!(file.version, 0);
    assert_eq!(file.size, 99);

    let builds = h
        .store
        .find_events(
            &EventFilter::for_type(BOUNDARY_MAP_BUILD)
                .with_mgrs_code("18QZG")
                .unsettled(),
        )
        .await
        .expect("find");
    assert_eq!(builds.len(), 1);
    let first_build = builds[0].id;

    // A second file for the same square coalesces into the same build.
    let band08 = "sentinel-s2-l2a-cogs/18/Q/ZG/2020/1/S2A_18QZG_20200129_0_L2A/B08.tif";
    let mut ingest = file_ingest_event(band08, "87");
    h.store.save_event(&mut ingest).await.expect("save");
    assert!(h.worker.process_next_event().await.expect("process"));

    let reloaded = h
        .store
        .find_tile(&TileQuery::by_id(tile.id))
        .await
        .expect("query")
        .expect("tile");
    assert_eq!(reloaded.files.len(), 2);

    let builds = h
        .store
        .find_events(
            &EventFilter::for_type(BOUNDARY_MAP_BUILD)
                .with_mgrs_code("18QZG")
                .unsettled(),
        )
        .await
        .expect("find");
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].id, first_build);
}

#[tokio::test]
async fn test_file_ingest_without_tile_succeeds_silently() {
    let h = harness();
    let mut ingest = file_ingest_event(BAND04_18QZG, "42");
    h.store.save_event(&mut ingest).await.expect("save");

    assert!(h.worker.process_next_event().await.expect("process"));
    let settled = h.store.get_event(ingest.id).await.expect("reload");
    assert!(settled.passed);

    let builds = h
        .store
        .find_events(&EventFilter::for_type(BOUNDARY_MAP_BUILD))
        .await
        .expect("find");
    assert!(builds.is_empty());
}

#[tokio::test]
async fn test_sidecar_ingest_sets_tile_geometry() {
    let h = harness();
    let tile = h
        .store
        .upsert_tile(&Tile::new(utc_midnight(2019, 9, 14), "39PUL", "S2A-L2A"))
        .await
        .expect("tile");

    let footprint = Geometry::polygon(vec![vec![
        vec![52.0, 14.0],
        vec![53.0, 14.0],
        vec![53.0, 15.0],
        vec![52.0, 15.0],
        vec![52.0, 14.0],
    ]]);
    let sidecar = serde_json::json!({ "geometry": footprint });
    h.satellite
        .insert(
            SatelliteBucket::Imagery,
            SIDECAR_39PUL,
            serde_json::to_vec(&sidecar).expect("encode"),
        )
        .expect("seed");

    let mut ingest = file_ingest_event(SIDECAR_39PUL, "17");
    h.store.save_event(&mut ingest).await.expect("save");
    assert!(h.worker.process_next_event().await.expect("process"));

    let settled = h.store.get_event(ingest.id).await.expect("reload");
    assert!(settled.passed, "errors: {:?}", settled.errors);

    let reloaded = h
        .store
        .find_tile(&TileQuery::by_id(tile.id))
        .await
        .expect("query")
        .expect("tile");
    assert_eq!(reloaded.geometry, footprint);
    assert_eq!(reloaded.files.len(), 1);
    assert_eq!(reloaded.files[0].file_use, FileUse::JsonMeta);
}

fn band_file(band: &str, version: i32, object_path: &str) -> TileFile {
    TileFile {
        file_use: FileUse::SatBand,
        band: band.to_string(),
        version,
        size: 1000,
        object_path: object_path.to_string(),
    }
}

#[tokio::test]
async fn test_map_build_generates_one_raster_per_boundary() {
    let h = harness();

    let band04_v2 = "sentinel-s2-l2a-cogs/14/T/NR/2021/6/S2A_14TNR_20210614_2_L2A/B04.tif";
    let band08_v2 = "sentinel-s2-l2a-cogs/14/T/NR/2021/6/S2A_14TNR_20210614_2_L2A/B08.tif";
    let band04_v1 = "sentinel-s2-l2a-cogs/14/T/NR/2021/6/S2A_14TNR_20210614_1_L2A/B04.tif";

    let mut tile = Tile::new(utc_midnight(2021, 6, 14), "14TNR", "S2A-L2A");
    tile.geometry = square(-98.0, 43.0, 0.6);
    tile.files = vec![
        band_file("B04.tif", 1, band04_v1),
        band_file("B04.tif", 2, band04_v2),
        band_file("B08.tif", 2, band08_v2),
    ];
    let tile = h.store.upsert_tile(&tile).await.expect("tile");

    for key in [band04_v2, band08_v2] {
        h.satellite
            .insert(SatelliteBucket::Imagery, key, vec![0u8; 64])
            .expect("seed band");
    }

    let user = veld_core::UserId::generate();
    let mut b1 = Boundary::new(user, "north field", square(-98.1, 43.1, 0.02));
    b1.mgrs_codes = vec!["14TNR".to_string()];
    h.store.save_boundary(&mut b1).await.expect("save");
    let mut b2 = Boundary::new(user, "south field", square(-97.9, 42.9, 0.02));
    b2.mgrs_codes = vec!["14TNR".to_string()];
    h.store.save_boundary(&mut b2).await.expect("save");

    let mut build = boundary_map_build_event("14TNR");
    h.store.save_event(&mut build).await.expect("save");
    assert!(h.worker.process_next_event().await.expect("process"));
    let settled = h.store.get_event(build.id).await.expect("reload");
    assert!(settled.passed, "errors: {:?}", settled.errors);

    for boundary in [&b1, &b2] {
        let rasters = h
            .store
            .find_rasters(boundary.id, Some(RASTER_KIND_NDVI_MAP), None)
            .await
            .expect("find");
        assert_eq!(rasters.len(), 1, "boundary {}", boundary.name);
        let raster = &rasters[0];
        assert!(raster.image_path.starts_with("rasters/images/"));
        assert!((raster.meta_data.raster_mean - 0.45).abs() < 0.01);
        assert_eq!(raster.tile_ids, vec![tile.id]);
        assert_eq!(raster.tile_dates, vec![tile.date]);
        assert!(h
            .blobs
            .object(&raster.image_path)
            .expect("lookup")
            .is_some());
    }

    // Regeneration replaces rather than accumulates.
    let first_paths: Vec<String> = h
        .store
        .find_rasters(b1.id, None, None)
        .await
        .expect("find")
        .into_iter()
        .map(|r| r.image_path)
        .collect();

    let mut rebuild = boundary_map_build_event("14TNR");
    h.store.save_event(&mut rebuild).await.expect("save");
    assert!(h.worker.process_next_event().await.expect("process"));

    let rasters = h
        .store
        .find_rasters(b1.id, Some(RASTER_KIND_NDVI_MAP), None)
        .await
        .expect("find");
    assert_eq!(rasters.len(), 1);
    assert_ne!(rasters[0].image_path, first_paths[0]);
    assert!(h.blobs.object(&first_paths[0]).expect("lookup").is_none());
}

#[tokio::test]
async fn test_map_build_fails_without_both_bands() {
    let h = harness();

    let mut tile = Tile::new(utc_midnight(2021, 6, 14), "14TNR", "S2A-L2A");
    tile.geometry = square(-98.0, 43.0, 0.6);
    tile.files = vec![band_file(
        "B04.tif",
        0,
        "sentinel-s2-l2a-cogs/14/T/NR/2021/6/S2A_14TNR_20210614_0_L2A/B04.tif",
    )];
    h.store.upsert_tile(&tile).await.expect("tile");

    let user = veld_core::UserId::generate();
    let mut boundary = Boundary::new(user, "field", square(-98.0, 43.0, 0.02));
    boundary.mgrs_codes = vec!["14TNR".to_string()];
    h.store.save_boundary(&mut boundary).await.expect("save");

    let mut build = boundary_map_build_event("14TNR");
    h.store.save_event(&mut build).await.expect("save");
    assert!(h.worker.process_next_event().await.expect("process"));

    let settled = h.store.get_event(build.id).await.expect("reload");
    assert!(settled.failed);
    assert!(settled.errors[0].contains("bands 4 and 8"));
}

struct FailingTask;

#[async_trait]
impl TaskHandler for FailingTask {
    async fn run(&self, _ctx: &TaskContext, _event: &Event) -> Result<()> {
        Err(Error::internal("failed task!"))
    }
}

#[tokio::test]
async fn test_failed_handler_settles_event_terminally() {
    let h = harness();

    let mut registry = TaskRegistry::standard();
    registry.register(
        "Failable",
        Arc::new(FailingTask),
        std::time::Duration::from_secs(5),
    );
    let ctx = TaskContext::new(
        Arc::clone(&h.store) as Arc<dyn Datastore>,
        Arc::clone(&h.blobs) as Arc<dyn BlobStore>,
        Arc::clone(&h.satellite) as Arc<dyn SatelliteSource>,
        Arc::new(StaticNdviTool::with_defaults()),
    );
    let worker = Worker::new(Arc::new(ctx), registry);

    let mut event = Event::new("Failable").with_max_attempts(1);
    h.store.save_event(&mut event).await.expect("save");
    assert!(worker.process_next_event().await.expect("process"));

    let settled = h.store.get_event(event.id).await.expect("reload");
    assert_eq!(settled.attempts, 1);
    assert!(!settled.started);
    assert!(settled.failed);
    assert!(!settled.passed);
    assert_eq!(settled.errors.len(), 1);
    assert!(settled.errors[0].len() <= 250);
    assert!(settled.errors[0].contains("failed task!"));
}

#[tokio::test]
async fn test_unknown_event_type_is_poisoned_immediately() {
    let h = harness();
    let mut event = Event::new("NoSuchTask").with_max_attempts(3);
    h.store.save_event(&mut event).await.expect("save");

    assert!(h.worker.process_next_event().await.expect("process"));
    let settled = h.store.get_event(event.id).await.expect("reload");
    assert!(settled.failed);
    assert!(!settled.started);
    // Poisoning is not an attempt; the handler never ran.
    assert_eq!(settled.attempts, 0);
}

#[tokio::test]
async fn test_released_event_retries_until_budget_spent() {
    let h = harness();

    let mut registry = TaskRegistry::new();
    registry.register(
        "Failable",
        Arc::new(FailingTask),
        std::time::Duration::from_secs(5),
    );
    let ctx = TaskContext::new(
        Arc::clone(&h.store) as Arc<dyn Datastore>,
        Arc::clone(&h.blobs) as Arc<dyn BlobStore>,
        Arc::clone(&h.satellite) as Arc<dyn SatelliteSource>,
        Arc::new(StaticNdviTool::with_defaults()),
    );
    let worker = Worker::new(Arc::new(ctx), registry);

    let mut event = Event::new("Failable").with_max_attempts(2);
    h.store.save_event(&mut event).await.expect("save");

    assert!(worker.process_next_event().await.expect("process"));
    let after_first = h.store.get_event(event.id).await.expect("reload");
    assert_eq!(after_first.attempts, 1);
    assert!(!after_first.failed, "one attempt left, must be released");
    assert!(!after_first.started);

    assert!(worker.process_next_event().await.expect("process"));
    let after_second = h.store.get_event(event.id).await.expect("reload");
    assert_eq!(after_second.attempts, 2);
    assert!(after_second.failed);
    assert_eq!(after_second.errors.len(), 2);
}
