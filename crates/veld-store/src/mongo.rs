//! MongoDB implementation of [`Datastore`].
//!
//! The driver's single-document atomic `findOneAndUpdate` is the primitive
//! behind the event claim and the guarded tile-file append; everything else
//! is plain CRUD. Every call is wrapped in its own timeout (15 s for writes
//! and point lookups, 60 s for scans) so a wedged connection surfaces as
//! [`veld_core::Error::Timeout`] instead of hanging a worker.

use std::future::Future;
use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, ReturnDocument, WriteConcern};
use mongodb::{Client, Collection, Database};

use async_trait::async_trait;

use veld_core::error::{Error, Result};
use veld_core::{BoundaryId, EventId, Geometry, RasterId, TileId, UserId};

use crate::entities::{Boundary, Event, ObjectRecord, Raster, Setting, Tile, TileFile, User};
use crate::store::{BoundaryFilter, Datastore, EventFilter, TileQuery};

const WRITE_TIMEOUT: Duration = Duration::from_secs(15);
const SCAN_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the document store.
#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Connection string.
    pub uri: String,
    /// Database name (`test_db` under the test profile).
    pub database: String,
}

/// The production document store.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    database: String,
}

impl MongoStore {
    /// Connects, pings the primary, and returns the store.
    ///
    /// # Errors
    ///
    /// Returns a store error when the URI is malformed or the deployment is
    /// unreachable.
    pub async fn connect(config: &MongoConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| Error::store_with_source("parse connection string", e))?;
        options.max_pool_size = Some(20);
        options.write_concern = Some(WriteConcern::majority());

        let client = Client::with_options(options)
            .map_err(|e| Error::store_with_source("create client", e))?;

        let store = Self {
            client,
            database: config.database.clone(),
        };
        timed("ping", WRITE_TIMEOUT, async {
            store.db().run_command(doc! { "ping": 1 }).await
        })
        .await?;
        Ok(store)
    }

    /// Wraps an already-connected client.
    #[must_use]
    pub fn from_client(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    fn db(&self) -> Database {
        self.client.database(&self.database)
    }

    fn events(&self) -> Collection<Event> {
        self.db().collection("event")
    }

    fn tiles(&self) -> Collection<Tile> {
        self.db().collection("tile")
    }

    fn boundaries(&self) -> Collection<Boundary> {
        self.db().collection("boundary")
    }

    fn rasters(&self) -> Collection<Raster> {
        self.db().collection("raster")
    }

    fn settings(&self) -> Collection<Setting> {
        self.db().collection("setting")
    }

    fn objects(&self) -> Collection<ObjectRecord> {
        self.db().collection("object_store")
    }

    fn users(&self) -> Collection<User> {
        self.db().collection("user")
    }
}

async fn timed<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = mongodb::error::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(Error::store_with_source(op, err)),
        Err(_) => Err(Error::timeout(op)),
    }
}

fn to_bson<T: serde::Serialize>(value: &T) -> Result<Bson> {
    bson::to_bson(value).map_err(|e| Error::serialization(e.to_string()))
}

fn event_filter_doc(filter: &EventFilter) -> Document {
    let mut doc = Document::new();
    if let Some(event_type) = &filter.event_type {
        doc.insert("event_type", event_type);
    }
    if let Some(code) = &filter.data_mgrs_code {
        doc.insert("data.mgrsCode", code);
    }
    if filter.unsettled_only {
        doc.insert("started", false);
        doc.insert("passed", false);
        doc.insert("failed", false);
    }
    if filter.attempts_below_max {
        doc.insert("$expr", doc! { "$lt": ["$attempts", "$max_attempts"] });
    }
    doc
}

fn tile_query_doc(query: &TileQuery) -> Document {
    let mut doc = Document::new();
    if let Some(id) = query.id {
        doc.insert("_id", id.as_object_id());
    }
    if let Some(date) = query.date {
        doc.insert("date", date);
    }
    if let Some(code) = &query.mgrs_code {
        doc.insert("mgrs_code", code);
    }
    if let Some(satellite) = &query.source_satellite {
        doc.insert("source_satellite", satellite);
    }
    doc
}

fn boundary_filter_doc(filter: &BoundaryFilter) -> Result<Document> {
    let mut doc = Document::new();
    if let Some(id) = filter.id {
        doc.insert("_id", id.as_object_id());
    }
    if let Some(user_id) = filter.user_id {
        doc.insert("user_id", user_id.as_object_id());
    }
    if let Some(code) = &filter.mgrs_code {
        doc.insert("mgrs_codes", code);
    }
    if let Some(geometry) = &filter.intersects {
        doc.insert(
            "geometry",
            doc! { "$geoIntersects": { "$geometry": to_bson(geometry)? } },
        );
    }
    Ok(doc)
}

#[async_trait]
impl Datastore for MongoStore {
    async fn save_event(&self, event: &mut Event) -> Result<()> {
        event.updated_date = bson::DateTime::now();
        if event.id.is_nil() {
            event.id = EventId::generate();
            timed("insert event", WRITE_TIMEOUT, async {
                self.events().insert_one(&*event).await
            })
            .await?;
        } else {
            let filter = doc! { "_id": event.id.as_object_id() };
            timed("replace event", WRITE_TIMEOUT, async {
                self.events().replace_one(filter, &*event).await
            })
            .await?;
        }
        Ok(())
    }

    async fn count_events(&self, filter: &EventFilter) -> Result<u64> {
        timed("count events", SCAN_TIMEOUT, async {
            self.events().count_documents(event_filter_doc(filter)).await
        })
        .await
    }

    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let cursor = timed("find events", SCAN_TIMEOUT, async {
            self.events().find(event_filter_doc(filter)).await
        })
        .await?;
        timed("collect events", SCAN_TIMEOUT, cursor.try_collect()).await
    }

    async fn claim_next_event(&self) -> Result<Option<Event>> {
        let now = bson::DateTime::now();
        let filter = doc! {
            "started": false,
            "passed": false,
            "failed": false,
            "$and": [
                { "$expr": { "$lt": ["$attempts", "$max_attempts"] } },
                { "$expr": { "$gt": [now, "$start_after_date"] } },
            ],
        };
        let update = doc! { "$set": {
            "updated_date": now,
            "started_date": now,
            "started": true,
        } };
        timed("claim event", WRITE_TIMEOUT, async {
            self.events()
                .find_one_and_update(filter, update)
                .sort(doc! { "priority": -1 })
                .return_document(ReturnDocument::After)
                .await
        })
        .await
    }

    async fn get_event(&self, id: EventId) -> Result<Event> {
        timed("get event", WRITE_TIMEOUT, async {
            self.events()
                .find_one(doc! { "_id": id.as_object_id() })
                .await
        })
        .await?
        .ok_or_else(|| Error::resource_not_found("event", id))
    }

    async fn find_tile(&self, query: &TileQuery) -> Result<Option<Tile>> {
        timed("find tile", WRITE_TIMEOUT, async {
            self.tiles()
                .find_one(tile_query_doc(query))
                .sort(doc! { "date": -1 })
                .await
        })
        .await
    }

    async fn find_recent_tiles(&self, mgrs_code: &str, limit: i64) -> Result<Vec<Tile>> {
        let cursor = timed("find recent tiles", WRITE_TIMEOUT, async {
            self.tiles()
                .find(doc! { "mgrs_code": mgrs_code })
                .sort(doc! { "date": -1 })
                .limit(limit)
                .await
        })
        .await?;
        timed("collect tiles", SCAN_TIMEOUT, cursor.try_collect()).await
    }

    async fn upsert_tile(&self, tile: &Tile) -> Result<Tile> {
        let filter = doc! {
            "date": tile.date,
            "mgrs_code": &tile.mgrs_code,
            "source_satellite": &tile.source_satellite,
        };
        let update = doc! { "$set": {
            "updated_date": bson::DateTime::now(),
            "geometry": to_bson(&tile.geometry)?,
            "files": to_bson(&tile.files)?,
        } };
        let updated = timed("upsert tile", WRITE_TIMEOUT, async {
            self.tiles()
                .find_one_and_update(filter, update)
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await
        })
        .await?;
        Ok(updated.unwrap_or_else(|| tile.clone()))
    }

    async fn insert_file_into_tile(&self, tile_id: TileId, file: &TileFile) -> Result<()> {
        let filter = doc! {
            "_id": tile_id.as_object_id(),
            "files.object_path": { "$ne": &file.object_path },
        };
        let update = doc! { "$push": { "files": to_bson(file)? } };
        // No match means the path is already listed; that is the guard
        // doing its job, not an error.
        timed("insert tile file", WRITE_TIMEOUT, async {
            self.tiles().find_one_and_update(filter, update).await
        })
        .await?;
        Ok(())
    }

    async fn set_tile_geometry(&self, tile_id: TileId, geometry: &Geometry) -> Result<()> {
        let update = doc! { "$set": {
            "updated_date": bson::DateTime::now(),
            "geometry": to_bson(geometry)?,
        } };
        let result = timed("set tile geometry", WRITE_TIMEOUT, async {
            self.tiles()
                .update_one(doc! { "_id": tile_id.as_object_id() }, update)
                .await
        })
        .await?;
        if result.matched_count == 0 {
            return Err(Error::resource_not_found("tile", tile_id));
        }
        Ok(())
    }

    async fn save_boundary(&self, boundary: &mut Boundary) -> Result<()> {
        boundary.id = BoundaryId::generate();
        timed("insert boundary", WRITE_TIMEOUT, async {
            self.boundaries().insert_one(&*boundary).await
        })
        .await?;
        Ok(())
    }

    async fn find_boundary(
        &self,
        id: BoundaryId,
        user_id: Option<UserId>,
    ) -> Result<Option<Boundary>> {
        let filter = boundary_filter_doc(&BoundaryFilter {
            id: Some(id),
            user_id,
            ..BoundaryFilter::default()
        })?;
        timed("find boundary", WRITE_TIMEOUT, async {
            self.boundaries().find_one(filter).await
        })
        .await
    }

    async fn find_boundaries(&self, filter: &BoundaryFilter) -> Result<Vec<Boundary>> {
        let filter = boundary_filter_doc(filter)?;
        let cursor = timed("find boundaries", SCAN_TIMEOUT, async {
            self.boundaries().find(filter).await
        })
        .await?;
        timed("collect boundaries", SCAN_TIMEOUT, cursor.try_collect()).await
    }

    async fn count_boundaries(&self, user_id: UserId) -> Result<u64> {
        timed("count boundaries", SCAN_TIMEOUT, async {
            self.boundaries()
                .count_documents(doc! { "user_id": user_id.as_object_id() })
                .await
        })
        .await
    }

    async fn delete_boundary_row(&self, id: BoundaryId, user_id: UserId) -> Result<()> {
        timed("delete boundary", WRITE_TIMEOUT, async {
            self.boundaries()
                .delete_one(doc! {
                    "_id": id.as_object_id(),
                    "user_id": user_id.as_object_id(),
                })
                .await
        })
        .await?;
        Ok(())
    }

    async fn save_raster(&self, raster: &mut Raster) -> Result<()> {
        if raster.id.is_nil() {
            raster.id = RasterId::generate();
        }
        timed("insert raster", WRITE_TIMEOUT, async {
            self.rasters().insert_one(&*raster).await
        })
        .await?;
        Ok(())
    }

    async fn find_raster(&self, id: RasterId, user_id: Option<UserId>) -> Result<Option<Raster>> {
        let mut filter = doc! { "_id": id.as_object_id() };
        if let Some(user_id) = user_id {
            filter.insert("user_id", user_id.as_object_id());
        }
        timed("find raster", SCAN_TIMEOUT, async {
            self.rasters().find_one(filter).await
        })
        .await
    }

    async fn find_rasters(
        &self,
        boundary_id: BoundaryId,
        kind: Option<&str>,
        user_id: Option<UserId>,
    ) -> Result<Vec<Raster>> {
        let mut filter = doc! { "boundary_id": boundary_id.as_object_id() };
        if let Some(kind) = kind {
            filter.insert("type", kind);
        }
        if let Some(user_id) = user_id {
            filter.insert("user_id", user_id.as_object_id());
        }
        let cursor = timed("find rasters", SCAN_TIMEOUT, async {
            self.rasters().find(filter).await
        })
        .await?;
        timed("collect rasters", SCAN_TIMEOUT, cursor.try_collect()).await
    }

    async fn delete_raster_row(&self, id: RasterId) -> Result<()> {
        timed("delete raster", WRITE_TIMEOUT, async {
            self.rasters()
                .delete_one(doc! { "_id": id.as_object_id() })
                .await
        })
        .await?;
        Ok(())
    }

    async fn load_setting(&self) -> Result<Option<Setting>> {
        timed("load setting", WRITE_TIMEOUT, async {
            self.settings().find_one(doc! {}).await
        })
        .await
    }

    async fn save_setting(&self, setting: &mut Setting) -> Result<()> {
        timed("insert setting", WRITE_TIMEOUT, async {
            self.settings().insert_one(&*setting).await
        })
        .await?;
        Ok(())
    }

    async fn record_object(&self, path: &str, exists: bool) -> Result<()> {
        timed("record object", WRITE_TIMEOUT, async {
            self.objects()
                .update_one(doc! { "path": path }, doc! { "$set": { "exists": exists } })
                .upsert(true)
                .await
        })
        .await?;
        Ok(())
    }

    async fn save_user(&self, user: &mut User) -> Result<()> {
        user.id = UserId::generate();
        timed("insert user", WRITE_TIMEOUT, async {
            self.users().insert_one(&*user).await
        })
        .await?;
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        timed("find user", WRITE_TIMEOUT, async {
            self.users().find_one(doc! { "_id": id.as_object_id() }).await
        })
        .await
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        timed("find user by name", WRITE_TIMEOUT, async {
            self.users().find_one(doc! { "name": name }).await
        })
        .await
    }

    async fn count_users(&self) -> Result<u64> {
        timed("count users", SCAN_TIMEOUT, async {
            self.users().count_documents(doc! {}).await
        })
        .await
    }

    async fn increment_boundaries_created(&self, id: UserId) -> Result<()> {
        timed("increment boundary count", WRITE_TIMEOUT, async {
            self.users()
                .update_one(
                    doc! { "_id": id.as_object_id() },
                    doc! { "$inc": { "boundaries_created": 1 } },
                )
                .await
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_filter_doc_shapes() {
        let filter = EventFilter::for_type("IndexDiscovery")
            .unsettled()
            .with_attempts_left();
        let doc = event_filter_doc(&filter);
        assert_eq!(doc.get_str("event_type").expect("field"), "IndexDiscovery");
        assert_eq!(doc.get_bool("started").expect("field"), false);
        assert!(doc.contains_key("$expr"));

        let filter = EventFilter::for_type("BoundaryMapBuild").with_mgrs_code("18QZG");
        let doc = event_filter_doc(&filter);
        assert_eq!(doc.get_str("data.mgrsCode").expect("field"), "18QZG");
        assert!(!doc.contains_key("started"));
    }

    #[test]
    fn test_boundary_filter_doc_geo_intersects() {
        let geometry = Geometry::polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]);
        let filter = BoundaryFilter {
            mgrs_code: Some("31NBA".to_string()),
            intersects: Some(geometry),
            ..BoundaryFilter::default()
        };
        let doc = boundary_filter_doc(&filter).expect("build");
        let geo = doc.get_document("geometry").expect("geometry clause");
        assert!(geo
            .get_document("$geoIntersects")
            .expect("operator")
            .contains_key("$geometry"));
    }

    #[test]
    fn test_tile_query_doc_natural_key() {
        let query = TileQuery::by_natural_key(
            bson::DateTime::from_millis(1_580_000_000_000),
            "18QZG",
            "S2A-L2A",
        );
        let doc = tile_query_doc(&query);
        assert!(doc.contains_key("date"));
        assert_eq!(doc.get_str("mgrs_code").expect("field"), "18QZG");
        assert_eq!(doc.get_str("source_satellite").expect("field"), "S2A-L2A");
        assert!(!doc.contains_key("_id"));
    }
}
