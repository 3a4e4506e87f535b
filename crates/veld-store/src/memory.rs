//! In-memory implementations for testing.
//!
//! [`MemoryStore`], [`MemoryBlobStore`] and [`MemorySatelliteSource`] mirror
//! the observable semantics of their production counterparts (claim
//! atomicity, guarded file append, natural-key upsert, audit mirroring) over
//! plain locked maps.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: no durability, single process only
//! - Geometry intersection uses planar `geo` predicates rather than the
//!   store's geospatial index; identical for the polygon-in-grid-square
//!   scale this service queries at

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use geo::Intersects;

use veld_core::error::{Error, Result};
use veld_core::{BoundaryId, EventId, Geometry, ObjectRecordId, RasterId, TileId, UserId};

use crate::blob::{BlobStore, SatelliteBucket, SatelliteSource};
use crate::entities::{Boundary, Event, ObjectRecord, Raster, Setting, Tile, TileFile, User};
use crate::store::{BoundaryFilter, Datastore, EventFilter, TileQuery};

/// Converts a lock poison error to a store error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::store("lock poisoned")
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    tiles: Vec<Tile>,
    boundaries: Vec<Boundary>,
    rasters: Vec<Raster>,
    settings: Vec<Setting>,
    objects: Vec<ObjectRecord>,
    users: Vec<User>,
}

/// In-memory document store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of events currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn event_count(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poison_err)?.events.len())
    }

    /// Returns the audit rows, for assertions.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn object_records(&self) -> Result<Vec<ObjectRecord>> {
        Ok(self.inner.read().map_err(poison_err)?.objects.clone())
    }
}

fn geometries_intersect(query: &geo_types::Polygon<f64>, boundary: &Boundary) -> bool {
    boundary
        .geometry
        .to_geo_polygon()
        .map(|polygon| query.intersects(&polygon))
        .unwrap_or(false)
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn save_event(&self, event: &mut Event) -> Result<()> {
        event.updated_date = bson::DateTime::now();
        let mut inner = self.inner.write().map_err(poison_err)?;
        if event.id.is_nil() {
            event.id = EventId::generate();
            inner.events.push(event.clone());
        } else if let Some(stored) = inner.events.iter_mut().find(|e| e.id == event.id) {
            *stored = event.clone();
        }
        Ok(())
    }

    async fn count_events(&self, filter: &EventFilter) -> Result<u64> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.events.iter().filter(|e| filter.matches(e)).count() as u64)
    }

    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn claim_next_event(&self) -> Result<Option<Event>> {
        let now = bson::DateTime::now();
        let mut inner = self.inner.write().map_err(poison_err)?;

        let mut best: Option<usize> = None;
        for (index, event) in inner.events.iter().enumerate() {
            let eligible = !event.started
                && !event.passed
                && !event.failed
                && event.attempts < event.max_attempts
                && now.timestamp_millis() > event.start_after_date.timestamp_millis();
            if !eligible {
                continue;
            }
            match best {
                Some(current) if inner.events[current].priority >= event.priority => {}
                _ => best = Some(index),
            }
        }

        Ok(best.map(|index| {
            let event = &mut inner.events[index];
            event.started = true;
            event.started_date = now;
            event.updated_date = now;
            event.clone()
        }))
    }

    async fn get_event(&self, id: EventId) -> Result<Event> {
        let inner = self.inner.read().map_err(poison_err)?;
        inner
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| Error::resource_not_found("event", id))
    }

    async fn find_tile(&self, query: &TileQuery) -> Result<Option<Tile>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut matches: Vec<&Tile> = inner
            .tiles
            .iter()
            .filter(|tile| {
                query.id.is_none_or(|id| tile.id == id)
                    && query.date.is_none_or(|date| tile.date == date)
                    && query
                        .mgrs_code
                        .as_ref()
                        .is_none_or(|code| &tile.mgrs_code == code)
                    && query
                        .source_satellite
                        .as_ref()
                        .is_none_or(|satellite| &tile.source_satellite == satellite)
            })
            .collect();
        matches.sort_by_key(|tile| std::cmp::Reverse(tile.date.timestamp_millis()));
        Ok(matches.first().map(|tile| (*tile).clone()))
    }

    async fn find_recent_tiles(&self, mgrs_code: &str, limit: i64) -> Result<Vec<Tile>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut tiles: Vec<Tile> = inner
            .tiles
            .iter()
            .filter(|tile| tile.mgrs_code == mgrs_code)
            .cloned()
            .collect();
        tiles.sort_by_key(|tile| std::cmp::Reverse(tile.date.timestamp_millis()));
        tiles.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(tiles)
    }

    async fn upsert_tile(&self, tile: &Tile) -> Result<Tile> {
        let now = bson::DateTime::now();
        let mut inner = self.inner.write().map_err(poison_err)?;
        if let Some(stored) = inner.tiles.iter_mut().find(|t| {
            t.date == tile.date
                && t.mgrs_code == tile.mgrs_code
                && t.source_satellite == tile.source_satellite
        }) {
            stored.updated_date = now;
            stored.geometry = tile.geometry.clone();
            stored.files = tile.files.clone();
            return Ok(stored.clone());
        }

        let mut created = tile.clone();
        created.id = TileId::generate();
        created.updated_date = now;
        inner.tiles.push(created.clone());
        Ok(created)
    }

    async fn insert_file_into_tile(&self, tile_id: TileId, file: &TileFile) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if let Some(tile) = inner.tiles.iter_mut().find(|t| t.id == tile_id) {
            let already_listed = tile.files.iter().any(|f| f.object_path == file.object_path);
            if !already_listed {
                tile.files.push(file.clone());
                tile.updated_date = bson::DateTime::now();
            }
        }
        Ok(())
    }

    async fn set_tile_geometry(&self, tile_id: TileId, geometry: &Geometry) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        let tile = inner
            .tiles
            .iter_mut()
            .find(|t| t.id == tile_id)
            .ok_or_else(|| Error::resource_not_found("tile", tile_id))?;
        tile.geometry = geometry.clone();
        tile.updated_date = bson::DateTime::now();
        Ok(())
    }

    async fn save_boundary(&self, boundary: &mut Boundary) -> Result<()> {
        boundary.id = BoundaryId::generate();
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.boundaries.push(boundary.clone());
        Ok(())
    }

    async fn find_boundary(
        &self,
        id: BoundaryId,
        user_id: Option<UserId>,
    ) -> Result<Option<Boundary>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .boundaries
            .iter()
            .find(|b| b.id == id && user_id.is_none_or(|uid| b.user_id == uid))
            .cloned())
    }

    async fn find_boundaries(&self, filter: &BoundaryFilter) -> Result<Vec<Boundary>> {
        let query_polygon = filter
            .intersects
            .as_ref()
            .map(Geometry::to_geo_polygon)
            .transpose()?;

        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .boundaries
            .iter()
            .filter(|b| {
                filter.id.is_none_or(|id| b.id == id)
                    && filter.user_id.is_none_or(|uid| b.user_id == uid)
                    && filter
                        .mgrs_code
                        .as_ref()
                        .is_none_or(|code| b.mgrs_codes.contains(code))
                    && query_polygon
                        .as_ref()
                        .is_none_or(|polygon| geometries_intersect(polygon, b))
            })
            .cloned()
            .collect())
    }

    async fn count_boundaries(&self, user_id: UserId) -> Result<u64> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .boundaries
            .iter()
            .filter(|b| b.user_id == user_id)
            .count() as u64)
    }

    async fn delete_boundary_row(&self, id: BoundaryId, user_id: UserId) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner
            .boundaries
            .retain(|b| !(b.id == id && b.user_id == user_id));
        Ok(())
    }

    async fn save_raster(&self, raster: &mut Raster) -> Result<()> {
        if raster.id.is_nil() {
            raster.id = RasterId::generate();
        }
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.rasters.push(raster.clone());
        Ok(())
    }

    async fn find_raster(&self, id: RasterId, user_id: Option<UserId>) -> Result<Option<Raster>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .rasters
            .iter()
            .find(|r| r.id == id && user_id.is_none_or(|uid| r.user_id == uid))
            .cloned())
    }

    async fn find_rasters(
        &self,
        boundary_id: BoundaryId,
        kind: Option<&str>,
        user_id: Option<UserId>,
    ) -> Result<Vec<Raster>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .rasters
            .iter()
            .filter(|r| {
                r.boundary_id == boundary_id
                    && kind.is_none_or(|k| r.kind == k)
                    && user_id.is_none_or(|uid| r.user_id == uid)
            })
            .cloned()
            .collect())
    }

    async fn delete_raster_row(&self, id: RasterId) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.rasters.retain(|r| r.id != id);
        Ok(())
    }

    async fn load_setting(&self) -> Result<Option<Setting>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.settings.first().cloned())
    }

    async fn save_setting(&self, setting: &mut Setting) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.settings.push(setting.clone());
        Ok(())
    }

    async fn record_object(&self, path: &str, exists: bool) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if let Some(record) = inner.objects.iter_mut().find(|o| o.path == path) {
            record.exists = exists;
        } else {
            inner.objects.push(ObjectRecord {
                id: ObjectRecordId::generate(),
                path: path.to_string(),
                exists,
            });
        }
        Ok(())
    }

    async fn save_user(&self, user: &mut User) -> Result<()> {
        user.id = UserId::generate();
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.users.iter().find(|u| u.name == name).cloned())
    }

    async fn count_users(&self) -> Result<u64> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.users.len() as u64)
    }

    async fn increment_boundaries_created(&self, id: UserId) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.boundaries_created += 1;
        }
        Ok(())
    }
}

/// In-memory application bucket for tests.
///
/// Mirrors puts and deletes into the audit collection when constructed with
/// [`MemoryBlobStore::with_audit`], matching the production adapter.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Bytes>>,
    audit: Option<Arc<dyn Datastore>>,
}

impl MemoryBlobStore {
    /// Creates an empty bucket with no audit mirroring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty bucket that mirrors mutations into the given store.
    #[must_use]
    pub fn with_audit(audit: Arc<dyn Datastore>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            audit: Some(audit),
        }
    }

    /// Returns a stored object's bytes, for assertions.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn object(&self, object_path: &str) -> Result<Option<Bytes>> {
        Ok(self
            .objects
            .read()
            .map_err(poison_err)?
            .get(object_path)
            .cloned())
    }

    /// Returns the number of stored objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn object_count(&self) -> Result<usize> {
        Ok(self.objects.read().map_err(poison_err)?.len())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, local_path: &Path, object_path: &str) -> Result<()> {
        let bytes = Bytes::from(tokio::fs::read(local_path).await?);
        {
            let mut objects = self.objects.write().map_err(poison_err)?;
            objects.insert(object_path.to_string(), bytes);
        }
        if let Some(audit) = &self.audit {
            audit.record_object(object_path, true).await?;
        }
        Ok(())
    }

    async fn get(&self, local_path: &Path, object_path: &str) -> Result<()> {
        let bytes = {
            let objects = self.objects.read().map_err(poison_err)?;
            objects
                .get(object_path)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("object not found: {object_path}")))?
        };
        tokio::fs::write(local_path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, object_path: &str) -> Result<()> {
        {
            let mut objects = self.objects.write().map_err(poison_err)?;
            objects.remove(object_path);
        }
        if let Some(audit) = &self.audit {
            audit.record_object(object_path, false).await?;
        }
        Ok(())
    }
}

/// In-memory satellite buckets for tests.
#[derive(Debug, Default)]
pub struct MemorySatelliteSource {
    objects: RwLock<HashMap<(SatelliteBucket, String), Bytes>>,
}

impl MemorySatelliteSource {
    /// Creates empty buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object into a bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert(
        &self,
        bucket: SatelliteBucket,
        object_path: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Result<()> {
        let mut objects = self.objects.write().map_err(poison_err)?;
        objects.insert((bucket, object_path.into()), bytes.into());
        Ok(())
    }
}

#[async_trait]
impl SatelliteSource for MemorySatelliteSource {
    async fn fetch(
        &self,
        local_path: &Path,
        object_path: &str,
        bucket: SatelliteBucket,
    ) -> Result<()> {
        let bytes = {
            let objects = self.objects.read().map_err(poison_err)?;
            objects
                .get(&(bucket, object_path.to_string()))
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("object not found: {object_path}")))?
        };
        tokio::fs::write(local_path, bytes).await?;
        Ok(())
    }
}
