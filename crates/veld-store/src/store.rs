//! The document-store contract.
//!
//! [`Datastore`] covers exactly the operations the pipeline and the API
//! consume. Implementations must guarantee:
//!
//! - **Claim atomicity**: two concurrent [`Datastore::claim_next_event`]
//!   calls never return the same event; the highest-priority live, eligible
//!   event wins and is marked started in the same step.
//! - **Guarded file append**: [`Datastore::insert_file_into_tile`] never
//!   produces two files with the same object path, no matter how often it is
//!   called.
//! - **Natural-key upsert**: [`Datastore::upsert_tile`] is idempotent over
//!   `(date, mgrs_code, source_satellite)`.

use async_trait::async_trait;

use veld_core::error::{Error, Result};
use veld_core::{BoundaryId, EventId, Geometry, RasterId, TileId, UserId};

use crate::blob::BlobStore;
use crate::entities::{Boundary, Event, Raster, Setting, Tile, TileFile, User};

/// Predicate over the event collection.
///
/// Only the combinations the pipeline actually queries are expressible;
/// everything unset matches everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Match a specific handler tag.
    pub event_type: Option<String>,
    /// Match events whose data carries this `mgrsCode`.
    pub data_mgrs_code: Option<String>,
    /// Match only events that are neither held nor settled.
    pub unsettled_only: bool,
    /// Additionally require `attempts < max_attempts`.
    pub attempts_below_max: bool,
}

impl EventFilter {
    /// Filter for a handler tag.
    #[must_use]
    pub fn for_type(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Self::default()
        }
    }

    /// Restricts to events whose data carries this `mgrsCode`.
    #[must_use]
    pub fn with_mgrs_code(mut self, mgrs_code: impl Into<String>) -> Self {
        self.data_mgrs_code = Some(mgrs_code.into());
        self
    }

    /// Restricts to events that are neither held nor settled.
    #[must_use]
    pub fn unsettled(mut self) -> Self {
        self.unsettled_only = true;
        self
    }

    /// Additionally requires spare attempts.
    #[must_use]
    pub fn with_attempts_left(mut self) -> Self {
        self.attempts_below_max = true;
        self
    }

    /// Applies the filter to one event.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(event_type) = &self.event_type {
            if &event.event_type != event_type {
                return false;
            }
        }
        if let Some(code) = &self.data_mgrs_code {
            if event.data_value("mgrsCode") != Some(code.as_str()) {
                return false;
            }
        }
        if self.unsettled_only && (event.started || event.passed || event.failed) {
            return false;
        }
        if self.attempts_below_max && event.attempts >= event.max_attempts {
            return false;
        }
        true
    }
}

/// Lookup key for a single tile.
#[derive(Debug, Clone, Default)]
pub struct TileQuery {
    /// Match by identifier.
    pub id: Option<TileId>,
    /// Match by capture date.
    pub date: Option<bson::DateTime>,
    /// Match by MGRS grid square.
    pub mgrs_code: Option<String>,
    /// Match by satellite tag.
    pub source_satellite: Option<String>,
}

impl TileQuery {
    /// Query by identifier.
    #[must_use]
    pub fn by_id(id: TileId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Query by the tile natural key.
    #[must_use]
    pub fn by_natural_key(
        date: bson::DateTime,
        mgrs_code: impl Into<String>,
        source_satellite: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            date: Some(date),
            mgrs_code: Some(mgrs_code.into()),
            source_satellite: Some(source_satellite.into()),
        }
    }
}

/// Predicate over the boundary collection.
#[derive(Debug, Clone, Default)]
pub struct BoundaryFilter {
    /// Match by identifier.
    pub id: Option<BoundaryId>,
    /// Match by owner.
    pub user_id: Option<UserId>,
    /// Match boundaries denormalized into this MGRS grid square.
    pub mgrs_code: Option<String>,
    /// Match boundaries whose geometry intersects this polygon.
    pub intersects: Option<Geometry>,
}

/// Every document-store operation the service consumes.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Persists an event: inserts (assigning an id) when the id is nil,
    /// replaces by id otherwise. Always refreshes `updated_date`.
    async fn save_event(&self, event: &mut Event) -> Result<()>;

    /// Counts events matching the filter.
    async fn count_events(&self, filter: &EventFilter) -> Result<u64>;

    /// Returns events matching the filter, in store order.
    async fn find_events(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Atomically claims the next runnable event: live, eligible by
    /// `start_after_date`, highest priority first. Marks it started and
    /// returns the updated document, or `None` when nothing is runnable.
    async fn claim_next_event(&self) -> Result<Option<Event>>;

    /// Reloads an event by id.
    async fn get_event(&self, id: EventId) -> Result<Event>;

    /// Returns the tile matching the query, newest capture first when the
    /// query is ambiguous.
    async fn find_tile(&self, query: &TileQuery) -> Result<Option<Tile>>;

    /// Returns up to `limit` tiles for the grid square, newest first.
    async fn find_recent_tiles(&self, mgrs_code: &str, limit: i64) -> Result<Vec<Tile>>;

    /// Upserts a tile by natural key, overwriting `geometry` and `files`,
    /// and returns the stored row.
    async fn upsert_tile(&self, tile: &Tile) -> Result<Tile>;

    /// Appends a file to a tile unless a file with the same object path is
    /// already present. Idempotent.
    async fn insert_file_into_tile(&self, tile_id: TileId, file: &TileFile) -> Result<()>;

    /// Replaces a tile's footprint geometry.
    async fn set_tile_geometry(&self, tile_id: TileId, geometry: &Geometry) -> Result<()>;

    /// Persists a new boundary, assigning an id.
    async fn save_boundary(&self, boundary: &mut Boundary) -> Result<()>;

    /// Returns a boundary by id, optionally scoped to an owner.
    async fn find_boundary(
        &self,
        id: BoundaryId,
        user_id: Option<UserId>,
    ) -> Result<Option<Boundary>>;

    /// Returns boundaries matching the filter.
    async fn find_boundaries(&self, filter: &BoundaryFilter) -> Result<Vec<Boundary>>;

    /// Counts the boundaries owned by a user.
    async fn count_boundaries(&self, user_id: UserId) -> Result<u64>;

    /// Deletes a boundary row scoped to its owner. Raster cascade is
    /// [`delete_boundary`]'s job.
    async fn delete_boundary_row(&self, id: BoundaryId, user_id: UserId) -> Result<()>;

    /// Persists a new raster row, assigning an id when nil.
    async fn save_raster(&self, raster: &mut Raster) -> Result<()>;

    /// Returns a raster by id, optionally scoped to an owner.
    async fn find_raster(&self, id: RasterId, user_id: Option<UserId>) -> Result<Option<Raster>>;

    /// Returns the rasters of a boundary, optionally restricted by kind and
    /// owner.
    async fn find_rasters(
        &self,
        boundary_id: BoundaryId,
        kind: Option<&str>,
        user_id: Option<UserId>,
    ) -> Result<Vec<Raster>>;

    /// Deletes a raster row. Blob cascade is [`delete_boundary_rasters`]'s
    /// job.
    async fn delete_raster_row(&self, id: RasterId) -> Result<()>;

    /// Loads the single settings row, if configured.
    async fn load_setting(&self) -> Result<Option<Setting>>;

    /// Persists the settings row.
    async fn save_setting(&self, setting: &mut Setting) -> Result<()>;

    /// Upserts a blob-existence audit row by path.
    async fn record_object(&self, path: &str, exists: bool) -> Result<()>;

    /// Persists a new user, assigning an id.
    async fn save_user(&self, user: &mut User) -> Result<()>;

    /// Returns a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Returns a user by unique account name.
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Counts all user accounts.
    async fn count_users(&self) -> Result<u64>;

    /// Bumps a user's lifetime boundary creation count by one.
    async fn increment_boundaries_created(&self, id: UserId) -> Result<()>;
}

/// Deletes all rasters of a boundary (optionally one kind only), blobs
/// first, then rows.
///
/// # Errors
///
/// Returns the first store or blob error encountered.
pub async fn delete_boundary_rasters(
    store: &dyn Datastore,
    blobs: &dyn BlobStore,
    boundary_id: BoundaryId,
    kind: Option<&str>,
) -> Result<()> {
    let rasters = store.find_rasters(boundary_id, kind, None).await?;
    for raster in rasters {
        if !raster.image_path.is_empty() {
            blobs.delete(&raster.image_path).await?;
        }
        store.delete_raster_row(raster.id).await?;
    }
    Ok(())
}

/// Deletes a boundary and everything generated for it.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] when the boundary does not exist for
/// this owner, otherwise the first store or blob error encountered.
pub async fn delete_boundary(
    store: &dyn Datastore,
    blobs: &dyn BlobStore,
    id: BoundaryId,
    user_id: UserId,
) -> Result<()> {
    let boundary = store
        .find_boundary(id, Some(user_id))
        .await?
        .ok_or_else(|| Error::resource_not_found("boundary", id))?;
    delete_boundary_rasters(store, blobs, boundary.id, None).await?;
    store.delete_boundary_row(id, user_id).await
}
