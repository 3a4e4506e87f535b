//! User-drawn boundaries of interest.

use serde::{Deserialize, Serialize};

use veld_core::{BoundaryId, Geometry, UserId};

/// A user-owned polygon of interest.
///
/// At creation the geometry must be a single-ring polygon whose vertices all
/// fall into one MGRS grid square, with an area in (0, 2500] acres; the API
/// layer enforces this before saving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    /// Identifier; nil until first saved.
    #[serde(rename = "_id")]
    pub id: BoundaryId,
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Denormalized MGRS grid squares touched by the geometry.
    pub mgrs_codes: Vec<String>,
    /// The boundary polygon.
    pub geometry: Geometry,
    /// Area in acres, computed at creation.
    pub acres: f64,
}

impl Boundary {
    /// Creates an unsaved boundary; `mgrs_codes` and `acres` are filled in
    /// by the creation flow.
    #[must_use]
    pub fn new(user_id: UserId, name: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: BoundaryId::nil(),
            user_id,
            name: name.into(),
            mgrs_codes: Vec::new(),
            geometry,
            acres: 0.0,
        }
    }
}
