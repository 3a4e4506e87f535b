//! User accounts.

use serde::{Deserialize, Serialize};

use veld_core::UserId;

/// An account that owns boundaries and rasters.
///
/// `password` holds the bcrypt hash, never the plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identifier; nil until first saved.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Unique account name.
    pub name: String,
    /// bcrypt password hash.
    pub password: String,
    /// Cap on concurrently existing boundaries.
    pub max_allowed_boundaries: i32,
    /// Lifetime cap on boundary creations.
    pub max_allowed_boundary_creations: i32,
    /// Lifetime boundary creation count.
    pub boundaries_created: i32,
    /// Disabled accounts cannot authenticate.
    pub enabled: bool,
}

impl User {
    /// Creates an unsaved account with the default quotas.
    #[must_use]
    pub fn new(name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: UserId::nil(),
            name: name.into(),
            password: password_hash.into(),
            max_allowed_boundaries: 10,
            max_allowed_boundary_creations: 100,
            boundaries_created: 0,
            enabled: true,
        }
    }
}
