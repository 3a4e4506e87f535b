//! Blob existence audit rows.

use serde::{Deserialize, Serialize};

use veld_core::ObjectRecordId;

/// One row in the `object_store` collection, upserted by path on every
/// application-bucket put and delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Identifier.
    #[serde(rename = "_id")]
    pub id: ObjectRecordId,
    /// Blob key in the application bucket.
    pub path: String,
    /// Whether the blob currently exists.
    pub exists: bool,
}
