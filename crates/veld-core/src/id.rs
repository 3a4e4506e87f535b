//! Strongly-typed identifiers for veld entities.
//!
//! All identifiers wrap the document store's native 12-byte ObjectId:
//!
//! - **Strongly typed**: Prevents mixing up different ID types at compile time
//! - **Creation-time ordered**: ObjectIds embed a timestamp and sort roughly
//!   by insertion order
//! - **Globally unique**: No coordination required for generation
//!
//! A freshly constructed entity that has not yet been persisted carries the
//! nil identifier (all-zero bytes); the store assigns a real identifier on
//! first save. `is_nil` distinguishes the two states.

use std::fmt;
use std::str::FromStr;

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const NIL_BYTES: [u8; 12] = [0; 12];

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(ObjectId);

        impl $name {
            /// Generates a new unique identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(ObjectId::new())
            }

            /// Returns the nil (all-zero) identifier used for unsaved entities.
            #[must_use]
            pub const fn nil() -> Self {
                Self(ObjectId::from_bytes(NIL_BYTES))
            }

            /// Returns true if this is the nil identifier.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.bytes() == NIL_BYTES
            }

            /// Wraps a raw ObjectId.
            #[must_use]
            pub const fn from_object_id(oid: ObjectId) -> Self {
                Self(oid)
            }

            /// Returns the underlying ObjectId.
            #[must_use]
            pub const fn as_object_id(&self) -> ObjectId {
                self.0
            }

            /// Returns the 24-character hex representation.
            #[must_use]
            pub fn to_hex(&self) -> String {
                self.0.to_hex()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                ObjectId::parse_str(s).map(Self).map_err(|e| Error::InvalidId {
                    message: format!(concat!("invalid ", $label, " ID '{}': {}"), s, e),
                })
            }
        }

        impl From<ObjectId> for $name {
            fn from(oid: ObjectId) -> Self {
                Self(oid)
            }
        }
    };
}

entity_id!(
    /// A unique identifier for a queued pipeline event.
    EventId,
    "event"
);

entity_id!(
    /// A unique identifier for a satellite tile capture.
    TileId,
    "tile"
);

entity_id!(
    /// A unique identifier for a user-drawn boundary.
    BoundaryId,
    "boundary"
);

entity_id!(
    /// A unique identifier for a generated per-boundary raster.
    RasterId,
    "raster"
);

entity_id!(
    /// A unique identifier for a user account.
    UserId,
    "user"
);

entity_id!(
    /// A unique identifier for the ingestion settings row.
    SettingId,
    "setting"
);

entity_id!(
    /// A unique identifier for a blob-existence audit row.
    ObjectRecordId,
    "object_record"
);
