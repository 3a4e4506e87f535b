//! Collection entities.
//!
//! Field names are the bson-level schema; serde renames pin them explicitly
//! so struct field renames can never silently migrate the collections.

mod boundary;
mod event;
mod object_record;
mod raster;
mod setting;
mod tile;
mod user;

pub use boundary::Boundary;
pub use event::{Event, MAX_ERROR_LEN};
pub use object_record::ObjectRecord;
pub use raster::{Raster, RasterMeta, RASTER_KIND_NDVI_MAP};
pub use setting::Setting;
pub use tile::{FileUse, Tile, TileFile};
pub use user::User;
