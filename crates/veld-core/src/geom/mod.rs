//! Geometry primitives for boundaries and tile footprints.
//!
//! Geometries follow the GeoJSON polygon shape (`type` + nested coordinate
//! rings, points as `[lon, lat]`) so they can be stored directly in the
//! document store and fed to its geospatial operators. Planar computations
//! (area, intersection in the in-memory store) go through `geo-types` after
//! projecting to UTM where meters matter.

mod mgrs;
mod utm;

pub use mgrs::{grid_square, mgrs_from_geodetic, mgrs_to_geodetic};
pub use utm::{geodetic_from_utm, utm_from_geodetic, utm_zone_for, UtmCoord};

use std::collections::BTreeSet;

use geo::Area;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Square meters per acre.
const SQUARE_METERS_PER_ACRE: f64 = 4046.856_422_4;

/// A GeoJSON-shaped geometry.
///
/// Only `Polygon` geometries are meaningful to the service; the type tag is
/// kept as data so malformed upstream documents fail validation instead of
/// deserialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    /// The GeoJSON geometry type tag (`"Polygon"` for all valid values).
    #[serde(rename = "type")]
    pub kind: String,
    /// Rings of `[lon, lat]` positions; the first ring is the outer ring.
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

impl Geometry {
    /// The GeoJSON type tag for polygons.
    pub const POLYGON: &'static str = "Polygon";

    /// Creates a polygon geometry from coordinate rings.
    #[must_use]
    pub fn polygon(coordinates: Vec<Vec<Vec<f64>>>) -> Self {
        Self {
            kind: Self::POLYGON.to_string(),
            coordinates,
        }
    }

    /// Returns true if the type tag marks this as a polygon.
    #[must_use]
    pub fn is_polygon(&self) -> bool {
        self.kind == Self::POLYGON
    }

    /// Returns true if this is the empty placeholder geometry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() && self.coordinates.is_empty()
    }

    /// Validates the shape required of tile footprints: a polygon with at
    /// least one ring of at least four positions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Geometry`] when the shape does not hold.
    pub fn validate_polygon(&self) -> Result<()> {
        if !self.is_polygon() {
            return Err(Error::Geometry(format!(
                "expected Polygon, got '{}'",
                self.kind
            )));
        }
        if self.coordinates.is_empty() {
            return Err(Error::Geometry("polygon has no rings".to_string()));
        }
        if self.coordinates[0].len() < 4 {
            return Err(Error::Geometry(
                "polygon outer ring has fewer than 4 positions".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the outer ring of a single-ring polygon.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Geometry`] unless the geometry is a polygon with
    /// exactly one ring.
    pub fn single_ring(&self) -> Result<&[Vec<f64>]> {
        if !self.is_polygon() {
            return Err(Error::Geometry(
                "geometry must be of type Polygon".to_string(),
            ));
        }
        if self.coordinates.len() != 1 {
            return Err(Error::Geometry(
                "geometry must have exactly one boundary ring".to_string(),
            ));
        }
        Ok(&self.coordinates[0])
    }

    /// Converts to a planar `geo` polygon, keeping coordinates as-is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Geometry`] when the polygon shape is invalid or a
    /// position has fewer than two components.
    pub fn to_geo_polygon(&self) -> Result<geo_types::Polygon<f64>> {
        self.validate_polygon()?;
        let mut rings = Vec::with_capacity(self.coordinates.len());
        for ring in &self.coordinates {
            let mut coords = Vec::with_capacity(ring.len());
            for position in ring {
                let (&x, &y) = (
                    position.first().ok_or_else(short_position)?,
                    position.get(1).ok_or_else(short_position)?,
                );
                coords.push(geo_types::coord! { x: x, y: y });
            }
            rings.push(geo_types::LineString::new(coords));
        }
        let mut rings = rings.into_iter();
        let exterior = rings.next().ok_or_else(|| {
            Error::Geometry("polygon has no rings".to_string())
        })?;
        Ok(geo_types::Polygon::new(exterior, rings.collect()))
    }

    /// Serializes to a JSON byte vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] on encoding failure.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn short_position() -> Error {
    Error::Geometry("position has fewer than 2 components".to_string())
}

/// Computes the area of a single-ring polygon in acres.
///
/// The ring is projected into the UTM zone of its first vertex so the
/// shoelace area is measured in square meters, then converted to acres.
///
/// # Errors
///
/// Returns [`Error::Geometry`] if the geometry is not a single-ring polygon
/// or a vertex cannot be projected.
pub fn boundary_acres(geometry: &Geometry) -> Result<f64> {
    let ring = geometry.single_ring()?;

    let mut zone = None;
    let mut projected = Vec::with_capacity(ring.len());
    for position in ring {
        let (&lon, &lat) = (
            position.first().ok_or_else(short_position)?,
            position.get(1).ok_or_else(short_position)?,
        );
        let utm = utm_from_geodetic(lat, lon, zone)?;
        zone.get_or_insert(utm.zone);
        projected.push(geo_types::coord! { x: utm.easting, y: utm.northing });
    }

    let polygon = geo_types::Polygon::new(geo_types::LineString::new(projected), vec![]);
    Ok(polygon.unsigned_area() / SQUARE_METERS_PER_ACRE)
}

/// Computes the set of 5-character MGRS grid squares touched by the
/// geometry's vertices.
///
/// Vertices that fail to project (out-of-range latitudes) are skipped, so a
/// partially-degenerate ring still yields the squares of its valid points.
#[must_use]
pub fn mgrs_codes(geometry: &Geometry) -> Vec<String> {
    let mut codes = BTreeSet::new();
    for ring in &geometry.coordinates {
        for position in ring {
            let (Some(&lon), Some(&lat)) = (position.first(), position.get(1)) else {
                continue;
            };
            if let Ok(code) = grid_square(lat, lon) {
                codes.insert(code);
            }
        }
    }
    codes.into_iter().collect()
}
