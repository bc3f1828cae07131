//! Geofence containment over GeoJSON boundaries.
//!
//! Containment uses the even-odd ray-casting rule. A point lying exactly on
//! an edge has no defined result: it may land on either side.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A longitude/latitude pair, in that order, as in GeoJSON positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// A GeoJSON position. Elements past longitude and latitude, such as an
/// altitude, are accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Position(pub [f64; 2]);

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values[..] {
            [lng, lat, ..] => Ok(Position([lng, lat])),
            _ => Err(format!(
                "position needs longitude and latitude, got {} values",
                values.len()
            )),
        }
    }
}

impl From<Position> for [f64; 2] {
    fn from(position: Position) -> Self {
        position.0
    }
}

pub type Ring = Vec<Position>;
/// Outer ring followed by any hole rings.
pub type Polygon = Vec<Ring>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Boundary {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Boundary {
    /// Parses a GeoJSON geometry object. Anything other than a well-formed
    /// `Polygon` or `MultiPolygon` yields `None`.
    pub fn from_geojson(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        match self {
            Boundary::Polygon(polygon) => polygon_contains(polygon, point),
            Boundary::MultiPolygon(polygons) => polygons
                .iter()
                .any(|polygon| polygon_contains(polygon, point)),
        }
    }
}

/// Tests a raw GeoJSON boundary. Malformed input is never an error here; it
/// simply contains nothing.
pub fn boundary_contains(geojson: &Value, point: GeoPoint) -> bool {
    Boundary::from_geojson(geojson)
        .map(|boundary| boundary.contains(point))
        .unwrap_or(false)
}

/// Every ring flips the result, so hole rings carve their interior out of
/// the outer ring.
pub fn polygon_contains(polygon: &[Ring], point: GeoPoint) -> bool {
    polygon
        .iter()
        .fold(false, |inside, ring| inside ^ ring_contains(ring, point))
}

pub fn ring_contains(ring: &[Position], point: GeoPoint) -> bool {
    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let Some(mut prev) = ring.last() else {
        return false;
    };

    for current in ring {
        let [xi, yi] = current.0;
        let [xj, yj] = prev.0;

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        prev = current;
    }

    inside
}
