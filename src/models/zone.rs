use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::geo::{boundary_contains, GeoPoint};

/// A geofenced service area. The boundary is kept as the GeoJSON geometry it
/// was created from; only `active` changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub boundary: Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Zone {
    pub fn contains(&self, point: GeoPoint) -> bool {
        boundary_contains(&self.boundary, point)
    }
}
