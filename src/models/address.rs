use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub label: Option<String>,
    pub location: GeoPoint,
    pub city: String,
    pub street: String,
    pub house: String,
    pub entrance: String,
    pub floor: String,
    pub apartment: String,
    pub intercom: Option<String>,
    pub is_default: bool,
    /// Zone resolved when the address was created. Never re-evaluated.
    pub zone_id: Option<Uuid>,
    pub zone_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
