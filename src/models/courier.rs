use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub zone_id: Uuid,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    pub fn serves(&self, zone_id: Uuid) -> bool {
        self.active && self.zone_id == zone_id
    }
}
