use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Compensation for one completed order. Written once, never changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub order_id: Uuid,
    pub courier_id: Uuid,
    pub bags_count: i32,
    pub amount: i64,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourierBalance {
    pub courier_id: Uuid,
    pub earned: i64,
    pub withdrawn: i64,
    /// Sum of payout requests still awaiting payment.
    pub reserved: i64,
    pub updated_at: DateTime<Utc>,
}

impl CourierBalance {
    pub fn empty(courier_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            courier_id,
            earned: 0,
            withdrawn: 0,
            reserved: 0,
            updated_at: now,
        }
    }

    pub fn available(&self) -> i64 {
        self.earned - self.withdrawn - self.reserved
    }
}

/// REQUESTED and APPROVED requests hold a reservation on the balance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Requested,
    Approved,
    Rejected,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub courier_id: Uuid,
    pub amount: i64,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
