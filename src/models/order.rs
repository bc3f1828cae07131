use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Paid,
    Assigned,
    PickingUp,
    Done,
    Canceled,
    Refunded,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Done | OrderStatus::Canceled | OrderStatus::Refunded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Paid => "PAID",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::PickingUp => "PICKING_UP",
            OrderStatus::Done => "DONE",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    OneTime,
    Subscription,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "option", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Timing {
    #[default]
    Asap,
    Scheduled {
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub zone_id: Uuid,
    pub kind: OrderType,
    pub subscription_id: Option<Uuid>,
    pub bags_count: i32,
    pub price: i64,
    pub comment: String,
    pub timing: Timing,
    pub courier_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    /// Set when payment is confirmed; only paid orders can be refunded.
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_assigned_to(&self, courier_id: Uuid) -> bool {
        self.courier_id == Some(courier_id)
    }

    /// A courier is attached exactly from acceptance onwards; canceled and
    /// refunded orders keep whoever had accepted them.
    pub fn courier_reference_consistent(&self) -> bool {
        if self.courier_id.is_some() != self.assigned_at.is_some() {
            return false;
        }

        match self.status {
            OrderStatus::New | OrderStatus::Paid => self.courier_id.is_none(),
            OrderStatus::Assigned | OrderStatus::PickingUp | OrderStatus::Done => {
                self.courier_id.is_some()
            }
            OrderStatus::Canceled | OrderStatus::Refunded => true,
        }
    }
}
