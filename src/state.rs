use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Pricing;
use crate::models::order::{Order, OrderStatus};
use crate::observability::metrics::Metrics;
use crate::payments::PaymentGateway;
use crate::store::Store;
use crate::zones::ZoneRegistry;

/// Published after every committed order mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub courier_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl From<&Order> for OrderEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            courier_id: order.courier_id,
            at: order.updated_at,
        }
    }
}

pub struct AppState {
    pub zones: ZoneRegistry,
    pub store: Store,
    pub pricing: Pricing,
    pub payments: Arc<dyn PaymentGateway>,
    pub order_events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        pricing: Pricing,
        payments: Arc<dyn PaymentGateway>,
        event_buffer_size: usize,
    ) -> Self {
        let (order_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            zones: ZoneRegistry::new(),
            store: Store::new(),
            pricing,
            payments,
            order_events_tx,
            metrics: Metrics::new(),
        }
    }

    pub fn publish(&self, order: &Order) {
        let _ = self.order_events_tx.send(OrderEvent::from(order));
    }
}
