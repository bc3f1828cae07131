//! In-memory persistence with all-or-nothing transactions.
//!
//! An operation reads the committed [`Tables`] and stages its writes in a
//! [`Changeset`]. The changeset is applied under the same lock only when the
//! operation returns `Ok`, so a failed operation leaves every row untouched
//! and two operations on the same rows can never interleave.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::AppError;
use crate::models::address::Address;
use crate::models::courier::Courier;
use crate::models::ledger::{CourierBalance, PayoutRequest, Settlement};
use crate::models::order::Order;
use crate::models::subscription::Subscription;

#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub couriers: HashMap<Uuid, Courier>,
    pub addresses: HashMap<Uuid, Address>,
    pub orders: HashMap<Uuid, Order>,
    pub subscriptions: HashMap<Uuid, Subscription>,
    /// Keyed by order id.
    pub settlements: HashMap<Uuid, Settlement>,
    /// Keyed by courier id.
    pub balances: HashMap<Uuid, CourierBalance>,
    pub payouts: HashMap<Uuid, PayoutRequest>,
}

impl Tables {
    pub fn order(&self, id: Uuid) -> Result<&Order, AppError> {
        self.orders
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    pub fn courier(&self, id: Uuid) -> Result<&Courier, AppError> {
        self.couriers
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))
    }

    pub fn address(&self, id: Uuid) -> Result<&Address, AppError> {
        self.addresses
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("address {id} not found")))
    }

    pub fn subscription(&self, id: Uuid) -> Result<&Subscription, AppError> {
        self.subscriptions
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("subscription {id} not found")))
    }

    pub fn payout(&self, id: Uuid) -> Result<&PayoutRequest, AppError> {
        self.payouts
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("payout request {id} not found")))
    }
}

#[derive(Debug, Clone)]
pub enum Change {
    Courier(Courier),
    Address(Address),
    Order(Order),
    Subscription(Subscription),
    Settlement(Settlement),
    Balance(CourierBalance),
    Payout(PayoutRequest),
}

#[derive(Debug, Default)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    pub fn put(&mut self, change: Change) {
        self.changes.push(change);
    }

    fn apply(self, tables: &mut Tables) {
        for change in self.changes {
            match change {
                Change::Courier(courier) => {
                    tables.couriers.insert(courier.id, courier);
                }
                Change::Address(address) => {
                    tables.addresses.insert(address.id, address);
                }
                Change::Order(order) => {
                    tables.orders.insert(order.id, order);
                }
                Change::Subscription(subscription) => {
                    tables.subscriptions.insert(subscription.id, subscription);
                }
                Change::Settlement(settlement) => {
                    tables.settlements.insert(settlement.order_id, settlement);
                }
                Change::Balance(balance) => {
                    tables.balances.insert(balance.courier_id, balance);
                }
                Change::Payout(payout) => {
                    tables.payouts.insert(payout.id, payout);
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Store {
    tables: Mutex<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `op` against a consistent view and commits its staged writes only
    /// if it succeeds.
    pub fn transact<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&Tables, &mut Changeset) -> Result<T, AppError>,
    {
        let mut tables = self.lock()?;
        let mut changeset = Changeset::default();
        let value = op(&tables, &mut changeset)?;
        changeset.apply(&mut tables);
        Ok(value)
    }

    pub fn read<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&Tables) -> T,
    {
        let tables = self.lock()?;
        Ok(op(&tables))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn courier(id: Uuid) -> Courier {
        Courier {
            id,
            name: "Aigerim".to_string(),
            phone: "+77070000002".to_string(),
            zone_id: Uuid::from_u128(7),
            active: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn successful_transaction_commits_staged_writes() {
        let store = Store::new();
        let id = Uuid::from_u128(1);

        store
            .transact(|_, changes| {
                changes.put(Change::Courier(courier(id)));
                Ok(())
            })
            .unwrap();

        assert!(store.read(|t| t.couriers.contains_key(&id)).unwrap());
    }

    #[test]
    fn failed_transaction_discards_staged_writes() {
        let store = Store::new();
        let id = Uuid::from_u128(1);

        let result: Result<(), AppError> = store.transact(|_, changes| {
            changes.put(Change::Courier(courier(id)));
            Err(AppError::ConflictingState("abort".to_string()))
        });

        assert!(result.is_err());
        assert!(store.read(|t| t.couriers.is_empty()).unwrap());
    }

    #[test]
    fn later_changes_to_the_same_row_win() {
        let store = Store::new();
        let id = Uuid::from_u128(1);

        store
            .transact(|_, changes| {
                changes.put(Change::Courier(courier(id)));
                let mut inactive = courier(id);
                inactive.active = false;
                changes.put(Change::Courier(inactive));
                Ok(())
            })
            .unwrap();

        assert!(!store.read(|t| t.couriers[&id].active).unwrap());
    }
}
