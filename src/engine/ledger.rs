//! Courier compensation: settlements for completed orders, running balances
//! and payout requests.
//!
//! Every payout request reserves its amount until it is rejected or paid, so
//! `earned - withdrawn - reserved` never drops below zero no matter how many
//! requests race.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::require_role;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::ledger::{CourierBalance, PayoutRequest, PayoutStatus, Settlement};
use crate::models::order::Order;
use crate::state::AppState;
use crate::store::{Change, Changeset, Tables};

pub fn settlement_amount(bags_count: i32, rate_per_bag: i64) -> Result<i64, AppError> {
    i64::from(bags_count)
        .checked_mul(rate_per_bag)
        .ok_or_else(|| AppError::Internal("settlement amount overflow".to_string()))
}

/// Stages the settlement and balance credit for an order entering DONE.
/// Runs inside the same transaction as the status change.
pub(crate) fn settle(
    tables: &Tables,
    changes: &mut Changeset,
    order: &Order,
    rate_per_bag: i64,
    now: DateTime<Utc>,
) -> Result<Settlement, AppError> {
    let courier_id = order.courier_id.ok_or_else(|| {
        AppError::ConflictingState(format!("order {} has no courier to settle", order.id))
    })?;
    if tables.settlements.contains_key(&order.id) {
        return Err(AppError::ConflictingState(format!(
            "order {} is already settled",
            order.id
        )));
    }

    let amount = settlement_amount(order.bags_count, rate_per_bag)?;
    let mut balance = tables
        .balances
        .get(&courier_id)
        .cloned()
        .unwrap_or_else(|| CourierBalance::empty(courier_id, now));
    balance.earned = balance
        .earned
        .checked_add(amount)
        .ok_or_else(|| AppError::Internal("balance overflow".to_string()))?;
    balance.updated_at = now;

    let settlement = Settlement {
        order_id: order.id,
        courier_id,
        bags_count: order.bags_count,
        amount,
        settled_at: now,
    };

    changes.put(Change::Settlement(settlement.clone()));
    changes.put(Change::Balance(balance));
    Ok(settlement)
}

pub fn balance(state: &AppState, courier_id: Uuid) -> Result<CourierBalance, AppError> {
    state.store.read(|tables| {
        tables
            .balances
            .get(&courier_id)
            .cloned()
            .unwrap_or_else(|| CourierBalance::empty(courier_id, Utc::now()))
    })
}

pub fn settlements(state: &AppState, courier_id: Uuid) -> Result<Vec<Settlement>, AppError> {
    state.store.read(|tables| {
        let mut settlements: Vec<Settlement> = tables
            .settlements
            .values()
            .filter(|settlement| settlement.courier_id == courier_id)
            .cloned()
            .collect();
        settlements.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        settlements
    })
}

pub fn payouts(state: &AppState, courier_id: Option<Uuid>) -> Result<Vec<PayoutRequest>, AppError> {
    state.store.read(|tables| {
        let mut payouts: Vec<PayoutRequest> = tables
            .payouts
            .values()
            .filter(|payout| courier_id.is_none_or(|id| payout.courier_id == id))
            .cloned()
            .collect();
        payouts.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        payouts
    })
}

pub fn request_payout(
    state: &AppState,
    actor: &Actor,
    amount: i64,
) -> Result<PayoutRequest, AppError> {
    require_role(actor, Role::Courier, "requesting a payout")?;
    if amount <= 0 {
        return Err(AppError::ValidationFailed("amount must be > 0".to_string()));
    }

    let result = state.store.transact(|tables, changes| {
        tables.courier(actor.id)?;
        let now = Utc::now();
        let mut balance = tables
            .balances
            .get(&actor.id)
            .cloned()
            .unwrap_or_else(|| CourierBalance::empty(actor.id, now));

        let available = balance.available();
        if amount > available {
            return Err(AppError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        balance.reserved += amount;
        balance.updated_at = now;

        let payout = PayoutRequest {
            id: Uuid::new_v4(),
            courier_id: actor.id,
            amount,
            status: PayoutStatus::Requested,
            requested_at: now,
            processed_at: None,
        };

        changes.put(Change::Balance(balance));
        changes.put(Change::Payout(payout.clone()));
        Ok(payout)
    });

    match &result {
        Ok(payout) => {
            state
                .metrics
                .payout_requests_total
                .with_label_values(&["requested"])
                .inc();
            info!(payout_id = %payout.id, courier_id = %actor.id, amount, "payout requested");
        }
        Err(err) => {
            state
                .metrics
                .payout_requests_total
                .with_label_values(&["refused"])
                .inc();
            warn!(courier_id = %actor.id, amount, error = %err, "payout request refused");
        }
    }

    result
}

pub fn approve_payout(
    state: &AppState,
    actor: &Actor,
    payout_id: Uuid,
) -> Result<PayoutRequest, AppError> {
    process_payout(state, actor, payout_id, PayoutStatus::Approved)
}

/// Releases the reservation; the balance is otherwise untouched.
pub fn reject_payout(
    state: &AppState,
    actor: &Actor,
    payout_id: Uuid,
) -> Result<PayoutRequest, AppError> {
    process_payout(state, actor, payout_id, PayoutStatus::Rejected)
}

/// The only step that moves money into `withdrawn`.
pub fn mark_payout_paid(
    state: &AppState,
    actor: &Actor,
    payout_id: Uuid,
) -> Result<PayoutRequest, AppError> {
    process_payout(state, actor, payout_id, PayoutStatus::Paid)
}

fn process_payout(
    state: &AppState,
    actor: &Actor,
    payout_id: Uuid,
    target: PayoutStatus,
) -> Result<PayoutRequest, AppError> {
    require_role(actor, Role::Admin, "processing payouts")?;

    let payout = state.store.transact(|tables, changes| {
        let mut payout = tables.payout(payout_id)?.clone();
        let allowed = matches!(
            (payout.status, target),
            (PayoutStatus::Requested, PayoutStatus::Approved)
                | (PayoutStatus::Requested, PayoutStatus::Rejected)
                | (PayoutStatus::Approved, PayoutStatus::Rejected)
                | (PayoutStatus::Approved, PayoutStatus::Paid)
        );
        if !allowed {
            return Err(AppError::ConflictingState(format!(
                "payout {payout_id} cannot move from {:?} to {:?}",
                payout.status, target
            )));
        }

        let now = Utc::now();
        if target != PayoutStatus::Approved {
            let mut balance = tables
                .balances
                .get(&payout.courier_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "open payout {payout_id} has no balance row"
                    ))
                })?;
            if balance.reserved < payout.amount {
                return Err(AppError::Internal(format!(
                    "reservation for payout {payout_id} is missing"
                )));
            }

            balance.reserved -= payout.amount;
            if target == PayoutStatus::Paid {
                balance.withdrawn += payout.amount;
            }
            balance.updated_at = now;
            changes.put(Change::Balance(balance));
        }

        payout.status = target;
        payout.processed_at = Some(now);
        changes.put(Change::Payout(payout.clone()));
        Ok(payout)
    })?;

    let outcome = match target {
        PayoutStatus::Approved => "approved",
        PayoutStatus::Rejected => "rejected",
        PayoutStatus::Paid => "paid",
        PayoutStatus::Requested => "requested",
    };
    state
        .metrics
        .payout_requests_total
        .with_label_values(&[outcome])
        .inc();
    info!(
        payout_id = %payout.id,
        courier_id = %payout.courier_id,
        amount = payout.amount,
        status = ?payout.status,
        "payout processed"
    );

    Ok(payout)
}
