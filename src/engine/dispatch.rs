//! Order lifecycle: who may move an order from which status to which.
//!
//! Every permitted move is a row in [`RULES`]; anything not listed there is
//! refused with `ConflictingState` and the stored order is left as it was.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::ledger;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::ledger::Settlement;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;
use crate::store::{Change, Tables};

/// Who is allowed to fire a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Payment confirmation or refund, relayed by an admin.
    Payments,
    /// An active courier of the order's zone, on an order nobody holds.
    ZoneCourier,
    AssignedCourier,
    AssignedCourierOrAdmin,
    OwnerOrAdmin,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub gate: Gate,
}

#[rustfmt::skip]
pub const RULES: &[Rule] = &[
    Rule { from: OrderStatus::New, to: OrderStatus::Paid, gate: Gate::Payments },
    Rule { from: OrderStatus::New, to: OrderStatus::Assigned, gate: Gate::ZoneCourier },
    Rule { from: OrderStatus::Paid, to: OrderStatus::Assigned, gate: Gate::ZoneCourier },
    Rule { from: OrderStatus::Assigned, to: OrderStatus::PickingUp, gate: Gate::AssignedCourier },
    Rule { from: OrderStatus::PickingUp, to: OrderStatus::Done, gate: Gate::AssignedCourier },
    Rule { from: OrderStatus::New, to: OrderStatus::Canceled, gate: Gate::OwnerOrAdmin },
    Rule { from: OrderStatus::Paid, to: OrderStatus::Canceled, gate: Gate::OwnerOrAdmin },
    Rule { from: OrderStatus::Assigned, to: OrderStatus::Canceled, gate: Gate::AssignedCourierOrAdmin },
    Rule { from: OrderStatus::PickingUp, to: OrderStatus::Canceled, gate: Gate::AssignedCourierOrAdmin },
    Rule { from: OrderStatus::Paid, to: OrderStatus::Refunded, gate: Gate::Payments },
    Rule { from: OrderStatus::Assigned, to: OrderStatus::Refunded, gate: Gate::Payments },
    Rule { from: OrderStatus::PickingUp, to: OrderStatus::Refunded, gate: Gate::Payments },
];

pub fn rule_for(from: OrderStatus, to: OrderStatus) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.from == from && rule.to == to)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transitioned {
    pub order: Order,
    pub settlement: Option<Settlement>,
}

pub fn accept_order(state: &AppState, actor: &Actor, order_id: Uuid) -> Result<Order, AppError> {
    transition(state, actor, order_id, OrderStatus::Assigned).map(|moved| moved.order)
}

/// Moves an order to `target`. Entering DONE writes the settlement and
/// credits the courier in the same transaction as the status change.
pub fn transition(
    state: &AppState,
    actor: &Actor,
    order_id: Uuid,
    target: OrderStatus,
) -> Result<Transitioned, AppError> {
    let rate = state.pricing.courier_rate_per_bag;

    let result = state.store.transact(|tables, changes| {
        let current = tables.order(order_id)?;
        let rule = rule_for(current.status, target).ok_or_else(|| {
            AppError::ConflictingState(format!(
                "order {order_id} cannot move from {} to {target}",
                current.status
            ))
        })?;
        authorize(tables, actor, current, rule)?;

        let now = Utc::now();
        let mut order = current.clone();
        order.status = target;
        order.updated_at = now;
        if target == OrderStatus::Assigned {
            order.courier_id = Some(actor.id);
            order.assigned_at = Some(now);
        }
        if target == OrderStatus::Paid {
            order.paid_at = Some(now);
        }

        let settlement = if target == OrderStatus::Done {
            Some(ledger::settle(tables, changes, &order, rate, now)?)
        } else {
            None
        };

        if !order.courier_reference_consistent() {
            return Err(AppError::Internal(format!(
                "order {order_id} would lose its courier reference"
            )));
        }

        changes.put(Change::Order(order.clone()));
        Ok(Transitioned { order, settlement })
    });

    match &result {
        Ok(moved) => {
            let order = &moved.order;
            state
                .metrics
                .order_transitions_total
                .with_label_values(&[order.status.as_str()])
                .inc();
            if order.status.is_terminal() {
                state.metrics.open_orders.dec();
            }
            if let Some(settlement) = &moved.settlement {
                state.metrics.settlements_total.inc();
                state
                    .metrics
                    .settled_amount_total
                    .inc_by(settlement.amount.unsigned_abs());
                info!(
                    order_id = %order.id,
                    courier_id = %settlement.courier_id,
                    amount = settlement.amount,
                    "order settled"
                );
            }
            state.publish(order);
            info!(
                order_id = %order.id,
                status = %order.status,
                actor_id = %actor.id,
                "order transitioned"
            );
        }
        Err(err) => {
            warn!(
                order_id = %order_id,
                target = %target,
                actor_id = %actor.id,
                error = %err,
                "order transition refused"
            );
        }
    }

    result
}

fn authorize(tables: &Tables, actor: &Actor, order: &Order, rule: &Rule) -> Result<(), AppError> {
    let permitted = match rule.gate {
        Gate::Payments => {
            if actor.is_admin() && rule.to == OrderStatus::Refunded && order.paid_at.is_none() {
                return Err(AppError::ConflictingState(format!(
                    "order {} was never paid and cannot be refunded",
                    order.id
                )));
            }
            actor.is_admin()
        }
        Gate::ZoneCourier => {
            if actor.role != Role::Courier {
                false
            } else {
                let courier = tables.courier(actor.id)?;
                if order.courier_id.is_some() {
                    return Err(AppError::ConflictingState(format!(
                        "order {} is already assigned",
                        order.id
                    )));
                }
                if !courier.serves(order.zone_id) {
                    return Err(AppError::ConflictingState(format!(
                        "courier {} is inactive or outside zone {}",
                        courier.id, order.zone_id
                    )));
                }
                true
            }
        }
        Gate::AssignedCourier => actor.role == Role::Courier && order.is_assigned_to(actor.id),
        Gate::AssignedCourierOrAdmin => {
            actor.is_admin() || (actor.role == Role::Courier && order.is_assigned_to(actor.id))
        }
        Gate::OwnerOrAdmin => {
            actor.is_admin() || (actor.role == Role::Customer && order.customer_id == actor.id)
        }
    };

    if permitted {
        Ok(())
    } else {
        Err(AppError::ConflictingState(format!(
            "{:?} {} may not move order {} from {}",
            actor.role, actor.id, order.id, order.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::engine::allowance::{self, AllowanceOrder, PlanTerms};
    use crate::engine::couriers::{self, CourierUpdate, NewCourier};
    use crate::engine::intake::{self, NewOrder};
    use crate::engine::testing::{self, admin, customer};
    use crate::models::courier::Courier;
    use crate::models::order::Timing;

    fn setup() -> (AppState, Courier, Order) {
        let state = testing::state();
        let zone = testing::seed_zone(&state);
        let courier = testing::seed_courier(&state, &zone);
        let address = testing::seed_address(&state);
        let placed = intake::create_order(
            &state,
            &customer(),
            NewOrder {
                address_id: address.id,
                bags_count: 3,
                timing: Timing::Asap,
                comment: String::new(),
            },
        )
        .unwrap();
        (state, courier, placed.order)
    }

    fn stored(state: &AppState, id: Uuid) -> String {
        let order = state.store.read(|t| t.orders[&id].clone()).unwrap();
        serde_json::to_string(&order).unwrap()
    }

    #[test]
    fn every_rule_targets_a_non_initial_status_from_a_non_terminal_one() {
        for rule in RULES {
            assert!(!rule.from.is_terminal());
            assert_ne!(rule.to, OrderStatus::New);
        }
        assert!(rule_for(OrderStatus::Done, OrderStatus::Canceled).is_none());
        assert!(rule_for(OrderStatus::New, OrderStatus::Done).is_none());
    }

    #[test]
    fn full_lifecycle_settles_the_courier() {
        let (state, courier, order) = setup();
        let actor = Actor::courier(courier.id);

        let accepted = accept_order(&state, &actor, order.id).unwrap();
        assert_eq!(accepted.status, OrderStatus::Assigned);
        assert_eq!(accepted.courier_id, Some(courier.id));

        transition(&state, &actor, order.id, OrderStatus::PickingUp).unwrap();
        let done = transition(&state, &actor, order.id, OrderStatus::Done).unwrap();

        assert_eq!(done.order.status, OrderStatus::Done);
        assert_eq!(done.settlement.as_ref().map(|s| s.amount), Some(600));

        let balance = ledger::balance(&state, courier.id).unwrap();
        assert_eq!(balance.earned, 600);
        assert_eq!(balance.withdrawn, 0);
        assert_eq!(balance.available(), 600);
    }

    #[test]
    fn earned_matches_the_sum_of_settlements() {
        let (state, courier, first) = setup();
        let actor = Actor::courier(courier.id);
        let address_id = first.address_id;

        let mut order_ids = vec![first.id];
        for bags_count in [1, 4] {
            let placed = intake::create_order(
                &state,
                &customer(),
                NewOrder {
                    address_id,
                    bags_count,
                    timing: Timing::Asap,
                    comment: String::new(),
                },
            )
            .unwrap();
            order_ids.push(placed.order.id);
        }

        for id in &order_ids {
            accept_order(&state, &actor, *id).unwrap();
            transition(&state, &actor, *id, OrderStatus::PickingUp).unwrap();
            transition(&state, &actor, *id, OrderStatus::Done).unwrap();
        }

        let settlements = ledger::settlements(&state, courier.id).unwrap();
        assert_eq!(settlements.len(), order_ids.len());
        for id in &order_ids {
            assert_eq!(settlements.iter().filter(|s| s.order_id == *id).count(), 1);
        }
        let total: i64 = settlements.iter().map(|s| s.amount).sum();
        assert_eq!(total, (3 + 1 + 4) * 200);
        assert_eq!(ledger::balance(&state, courier.id).unwrap().earned, total);
    }

    #[test]
    fn courier_reference_tracks_status_after_every_step() {
        let (state, courier, order) = setup();
        let actor = Actor::courier(courier.id);
        let check = |state: &AppState| {
            let order = state.store.read(|t| t.orders[&order.id].clone()).unwrap();
            assert!(order.courier_reference_consistent(), "{order:?}");
        };

        check(&state);
        accept_order(&state, &actor, order.id).unwrap();
        check(&state);
        transition(&state, &actor, order.id, OrderStatus::PickingUp).unwrap();
        check(&state);
        transition(&state, &actor, order.id, OrderStatus::Done).unwrap();
        check(&state);
    }

    #[test]
    fn second_accept_is_refused_without_touching_the_order() {
        let (state, courier, order) = setup();
        let zone_id = courier.zone_id;
        let rival = couriers::create_courier(
            &state,
            &admin(),
            NewCourier {
                name: "Rival".to_string(),
                phone: "+77070000009".to_string(),
                zone_id,
            },
        )
        .unwrap();

        accept_order(&state, &Actor::courier(courier.id), order.id).unwrap();
        let before = stored(&state, order.id);

        let err = accept_order(&state, &Actor::courier(rival.id), order.id).unwrap_err();

        assert!(matches!(err, AppError::ConflictingState(_)));
        assert_eq!(stored(&state, order.id), before);
    }

    #[test]
    fn inactive_courier_cannot_accept() {
        let (state, courier, order) = setup();
        couriers::update_courier(
            &state,
            &admin(),
            courier.id,
            CourierUpdate {
                zone_id: None,
                active: Some(false),
            },
        )
        .unwrap();
        let before = stored(&state, order.id);

        let err = accept_order(&state, &Actor::courier(courier.id), order.id).unwrap_err();

        assert!(matches!(err, AppError::ConflictingState(_)));
        assert_eq!(stored(&state, order.id), before);
    }

    #[test]
    fn courier_from_another_zone_cannot_accept() {
        let (state, _courier, order) = setup();
        let elsewhere = state
            .zones
            .create(
                "Elsewhere",
                "Almaty",
                serde_json::json!({
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]
                }),
            )
            .unwrap();
        let outsider = testing::seed_courier(&state, &elsewhere);

        let err = accept_order(&state, &Actor::courier(outsider.id), order.id).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));
    }

    #[test]
    fn only_the_assigned_courier_advances_the_order() {
        let (state, courier, order) = setup();
        let other = testing::seed_courier(&state, &state.zones.get(courier.zone_id).unwrap());
        accept_order(&state, &Actor::courier(courier.id), order.id).unwrap();
        let before = stored(&state, order.id);

        let err = transition(&state, &Actor::courier(other.id), order.id, OrderStatus::PickingUp)
            .unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));

        let err = transition(&state, &admin(), order.id, OrderStatus::PickingUp).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));
        assert_eq!(stored(&state, order.id), before);
    }

    #[test]
    fn skipping_pick_up_is_refused() {
        let (state, courier, order) = setup();
        let actor = Actor::courier(courier.id);
        accept_order(&state, &actor, order.id).unwrap();

        let err = transition(&state, &actor, order.id, OrderStatus::Done).unwrap_err();

        assert!(matches!(err, AppError::ConflictingState(_)));
        assert!(state.store.read(|t| t.settlements.is_empty()).unwrap());
    }

    #[test]
    fn cancel_after_assignment_keeps_courier_and_ledger_untouched() {
        let (state, courier, order) = setup();
        let actor = Actor::courier(courier.id);
        accept_order(&state, &actor, order.id).unwrap();
        transition(&state, &actor, order.id, OrderStatus::PickingUp).unwrap();

        let canceled = transition(&state, &actor, order.id, OrderStatus::Canceled).unwrap();

        assert_eq!(canceled.order.status, OrderStatus::Canceled);
        assert_eq!(canceled.order.courier_id, Some(courier.id));
        assert!(canceled.settlement.is_none());
        assert_eq!(ledger::balance(&state, courier.id).unwrap().earned, 0);

        let err = transition(&state, &actor, order.id, OrderStatus::PickingUp).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));
    }

    #[test]
    fn owner_cancels_before_assignment_but_strangers_cannot() {
        let (state, _courier, order) = setup();

        let stranger = Actor::customer(Uuid::from_u128(0xbad));
        let err = transition(&state, &stranger, order.id, OrderStatus::Canceled).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));

        let canceled = transition(&state, &customer(), order.id, OrderStatus::Canceled).unwrap();
        assert_eq!(canceled.order.status, OrderStatus::Canceled);
        assert!(canceled.order.courier_id.is_none());
    }

    #[test]
    fn payment_confirmation_and_refund_need_admin() {
        let (state, _courier, order) = setup();

        let err = transition(&state, &customer(), order.id, OrderStatus::Paid).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));

        transition(&state, &admin(), order.id, OrderStatus::Paid).unwrap();
        let refunded = transition(&state, &admin(), order.id, OrderStatus::Refunded).unwrap();
        assert_eq!(refunded.order.status, OrderStatus::Refunded);
    }

    #[test]
    fn paid_order_records_payment_time_and_refunds_after_pick_up() {
        let (state, courier, order) = setup();
        let actor = Actor::courier(courier.id);

        let paid = transition(&state, &admin(), order.id, OrderStatus::Paid).unwrap();
        assert!(paid.order.paid_at.is_some());
        accept_order(&state, &actor, order.id).unwrap();
        transition(&state, &actor, order.id, OrderStatus::PickingUp).unwrap();

        let refunded = transition(&state, &admin(), order.id, OrderStatus::Refunded).unwrap();
        assert_eq!(refunded.order.status, OrderStatus::Refunded);
        assert_eq!(refunded.order.courier_id, Some(courier.id));
        assert!(refunded.settlement.is_none());
    }

    #[test]
    fn paid_order_refunds_while_assigned() {
        let (state, courier, order) = setup();
        transition(&state, &admin(), order.id, OrderStatus::Paid).unwrap();
        accept_order(&state, &Actor::courier(courier.id), order.id).unwrap();

        let refunded = transition(&state, &admin(), order.id, OrderStatus::Refunded).unwrap();
        assert_eq!(refunded.order.status, OrderStatus::Refunded);
    }

    #[test]
    fn unpaid_order_accepted_from_new_cannot_be_refunded() {
        let (state, courier, order) = setup();
        let actor = Actor::courier(courier.id);
        accept_order(&state, &actor, order.id).unwrap();
        let before = stored(&state, order.id);

        let err = transition(&state, &admin(), order.id, OrderStatus::Refunded).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));
        assert_eq!(stored(&state, order.id), before);

        transition(&state, &actor, order.id, OrderStatus::PickingUp).unwrap();
        let err = transition(&state, &admin(), order.id, OrderStatus::Refunded).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));
    }

    #[test]
    fn allowance_order_cannot_be_refunded() {
        let (state, courier, order) = setup();
        allowance::create_subscription(
            &state,
            &customer(),
            PlanTerms {
                total_bags: 7,
                price: 0,
                expires_at: None,
            },
        )
        .unwrap();
        let drawn = allowance::consume(
            &state,
            &customer(),
            AllowanceOrder {
                address_id: order.address_id,
                bags_count: 2,
                timing: Timing::Asap,
                comment: String::new(),
            },
        )
        .unwrap();
        assert_eq!(drawn.price, 0);
        accept_order(&state, &Actor::courier(courier.id), drawn.id).unwrap();

        let err = transition(&state, &admin(), drawn.id, OrderStatus::Refunded).unwrap_err();

        assert!(matches!(err, AppError::ConflictingState(_)));
        assert_eq!(
            state.store.read(|t| t.orders[&drawn.id].status).unwrap(),
            OrderStatus::Assigned
        );
    }

    #[test]
    fn admin_cancels_assigned_and_picking_up_orders() {
        let (state, courier, first) = setup();
        let actor = Actor::courier(courier.id);
        let second = intake::create_order(
            &state,
            &customer(),
            NewOrder {
                address_id: first.address_id,
                bags_count: 1,
                timing: Timing::Asap,
                comment: String::new(),
            },
        )
        .unwrap()
        .order;

        accept_order(&state, &actor, first.id).unwrap();
        let canceled = transition(&state, &admin(), first.id, OrderStatus::Canceled).unwrap();
        assert_eq!(canceled.order.status, OrderStatus::Canceled);
        assert_eq!(canceled.order.courier_id, Some(courier.id));

        accept_order(&state, &actor, second.id).unwrap();
        transition(&state, &actor, second.id, OrderStatus::PickingUp).unwrap();
        let canceled = transition(&state, &admin(), second.id, OrderStatus::Canceled).unwrap();
        assert_eq!(canceled.order.status, OrderStatus::Canceled);

        assert_eq!(ledger::balance(&state, courier.id).unwrap().earned, 0);
    }

    #[test]
    fn customer_cannot_cancel_once_assigned() {
        let (state, courier, order) = setup();
        accept_order(&state, &Actor::courier(courier.id), order.id).unwrap();

        let err = transition(&state, &customer(), order.id, OrderStatus::Canceled).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));
    }

    #[test]
    fn unknown_order_is_not_found() {
        let (state, courier, _order) = setup();
        let err = accept_order(&state, &Actor::courier(courier.id), Uuid::from_u128(42)).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn concurrent_accepts_have_a_single_winner() {
        let (state, courier, order) = setup();
        let zone = state.zones.get(courier.zone_id).unwrap();
        let mut contenders = vec![courier];
        for _ in 0..7 {
            contenders.push(testing::seed_courier(&state, &zone));
        }
        let state = Arc::new(state);

        let handles: Vec<_> = contenders
            .iter()
            .map(|courier| {
                let state = state.clone();
                let actor = Actor::courier(courier.id);
                let order_id = order.id;
                thread::spawn(move || accept_order(&state, &actor, order_id).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
    }
}
