use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::require_role;
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::courier::Courier;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;
use crate::store::Change;

#[derive(Debug, Clone, Deserialize)]
pub struct NewCourier {
    pub name: String,
    pub phone: String,
    pub zone_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourierUpdate {
    pub zone_id: Option<Uuid>,
    pub active: Option<bool>,
}

pub fn create_courier(
    state: &AppState,
    actor: &Actor,
    payload: NewCourier,
) -> Result<Courier, AppError> {
    require_role(actor, Role::Admin, "creating couriers")?;

    if payload.name.trim().is_empty() {
        return Err(AppError::ValidationFailed("name cannot be empty".to_string()));
    }
    if payload.phone.trim().is_empty() {
        return Err(AppError::ValidationFailed("phone cannot be empty".to_string()));
    }
    if state.zones.get(payload.zone_id).is_none() {
        return Err(AppError::NotFound(format!("zone {} not found", payload.zone_id)));
    }

    let courier = Courier {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        phone: payload.phone.trim().to_string(),
        zone_id: payload.zone_id,
        active: true,
        updated_at: Utc::now(),
    };

    state.store.transact(|_, changes| {
        changes.put(Change::Courier(courier.clone()));
        Ok(())
    })?;

    info!(courier_id = %courier.id, zone_id = %courier.zone_id, "courier created");
    Ok(courier)
}

/// Moving a courier to another zone does not touch orders they already
/// hold.
pub fn update_courier(
    state: &AppState,
    actor: &Actor,
    courier_id: Uuid,
    update: CourierUpdate,
) -> Result<Courier, AppError> {
    require_role(actor, Role::Admin, "updating couriers")?;

    if let Some(zone_id) = update.zone_id {
        if state.zones.get(zone_id).is_none() {
            return Err(AppError::NotFound(format!("zone {zone_id} not found")));
        }
    }

    let courier = state.store.transact(|tables, changes| {
        let mut courier = tables.courier(courier_id)?.clone();
        if let Some(zone_id) = update.zone_id {
            courier.zone_id = zone_id;
        }
        if let Some(active) = update.active {
            courier.active = active;
        }
        courier.updated_at = Utc::now();

        changes.put(Change::Courier(courier.clone()));
        Ok(courier)
    })?;

    info!(
        courier_id = %courier.id,
        zone_id = %courier.zone_id,
        active = courier.active,
        "courier updated"
    );
    Ok(courier)
}

pub fn list_couriers(state: &AppState, actor: &Actor) -> Result<Vec<Courier>, AppError> {
    require_role(actor, Role::Admin, "listing couriers")?;

    state.store.read(|tables| {
        let mut couriers: Vec<Courier> = tables.couriers.values().cloned().collect();
        couriers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        couriers
    })
}

pub fn profile(state: &AppState, actor: &Actor) -> Result<Courier, AppError> {
    require_role(actor, Role::Courier, "reading a courier profile")?;
    state
        .store
        .read(|tables| tables.courier(actor.id).cloned())?
}

/// Unclaimed orders of the courier's zone followed by the courier's own
/// orders, optionally narrowed to one status.
pub fn visible_orders(
    state: &AppState,
    actor: &Actor,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>, AppError> {
    require_role(actor, Role::Courier, "listing courier orders")?;

    state.store.read(|tables| {
        let courier = tables.courier(actor.id)?;

        let mut open: Vec<Order> = Vec::new();
        let mut own: Vec<Order> = Vec::new();
        for order in tables.orders.values() {
            if status.is_some_and(|wanted| order.status != wanted) {
                continue;
            }

            if order.is_assigned_to(courier.id) {
                own.push(order.clone());
            } else if courier.active
                && order.courier_id.is_none()
                && order.zone_id == courier.zone_id
                && matches!(order.status, OrderStatus::New | OrderStatus::Paid)
            {
                open.push(order.clone());
            }
        }

        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        own.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        open.extend(own);
        Ok::<_, AppError>(open)
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dispatch;
    use crate::engine::intake::{self, NewOrder};
    use crate::engine::testing::{self, admin, customer};
    use crate::models::order::Timing;

    #[test]
    fn creating_a_courier_needs_admin_and_a_known_zone() {
        let state = testing::state();
        let zone = testing::seed_zone(&state);
        let payload = NewCourier {
            name: "Asel".to_string(),
            phone: "+77070000004".to_string(),
            zone_id: zone.id,
        };

        let err = create_courier(&state, &customer(), payload.clone()).unwrap_err();
        assert!(matches!(err, AppError::ConflictingState(_)));

        let err = create_courier(
            &state,
            &admin(),
            NewCourier {
                zone_id: Uuid::from_u128(99),
                ..payload.clone()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let courier = create_courier(&state, &admin(), payload).unwrap();
        assert!(courier.active);
        assert_eq!(profile(&state, &Actor::courier(courier.id)).unwrap(), courier);
    }

    #[test]
    fn courier_sees_open_zone_orders_and_own_orders() {
        let state = testing::state();
        let zone = testing::seed_zone(&state);
        let courier = testing::seed_courier(&state, &zone);
        let address = testing::seed_address(&state);
        let actor = Actor::courier(courier.id);

        let mut ids = Vec::new();
        for _ in 0..2 {
            let placed = intake::create_order(
                &state,
                &customer(),
                NewOrder {
                    address_id: address.id,
                    bags_count: 1,
                    timing: Timing::Asap,
                    comment: String::new(),
                },
            )
            .unwrap();
            ids.push(placed.order.id);
        }
        dispatch::accept_order(&state, &actor, ids[0]).unwrap();

        let all = visible_orders(&state, &actor, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, ids[1]);
        assert_eq!(all[1].id, ids[0]);

        let assigned = visible_orders(&state, &actor, Some(OrderStatus::Assigned)).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, ids[0]);

        update_courier(
            &state,
            &admin(),
            courier.id,
            CourierUpdate {
                zone_id: None,
                active: Some(false),
            },
        )
        .unwrap();
        let while_inactive = visible_orders(&state, &actor, None).unwrap();
        assert_eq!(while_inactive.len(), 1);
    }
}
