//! Customer-facing intake: addresses, quotes and one-time orders.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::engine::{require_role, validate_bags, validate_timing};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::actor::{Actor, Role};
use crate::models::address::Address;
use crate::models::order::{Order, OrderStatus, OrderType, Timing};
use crate::payments::PaymentIntent;
use crate::state::AppState;
use crate::store::{Change, Tables};

#[derive(Debug, Clone, Deserialize)]
pub struct NewAddress {
    pub label: Option<String>,
    pub location: GeoPoint,
    pub city: String,
    pub street: String,
    pub house: String,
    #[serde(default)]
    pub entrance: String,
    #[serde(default)]
    pub floor: String,
    #[serde(default)]
    pub apartment: String,
    pub intercom: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub address_id: Uuid,
    pub bags_count: i32,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Quote {
    pub price: i64,
    pub can_serve: bool,
    pub zone_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlacedOrder {
    pub order: Order,
    pub payment: Option<PaymentIntent>,
}

fn validate_location(point: GeoPoint) -> Result<(), AppError> {
    let valid = point.lng.is_finite()
        && point.lat.is_finite()
        && (-180.0..=180.0).contains(&point.lng)
        && (-90.0..=90.0).contains(&point.lat);
    if valid {
        Ok(())
    } else {
        Err(AppError::ValidationFailed(format!(
            "location ({}, {}) is not a valid longitude/latitude",
            point.lng, point.lat
        )))
    }
}

/// The zone is resolved once here and stored with the address; an address
/// outside every active zone is still saved, it just cannot be ordered to.
pub fn create_address(
    state: &AppState,
    actor: &Actor,
    payload: NewAddress,
) -> Result<Address, AppError> {
    require_role(actor, Role::Customer, "creating addresses")?;
    validate_location(payload.location)?;
    if payload.street.trim().is_empty() || payload.house.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "street and house are required".to_string(),
        ));
    }

    let zone = state.zones.resolve(payload.location);
    let address = Address {
        id: Uuid::new_v4(),
        customer_id: actor.id,
        label: payload.label,
        location: payload.location,
        city: payload.city,
        street: payload.street,
        house: payload.house,
        entrance: payload.entrance,
        floor: payload.floor,
        apartment: payload.apartment,
        intercom: payload.intercom,
        is_default: payload.is_default,
        zone_id: zone.as_ref().map(|zone| zone.id),
        zone_name: zone.map(|zone| zone.name),
        created_at: Utc::now(),
    };

    state.store.transact(|tables, changes| {
        if address.is_default {
            for previous in tables
                .addresses
                .values()
                .filter(|existing| existing.customer_id == actor.id && existing.is_default)
            {
                let mut previous = previous.clone();
                previous.is_default = false;
                changes.put(Change::Address(previous));
            }
        }
        changes.put(Change::Address(address.clone()));
        Ok(())
    })?;

    info!(
        address_id = %address.id,
        customer_id = %actor.id,
        zone_id = ?address.zone_id,
        "address created"
    );
    Ok(address)
}

pub fn list_addresses(state: &AppState, actor: &Actor) -> Result<Vec<Address>, AppError> {
    require_role(actor, Role::Customer, "listing addresses")?;

    state.store.read(|tables| {
        let mut addresses: Vec<Address> = tables
            .addresses
            .values()
            .filter(|address| address.customer_id == actor.id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        addresses
    })
}

pub(crate) fn owned_address<'a>(
    tables: &'a Tables,
    actor: &Actor,
    address_id: Uuid,
) -> Result<&'a Address, AppError> {
    tables
        .address(address_id)
        .ok()
        .filter(|address| address.customer_id == actor.id)
        .ok_or_else(|| AppError::NotFound(format!("address {address_id} not found")))
}

pub fn quote(
    state: &AppState,
    actor: &Actor,
    address_id: Uuid,
    bags_count: i32,
) -> Result<Quote, AppError> {
    require_role(actor, Role::Customer, "requesting a quote")?;
    validate_bags(bags_count)?;

    let address = state
        .store
        .read(|tables| owned_address(tables, actor, address_id).cloned())??;

    Ok(Quote {
        price: order_price(state, bags_count)?,
        can_serve: address.zone_id.is_some(),
        zone_name: address.zone_name,
    })
}

fn order_price(state: &AppState, bags_count: i32) -> Result<i64, AppError> {
    i64::from(bags_count)
        .checked_mul(state.pricing.price_per_bag)
        .ok_or_else(|| AppError::ValidationFailed("bags_count is too large".to_string()))
}

pub fn create_order(
    state: &AppState,
    actor: &Actor,
    payload: NewOrder,
) -> Result<PlacedOrder, AppError> {
    require_role(actor, Role::Customer, "placing orders")?;
    validate_bags(payload.bags_count)?;
    let now = Utc::now();
    validate_timing(&payload.timing, now)?;

    let price = order_price(state, payload.bags_count)?;
    let order_id = Uuid::new_v4();

    let zone_id = state.store.read(|tables| {
        owned_address(tables, actor, payload.address_id)?
            .zone_id
            .ok_or(AppError::UnserviceableArea)
    })??;

    let payment = if price > 0 {
        let metadata = BTreeMap::from([("order_id".to_string(), order_id.to_string())]);
        Some(state.payments.create_intent(price, &metadata)?)
    } else {
        None
    };

    let order = Order {
        id: order_id,
        customer_id: actor.id,
        address_id: payload.address_id,
        zone_id,
        kind: OrderType::OneTime,
        subscription_id: None,
        bags_count: payload.bags_count,
        price,
        comment: payload.comment,
        timing: payload.timing,
        courier_id: None,
        assigned_at: None,
        paid_at: None,
        status: OrderStatus::New,
        created_at: now,
        updated_at: now,
    };

    state.store.transact(|_, changes| {
        changes.put(Change::Order(order.clone()));
        Ok(())
    })?;

    record_new_order(state, &order);
    Ok(PlacedOrder { order, payment })
}

pub(crate) fn record_new_order(state: &AppState, order: &Order) {
    state.metrics.open_orders.inc();
    state
        .metrics
        .order_transitions_total
        .with_label_values(&[order.status.as_str()])
        .inc();
    state.publish(order);
    info!(
        order_id = %order.id,
        customer_id = %order.customer_id,
        zone_id = %order.zone_id,
        kind = ?order.kind,
        bags = order.bags_count,
        price = order.price,
        "order created"
    );
}

/// Owners, admins and couriers of the order's zone may read an order.
pub fn get_order(state: &AppState, actor: &Actor, order_id: Uuid) -> Result<Order, AppError> {
    state.store.read(|tables| {
        let order = tables.order(order_id)?;
        let visible = match actor.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == actor.id,
            Role::Courier => {
                order.is_assigned_to(actor.id)
                    || tables
                        .couriers
                        .get(&actor.id)
                        .is_some_and(|courier| courier.zone_id == order.zone_id)
            }
        };

        if visible {
            Ok(order.clone())
        } else {
            Err(AppError::NotFound(format!("order {order_id} not found")))
        }
    })?
}

pub fn customer_orders(state: &AppState, actor: &Actor) -> Result<Vec<Order>, AppError> {
    require_role(actor, Role::Customer, "listing orders")?;

    state.store.read(|tables| {
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|order| order.customer_id == actor.id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    })
}
