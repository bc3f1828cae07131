//! Subscription lifecycle and bag-allowance consumption.
//!
//! Drawing bags and creating the matching order happen in one store
//! transaction, so two concurrent draws can never both spend the last bags.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::intake::{owned_address, record_new_order};
use crate::engine::{require_role, validate_bags, validate_timing};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::order::{Order, OrderStatus, OrderType, Timing};
use crate::models::subscription::{Subscription, SubscriptionStatus};
use crate::payments::PaymentIntent;
use crate::state::AppState;
use crate::store::{Change, Tables};

/// Terms of the purchased plan. The plan catalog itself lives elsewhere.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanTerms {
    pub total_bags: i32,
    pub price: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowanceOrder {
    pub address_id: Uuid,
    pub bags_count: i32,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartedSubscription {
    pub subscription: Subscription,
    pub payment: Option<PaymentIntent>,
}

fn usable_subscription<'a>(
    tables: &'a Tables,
    customer_id: Uuid,
    now: DateTime<Utc>,
) -> Option<&'a Subscription> {
    tables
        .subscriptions
        .values()
        .filter(|subscription| subscription.customer_id == customer_id)
        .find(|subscription| subscription.is_usable(now))
}

pub fn create_subscription(
    state: &AppState,
    actor: &Actor,
    terms: PlanTerms,
) -> Result<StartedSubscription, AppError> {
    require_role(actor, Role::Customer, "subscribing")?;
    if terms.total_bags <= 0 {
        return Err(AppError::ValidationFailed(
            "total_bags must be > 0".to_string(),
        ));
    }
    if terms.price < 0 {
        return Err(AppError::ValidationFailed("price must be >= 0".to_string()));
    }
    let now = Utc::now();
    if terms.expires_at.is_some_and(|expires_at| expires_at <= now) {
        return Err(AppError::ValidationFailed(
            "expires_at must be in the future".to_string(),
        ));
    }

    let subscription = Subscription {
        id: Uuid::new_v4(),
        customer_id: actor.id,
        total_bags: terms.total_bags,
        remaining_bags: terms.total_bags,
        price: terms.price,
        status: SubscriptionStatus::Active,
        started_at: now,
        expires_at: terms.expires_at,
    };

    state.store.read(|tables| {
        match usable_subscription(tables, actor.id, now) {
            Some(existing) => Err(AppError::ConflictingState(format!(
                "customer already has active subscription {}",
                existing.id
            ))),
            None => Ok(()),
        }
    })??;

    let payment = if subscription.price > 0 {
        let metadata = BTreeMap::from([(
            "subscription_id".to_string(),
            subscription.id.to_string(),
        )]);
        Some(state.payments.create_intent(subscription.price, &metadata)?)
    } else {
        None
    };

    state.store.transact(|tables, changes| {
        if let Some(existing) = usable_subscription(tables, actor.id, now) {
            return Err(AppError::ConflictingState(format!(
                "customer already has active subscription {}",
                existing.id
            )));
        }
        for lapsed in tables
            .subscriptions
            .values()
            .filter(|existing| existing.customer_id == actor.id && existing.has_lapsed(now))
        {
            let mut expired = lapsed.clone();
            expired.status = SubscriptionStatus::Expired;
            changes.put(Change::Subscription(expired));
        }
        changes.put(Change::Subscription(subscription.clone()));
        Ok(())
    })?;

    info!(
        subscription_id = %subscription.id,
        customer_id = %actor.id,
        total_bags = subscription.total_bags,
        "subscription started"
    );
    Ok(StartedSubscription {
        subscription,
        payment,
    })
}

pub fn current_subscription(state: &AppState, actor: &Actor) -> Result<Subscription, AppError> {
    require_role(actor, Role::Customer, "reading subscriptions")?;

    state.store.read(|tables| {
        usable_subscription(tables, actor.id, Utc::now())
            .cloned()
            .ok_or_else(|| AppError::NotFound("no active subscription".to_string()))
    })?
}

/// Consumed bags stay consumed.
pub fn cancel_subscription(
    state: &AppState,
    actor: &Actor,
    subscription_id: Uuid,
) -> Result<Subscription, AppError> {
    let subscription = state.store.transact(|tables, changes| {
        let current = tables.subscription(subscription_id)?;
        let permitted = actor.is_admin()
            || (actor.role == Role::Customer && current.customer_id == actor.id);
        if !permitted {
            return Err(AppError::NotFound(format!(
                "subscription {subscription_id} not found"
            )));
        }
        if current.status != SubscriptionStatus::Active {
            return Err(AppError::ConflictingState(format!(
                "subscription {subscription_id} is already {:?}",
                current.status
            )));
        }
        if current.has_lapsed(Utc::now()) {
            return Err(AppError::ConflictingState(format!(
                "subscription {subscription_id} has expired"
            )));
        }

        let mut subscription = current.clone();
        subscription.status = SubscriptionStatus::Canceled;
        changes.put(Change::Subscription(subscription.clone()));
        Ok(subscription)
    })?;

    info!(subscription_id = %subscription.id, "subscription canceled");
    Ok(subscription)
}

/// Draws `bags_count` bags from the customer's active subscription and
/// creates the zero-price order they pay for.
pub fn consume(
    state: &AppState,
    actor: &Actor,
    request: AllowanceOrder,
) -> Result<Order, AppError> {
    require_role(actor, Role::Customer, "ordering from a subscription")?;
    validate_bags(request.bags_count)?;
    let now = Utc::now();
    validate_timing(&request.timing, now)?;

    let result = state.store.transact(|tables, changes| {
        let address = owned_address(tables, actor, request.address_id)?;
        let mut subscription = usable_subscription(tables, actor.id, now)
            .cloned()
            .ok_or_else(|| AppError::NotFound("no active subscription".to_string()))?;
        let zone_id = address.zone_id.ok_or(AppError::UnserviceableArea)?;

        if subscription.remaining_bags < request.bags_count {
            return Err(AppError::InsufficientAllowance {
                requested: request.bags_count,
                remaining: subscription.remaining_bags,
            });
        }
        subscription.remaining_bags -= request.bags_count;

        let order = Order {
            id: Uuid::new_v4(),
            customer_id: actor.id,
            address_id: address.id,
            zone_id,
            kind: OrderType::Subscription,
            subscription_id: Some(subscription.id),
            bags_count: request.bags_count,
            price: 0,
            comment: request.comment.clone(),
            timing: request.timing,
            courier_id: None,
            assigned_at: None,
            paid_at: None,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
        };

        changes.put(Change::Subscription(subscription));
        changes.put(Change::Order(order.clone()));
        Ok(order)
    });

    match &result {
        Ok(order) => {
            state
                .metrics
                .allowance_bags_consumed_total
                .inc_by(order.bags_count.unsigned_abs().into());
            record_new_order(state, order);
        }
        Err(err) => {
            warn!(customer_id = %actor.id, bags = request.bags_count, error = %err, "allowance draw refused");
        }
    }

    result
}
