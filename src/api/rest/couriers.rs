use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::couriers::{self, CourierUpdate, NewCourier};
use crate::engine::dispatch::{self, Transitioned};
use crate::engine::{ledger, require_role};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::courier::Courier;
use crate::models::ledger::{CourierBalance, Settlement};
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/couriers", post(create_courier).get(list_couriers))
        .route("/admin/couriers/:id", patch(update_courier))
        .route("/courier/me", get(me))
        .route("/courier/orders", get(list_orders))
        .route("/courier/orders/:id/accept", post(accept_order))
        .route("/courier/orders/:id/status", post(update_order_status))
        .route("/courier/balance", get(balance))
        .route("/courier/settlements", get(settlements))
}

#[derive(Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    #[serde(flatten)]
    pub balance: CourierBalance,
    pub available: i64,
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewCourier>,
) -> Result<(StatusCode, Json<Courier>), AppError> {
    let courier = couriers::create_courier(&state, &actor, payload)?;
    Ok((StatusCode::CREATED, Json(courier)))
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Courier>>, AppError> {
    Ok(Json(couriers::list_couriers(&state, &actor)?))
}

async fn update_courier(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<CourierUpdate>,
) -> Result<Json<Courier>, AppError> {
    Ok(Json(couriers::update_courier(&state, &actor, id, payload)?))
}

async fn me(State(state): State<Arc<AppState>>, actor: Actor) -> Result<Json<Courier>, AppError> {
    Ok(Json(couriers::profile(&state, &actor)?))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(couriers::visible_orders(&state, &actor, query.status)?))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(dispatch::accept_order(&state, &actor, id)?))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Transitioned>, AppError> {
    Ok(Json(dispatch::transition(&state, &actor, id, payload.status)?))
}

async fn balance(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<BalanceResponse>, AppError> {
    require_role(&actor, Role::Courier, "reading a balance")?;
    let balance = ledger::balance(&state, actor.id)?;
    Ok(Json(BalanceResponse {
        available: balance.available(),
        balance,
    }))
}

async fn settlements(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Settlement>>, AppError> {
    require_role(&actor, Role::Courier, "listing settlements")?;
    Ok(Json(ledger::settlements(&state, actor.id)?))
}
