use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch::{self, Transitioned};
use crate::engine::intake::{self, NewOrder, PlacedOrder, Quote};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/quote", post(quote))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/admin/orders/:id/paid", post(mark_paid))
        .route("/admin/orders/:id/refund", post(refund))
}

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub address_id: Uuid,
    pub bags_count: i32,
}

async fn quote(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(intake::quote(
        &state,
        &actor,
        payload.address_id,
        payload.bags_count,
    )?))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewOrder>,
) -> Result<(StatusCode, Json<PlacedOrder>), AppError> {
    let placed = intake::create_order(&state, &actor, payload)?;
    Ok((StatusCode::CREATED, Json(placed)))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(intake::customer_orders(&state, &actor)?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(intake::get_order(&state, &actor, id)?))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Transitioned>, AppError> {
    Ok(Json(dispatch::transition(
        &state,
        &actor,
        id,
        OrderStatus::Canceled,
    )?))
}

async fn mark_paid(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Transitioned>, AppError> {
    Ok(Json(dispatch::transition(&state, &actor, id, OrderStatus::Paid)?))
}

async fn refund(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Transitioned>, AppError> {
    Ok(Json(dispatch::transition(
        &state,
        &actor,
        id,
        OrderStatus::Refunded,
    )?))
}
