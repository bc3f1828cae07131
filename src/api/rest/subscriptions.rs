use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use uuid::Uuid;

use crate::engine::allowance::{self, AllowanceOrder, PlanTerms, StartedSubscription};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::order::Order;
use crate::models::subscription::Subscription;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/subscriptions", post(create_subscription))
        .route("/subscriptions/current", get(current_subscription))
        .route("/subscriptions/:id/cancel", post(cancel_subscription))
        .route("/subscriptions/orders", post(order_from_subscription))
}

async fn create_subscription(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(terms): Json<PlanTerms>,
) -> Result<(StatusCode, Json<StartedSubscription>), AppError> {
    let started = allowance::create_subscription(&state, &actor, terms)?;
    Ok((StatusCode::CREATED, Json(started)))
}

async fn current_subscription(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(allowance::current_subscription(&state, &actor)?))
}

async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, AppError> {
    Ok(Json(allowance::cancel_subscription(&state, &actor, id)?))
}

async fn order_from_subscription(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<AllowanceOrder>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = allowance::consume(&state, &actor, request)?;
    Ok((StatusCode::CREATED, Json(order)))
}
