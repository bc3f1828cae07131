use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{ledger, require_role};
use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::ledger::PayoutRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courier/payouts", post(request_payout).get(list_own_payouts))
        .route("/admin/payouts", get(list_payouts))
        .route("/admin/payouts/:id/approve", post(approve_payout))
        .route("/admin/payouts/:id/reject", post(reject_payout))
        .route("/admin/payouts/:id/paid", post(mark_paid))
}

#[derive(Deserialize)]
pub struct PayoutRequestBody {
    pub amount: i64,
}

async fn request_payout(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<PayoutRequestBody>,
) -> Result<(StatusCode, Json<PayoutRequest>), AppError> {
    let payout = ledger::request_payout(&state, &actor, payload.amount)?;
    Ok((StatusCode::CREATED, Json(payout)))
}

async fn list_own_payouts(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<PayoutRequest>>, AppError> {
    require_role(&actor, Role::Courier, "listing payouts")?;
    Ok(Json(ledger::payouts(&state, Some(actor.id))?))
}

async fn list_payouts(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<PayoutRequest>>, AppError> {
    require_role(&actor, Role::Admin, "listing payouts")?;
    Ok(Json(ledger::payouts(&state, None)?))
}

async fn approve_payout(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PayoutRequest>, AppError> {
    Ok(Json(ledger::approve_payout(&state, &actor, id)?))
}

async fn reject_payout(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PayoutRequest>, AppError> {
    Ok(Json(ledger::reject_payout(&state, &actor, id)?))
}

async fn mark_paid(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<PayoutRequest>, AppError> {
    Ok(Json(ledger::mark_payout_paid(&state, &actor, id)?))
}
