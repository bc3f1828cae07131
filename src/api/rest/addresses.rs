use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::engine::intake::{self, NewAddress};
use crate::error::AppError;
use crate::models::actor::Actor;
use crate::models::address::Address;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/addresses", get(list_addresses).post(create_address))
}

async fn create_address(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<NewAddress>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let address = intake::create_address(&state, &actor, payload)?;
    Ok((StatusCode::CREATED, Json(address)))
}

async fn list_addresses(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Address>>, AppError> {
    Ok(Json(intake::list_addresses(&state, &actor)?))
}
