use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::engine::require_role;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::actor::{Actor, Role};
use crate::models::zone::Zone;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/zones", post(create_zone).get(list_zones))
        .route("/admin/zones/:id", patch(update_zone))
        .route("/zones/resolve", post(resolve_zone))
}

#[derive(Deserialize)]
pub struct CreateZoneRequest {
    pub name: String,
    pub city: String,
    pub boundary: Value,
}

#[derive(Deserialize)]
pub struct UpdateZoneRequest {
    pub active: bool,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub zone: Option<Zone>,
}

async fn create_zone(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateZoneRequest>,
) -> Result<(StatusCode, Json<Zone>), AppError> {
    require_role(&actor, Role::Admin, "creating zones")?;
    let zone = state
        .zones
        .create(&payload.name, &payload.city, payload.boundary)?;
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn list_zones(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Zone>>, AppError> {
    require_role(&actor, Role::Admin, "listing zones")?;
    Ok(Json(state.zones.list()))
}

async fn update_zone(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateZoneRequest>,
) -> Result<Json<Zone>, AppError> {
    require_role(&actor, Role::Admin, "updating zones")?;
    Ok(Json(state.zones.set_active(id, payload.active)?))
}

async fn resolve_zone(
    State(state): State<Arc<AppState>>,
    Json(point): Json<GeoPoint>,
) -> Json<ResolveResponse> {
    Json(ResolveResponse {
        zone: state.zones.resolve(point),
    })
}
