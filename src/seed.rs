//! Demo data for local development: the 4YOU zone in Almaty, one customer
//! with a default address inside it, and a courier serving it.

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::engine::couriers::{self, NewCourier};
use crate::engine::intake::{self, NewAddress};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::actor::Actor;
use crate::models::address::Address;
use crate::models::courier::Courier;
use crate::models::zone::Zone;
use crate::state::AppState;

pub const DEMO_ZONE: &str = "4YOU";
pub const DEMO_ADMIN_ID: Uuid = Uuid::from_u128(0x0a);
pub const DEMO_CUSTOMER_ID: Uuid = Uuid::from_u128(0x0c);

#[derive(Debug, Clone)]
pub struct DemoData {
    pub zone: Zone,
    pub address: Address,
    pub courier: Courier,
}

/// Returns `None` when the demo zone is already present.
pub fn seed_demo(state: &AppState) -> Result<Option<DemoData>, AppError> {
    if state.zones.list().iter().any(|zone| zone.name == DEMO_ZONE) {
        return Ok(None);
    }

    let zone = state.zones.create(
        DEMO_ZONE,
        "Almaty",
        json!({
            "type": "Polygon",
            "coordinates": [[
                [76.9100, 43.2185],
                [76.9180, 43.2185],
                [76.9180, 43.2230],
                [76.9100, 43.2230],
                [76.9100, 43.2185]
            ]]
        }),
    )?;

    let address = intake::create_address(
        state,
        &Actor::customer(DEMO_CUSTOMER_ID),
        NewAddress {
            label: Some("home".to_string()),
            location: GeoPoint::new(76.9140, 43.2200),
            city: "Almaty".to_string(),
            street: "Kaskelenskaya".to_string(),
            house: "1".to_string(),
            entrance: "1".to_string(),
            floor: "1".to_string(),
            apartment: "1".to_string(),
            intercom: None,
            is_default: true,
        },
    )?;

    let courier = couriers::create_courier(
        state,
        &Actor::admin(DEMO_ADMIN_ID),
        NewCourier {
            name: "Demo Courier".to_string(),
            phone: "+77070000002".to_string(),
            zone_id: zone.id,
        },
    )?;

    info!(
        zone_id = %zone.id,
        admin_id = %DEMO_ADMIN_ID,
        customer_id = %DEMO_CUSTOMER_ID,
        courier_id = %courier.id,
        "demo data seeded"
    );

    Ok(Some(DemoData {
        zone,
        address,
        courier,
    }))
}
