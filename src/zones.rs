use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{Boundary, GeoPoint};
use crate::models::zone::Zone;

/// Picks the first active candidate whose boundary holds `point`.
///
/// Overlapping zones are not ranked; the candidate order decides, so callers
/// must pass a stable ordering to get a stable answer.
pub fn resolve(point: GeoPoint, candidates: &[Zone]) -> Option<&Zone> {
    candidates
        .iter()
        .filter(|zone| zone.active)
        .find(|zone| zone.contains(point))
}

#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: DashMap<Uuid, Zone>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: &str, city: &str, boundary: Value) -> Result<Zone, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::ValidationFailed(
                "zone name cannot be empty".to_string(),
            ));
        }
        if Boundary::from_geojson(&boundary).is_none() {
            return Err(AppError::ValidationFailed(
                "boundary must be a GeoJSON Polygon or MultiPolygon".to_string(),
            ));
        }

        let zone = Zone {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            city: city.trim().to_string(),
            boundary,
            active: true,
            created_at: Utc::now(),
        };
        self.insert(zone.clone());

        info!(zone_id = %zone.id, name = %zone.name, "zone created");
        Ok(zone)
    }

    /// Stores a zone as given, without checking its boundary.
    pub fn insert(&self, zone: Zone) {
        self.zones.insert(zone.id, zone);
    }

    pub fn set_active(&self, id: Uuid, active: bool) -> Result<Zone, AppError> {
        let mut zone = self
            .zones
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("zone {id} not found")))?;

        zone.active = active;
        info!(zone_id = %id, active, "zone activation changed");
        Ok(zone.clone())
    }

    pub fn get(&self, id: Uuid) -> Option<Zone> {
        self.zones.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// All zones, oldest first with ties broken by id.
    pub fn list(&self) -> Vec<Zone> {
        let mut zones: Vec<Zone> = self
            .zones
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        zones.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        zones
    }

    pub fn active(&self) -> Vec<Zone> {
        self.list().into_iter().filter(|zone| zone.active).collect()
    }

    pub fn resolve(&self, point: GeoPoint) -> Option<Zone> {
        resolve(point, &self.active()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;

    fn square(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [min_lng, min_lat],
                [max_lng, min_lat],
                [max_lng, max_lat],
                [min_lng, max_lat],
                [min_lng, min_lat]
            ]]
        })
    }

    fn zone(seed: u128, boundary: Value, age_secs: i64) -> Zone {
        Zone {
            id: Uuid::from_u128(seed),
            name: format!("zone-{seed}"),
            city: "Almaty".to_string(),
            boundary,
            active: true,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn resolves_address_inside_seed_zone() {
        let registry = ZoneRegistry::new();
        let z = registry
            .create("4YOU", "Almaty", square(76.9100, 43.2185, 76.9180, 43.2230))
            .unwrap();

        let inside = registry.resolve(GeoPoint::new(76.9140, 43.2200));
        let outside = registry.resolve(GeoPoint::new(76.9300, 43.2200));

        assert_eq!(inside.map(|zone| zone.id), Some(z.id));
        assert!(outside.is_none());
    }

    #[test]
    fn inactive_zones_are_skipped() {
        let registry = ZoneRegistry::new();
        let z = registry
            .create("4YOU", "Almaty", square(76.9100, 43.2185, 76.9180, 43.2230))
            .unwrap();
        registry.set_active(z.id, false).unwrap();

        assert!(registry.resolve(GeoPoint::new(76.9140, 43.2200)).is_none());
    }

    #[test]
    fn overlapping_zones_resolve_to_the_same_one_every_time() {
        let registry = ZoneRegistry::new();
        registry.insert(zone(2, square(0.0, 0.0, 10.0, 10.0), 10));
        registry.insert(zone(1, square(5.0, 5.0, 15.0, 15.0), 10));
        registry.insert(zone(3, square(4.0, 4.0, 8.0, 8.0), 60));

        let point = GeoPoint::new(6.0, 6.0);
        let first = registry.resolve(point).map(|zone| zone.id);

        assert_eq!(first, Some(Uuid::from_u128(3)));
        for _ in 0..20 {
            assert_eq!(registry.resolve(point).map(|zone| zone.id), first);
        }
    }

    #[test]
    fn malformed_stored_boundary_is_treated_as_outside() {
        let registry = ZoneRegistry::new();
        registry.insert(zone(1, json!({ "type": "Polygon" }), 5));
        registry.insert(zone(2, square(0.0, 0.0, 10.0, 10.0), 1));

        let resolved = registry.resolve(GeoPoint::new(5.0, 5.0));
        assert_eq!(resolved.map(|zone| zone.id), Some(Uuid::from_u128(2)));
    }

    #[test]
    fn create_rejects_unparseable_boundary() {
        let registry = ZoneRegistry::new();
        let err = registry
            .create("broken", "Almaty", json!({ "type": "LineString", "coordinates": [] }))
            .unwrap_err();

        assert!(matches!(err, AppError::ValidationFailed(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn create_accepts_positions_with_altitude() {
        let registry = ZoneRegistry::new();
        let z = registry
            .create(
                "4YOU",
                "Almaty",
                json!({
                    "type": "Polygon",
                    "coordinates": [[
                        [76.9100, 43.2185, 850.0],
                        [76.9180, 43.2185, 850.0],
                        [76.9180, 43.2230, 850.0],
                        [76.9100, 43.2230, 850.0],
                        [76.9100, 43.2185, 850.0]
                    ]]
                }),
            )
            .unwrap();

        let resolved = registry.resolve(GeoPoint::new(76.9140, 43.2200));
        assert_eq!(resolved.map(|zone| zone.id), Some(z.id));
    }
}
