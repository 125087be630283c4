//! Restriction zones and the thread-safe zone registry

use crate::ViolationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::info;
use zone_geometry::{validate_polygon, Point};

/// Restriction category of a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    NoParking,
    NoStopping,
    Limited,
    Handicap,
    Loading,
}

impl ZoneType {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneType::NoParking => "no_parking",
            ZoneType::NoStopping => "no_stopping",
            ZoneType::Limited => "limited",
            ZoneType::Handicap => "handicap",
            ZoneType::Loading => "loading",
        }
    }

    /// Scoring violation type this zone maps to
    pub fn violation_type(self) -> &'static str {
        match self {
            ZoneType::NoParking | ZoneType::Limited => "illegal_parking",
            ZoneType::NoStopping => "no_stopping",
            ZoneType::Handicap => "handicap_zone",
            ZoneType::Loading => "loading_zone",
        }
    }
}

/// A restriction zone in frame pixel coordinates.
///
/// `max_dwell_secs` is the continuous dwell after which a violation is
/// recorded; 0 means stopping at all is illegal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub polygon: Vec<Point>,
    pub zone_type: ZoneType,
    pub max_dwell_secs: f64,
    pub active: bool,
}

impl Zone {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        polygon: Vec<Point>,
        zone_type: ZoneType,
        max_dwell_secs: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            polygon,
            zone_type,
            max_dwell_secs,
            active: true,
        }
    }
}

/// Thread-safe zone store shared between the admin surface and the detector.
///
/// Admin edits may land concurrently with frame processing; the detector
/// reads one `snapshot()` per frame so an in-flight violation never
/// references a zone deleted mid-frame.
#[derive(Default)]
pub struct ZoneRegistry {
    zones: Mutex<HashMap<String, Zone>>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a zone. Polygons are validated here, never later.
    pub fn upsert(&self, zone: Zone) -> Result<(), ViolationError> {
        validate_polygon(&zone.polygon).map_err(|e| ViolationError::InvalidZone {
            zone_id: zone.id.clone(),
            reason: e.to_string(),
        })?;

        info!(
            zone_id = %zone.id,
            zone_type = zone.zone_type.as_str(),
            vertices = zone.polygon.len(),
            "zone registered"
        );
        self.zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(zone.id.clone(), zone);
        Ok(())
    }

    /// Remove a zone; returns whether it existed
    pub fn remove(&self, zone_id: &str) -> bool {
        let removed = self
            .zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(zone_id)
            .is_some();
        if removed {
            info!(zone_id, "zone removed");
        }
        removed
    }

    pub fn get(&self, zone_id: &str) -> Option<Zone> {
        self.zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(zone_id)
            .cloned()
    }

    /// Consistent copy of all active zones for one frame of processing
    pub fn snapshot(&self) -> Vec<Zone> {
        let mut zones: Vec<Zone> = self
            .zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|z| z.active)
            .cloned()
            .collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        zones
    }

    /// All zones including inactive (admin listing)
    pub fn list_all(&self) -> Vec<Zone> {
        let mut zones: Vec<Zone> = self
            .zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        zones
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_zone(id: &str) -> Zone {
        Zone::new(
            id,
            "Main St No Parking",
            vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
            ZoneType::NoParking,
            8.0,
        )
    }

    #[test]
    fn test_upsert_and_snapshot() {
        let registry = ZoneRegistry::new();
        registry.upsert(square_zone("zone_1")).unwrap();
        registry.upsert(square_zone("zone_2")).unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "zone_1");
    }

    #[test]
    fn test_malformed_polygon_rejected() {
        let registry = ZoneRegistry::new();
        let mut zone = square_zone("zone_bad");
        zone.polygon.truncate(2);
        assert!(matches!(
            registry.upsert(zone),
            Err(ViolationError::InvalidZone { .. })
        ));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_inactive_zones_excluded_from_snapshot() {
        let registry = ZoneRegistry::new();
        let mut zone = square_zone("zone_1");
        zone.active = false;
        registry.upsert(zone).unwrap();
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.list_all().len(), 1);
    }

    #[test]
    fn test_remove() {
        let registry = ZoneRegistry::new();
        registry.upsert(square_zone("zone_1")).unwrap();
        assert!(registry.remove("zone_1"));
        assert!(!registry.remove("zone_1"));
    }

    #[test]
    fn test_zone_type_violation_mapping() {
        assert_eq!(ZoneType::NoParking.violation_type(), "illegal_parking");
        assert_eq!(ZoneType::Handicap.violation_type(), "handicap_zone");
        assert_eq!(ZoneType::Loading.violation_type(), "loading_zone");
    }
}
