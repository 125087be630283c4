//! Dynamic fine calculation
//!
//! Fine = Base(zone type) + Duration x Rate + Traffic_Impact x Multiplier
//!
//! Base is a fixed per-zone-type penalty, Duration is the illegal dwell in
//! seconds, and Traffic_Impact counts the OTHER vehicles in frame at
//! violation time. The formula is additive by policy; components are kept
//! separately so the breakdown can be surfaced to drivers.

use crate::zone::ZoneType;
use serde::{Deserialize, Serialize};

/// Rate applied per second of illegal dwell
pub const DURATION_RATE: f64 = 5.0;

/// Rate applied per affected vehicle in frame
pub const TRAFFIC_MULTIPLIER: f64 = 50.0;

/// Fixed base penalty for a zone type
pub fn base_penalty(zone_type: ZoneType) -> f64 {
    match zone_type {
        ZoneType::NoParking => 1000.0,
        ZoneType::NoStopping => 2000.0,
        ZoneType::Limited => 1000.0,
        ZoneType::Handicap => 2500.0,
        ZoneType::Loading => 1500.0,
    }
}

/// Itemized fine calculation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineBreakdown {
    pub zone_type: ZoneType,
    pub duration_secs: f64,
    pub traffic_impact: usize,
    pub base_penalty: f64,
    pub duration_penalty: f64,
    pub impact_penalty: f64,
    pub total: f64,
}

/// Apply the dynamic fine formula
pub fn calculate_fine(
    zone_type: ZoneType,
    duration_secs: f64,
    traffic_impact: usize,
) -> FineBreakdown {
    let base = base_penalty(zone_type);
    let duration_penalty = duration_secs * DURATION_RATE;
    let impact_penalty = traffic_impact as f64 * TRAFFIC_MULTIPLIER;

    FineBreakdown {
        zone_type,
        duration_secs,
        traffic_impact,
        base_penalty: base,
        duration_penalty,
        impact_penalty,
        total: base + duration_penalty + impact_penalty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_parking_reference_case() {
        // 1000 base + 60s * 5 + 5 vehicles * 50 = 1550 exactly
        let fine = calculate_fine(ZoneType::NoParking, 60.0, 5);
        assert_eq!(fine.base_penalty, 1000.0);
        assert_eq!(fine.duration_penalty, 300.0);
        assert_eq!(fine.impact_penalty, 250.0);
        assert_eq!(fine.total, 1550.0);
    }

    #[test]
    fn test_handicap_base_is_steepest() {
        let handicap = calculate_fine(ZoneType::Handicap, 0.0, 0);
        for zt in [
            ZoneType::NoParking,
            ZoneType::NoStopping,
            ZoneType::Limited,
            ZoneType::Loading,
        ] {
            assert!(calculate_fine(zt, 0.0, 0).total <= handicap.total);
        }
    }

    #[test]
    fn test_zero_duration_zero_impact() {
        let fine = calculate_fine(ZoneType::Loading, 0.0, 0);
        assert_eq!(fine.total, base_penalty(ZoneType::Loading));
    }
}
