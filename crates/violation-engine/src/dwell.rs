//! Per-vehicle dwell tracking

use std::collections::VecDeque;
use uuid::Uuid;

/// Bounded position history per record
pub const MAX_POSITIONS: usize = 30;

/// Dwell state for one (track, zone) pair.
///
/// Created on first zone membership of a near-stationary vehicle, updated
/// each member frame, removed on exit or after the stale timeout. Owned
/// exclusively by the detector; nothing else mutates these.
#[derive(Debug, Clone)]
pub struct DwellRecord {
    pub first_seen: f64,
    pub last_seen: f64,
    pub positions: VecDeque<(f32, f32)>,
    /// Warning side effect already emitted for this record
    pub warned: bool,
    /// Violation already created; repeats must not re-trigger
    pub penalized: bool,
    /// The violation this record opened, if any
    pub violation_id: Option<Uuid>,
}

impl DwellRecord {
    pub fn new(now: f64, position: (f32, f32)) -> Self {
        let mut positions = VecDeque::with_capacity(MAX_POSITIONS);
        positions.push_back(position);
        Self {
            first_seen: now,
            last_seen: now,
            positions,
            warned: false,
            penalized: false,
            violation_id: None,
        }
    }

    /// Record another member-frame observation
    pub fn observe(&mut self, now: f64, position: (f32, f32)) {
        self.last_seen = now;
        if self.positions.len() >= MAX_POSITIONS {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
    }

    /// Continuous dwell as of `now`
    pub fn dwell_secs(&self, now: f64) -> f64 {
        (now - self.first_seen).max(0.0)
    }

    /// Whether the track has not been seen in the zone for `timeout` seconds
    pub fn is_stale(&self, now: f64, timeout_secs: f64) -> bool {
        now - self.last_seen > timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_history_bounded() {
        let mut record = DwellRecord::new(0.0, (0.0, 0.0));
        for i in 1..100 {
            record.observe(i as f64 * 0.1, (i as f32, i as f32));
        }
        assert_eq!(record.positions.len(), MAX_POSITIONS);
        // Oldest entries dropped first
        assert_eq!(record.positions.back(), Some(&(99.0, 99.0)));
    }

    #[test]
    fn test_dwell_accumulates() {
        let mut record = DwellRecord::new(10.0, (0.0, 0.0));
        record.observe(14.5, (1.0, 1.0));
        assert!((record.dwell_secs(14.5) - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_staleness() {
        let record = DwellRecord::new(0.0, (0.0, 0.0));
        assert!(!record.is_stale(1.5, 2.0));
        assert!(record.is_stale(2.1, 2.0));
    }
}
