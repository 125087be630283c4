//! Per-frame violation detection

use crate::cooldown::KeyedCooldown;
use crate::dwell::DwellRecord;
use crate::fine::{self, FineBreakdown};
use crate::zone::{Zone, ZoneRegistry, ZoneType};
use perception::{Detection, FrameInput};
use serde::{Deserialize, Serialize};
use signal_control::LightState;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zone_geometry::{overlap_ratio, point_in_polygon};

/// Detector thresholds.
///
/// `pixel_to_kmh` is the explicit per-camera scale between tracker pixel
/// speeds and road speeds; it must be calibrated per installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum bbox/polygon overlap accepted when the centroid test fails
    pub min_overlap_ratio: f32,
    /// Below this road speed a vehicle counts as stationary (km/h)
    pub stationary_speed_kmh: f32,
    /// Dwell at which the one-time warning fires (seconds)
    pub warning_threshold_secs: f64,
    /// Unobserved time after which a record is finalized (seconds)
    pub stale_timeout_secs: f64,
    /// Stop line as a fraction of frame height
    pub stop_line_fraction: f32,
    /// Minimum pixel speed to count as running the light
    pub red_light_min_speed_px: f32,
    /// Per-track red-light penalty suppression window (seconds)
    pub red_light_cooldown_secs: f64,
    /// Per-track speeding penalty suppression window (seconds)
    pub speeding_cooldown_secs: f64,
    /// Per-track warning audio suppression window (seconds)
    pub warning_cooldown_secs: f64,
    /// Per-camera pixel-speed to km/h scale
    pub pixel_to_kmh: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_overlap_ratio: 0.3,
            stationary_speed_kmh: 5.0,
            warning_threshold_secs: 3.0,
            stale_timeout_secs: 2.0,
            stop_line_fraction: 0.65,
            red_light_min_speed_px: 40.0,
            red_light_cooldown_secs: 5.0,
            speeding_cooldown_secs: 10.0,
            warning_cooldown_secs: 30.0,
            pixel_to_kmh: 0.18,
        }
    }
}

/// Lifecycle state of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationStatus {
    Active,
    Resolved,
}

/// A recorded parking violation.
///
/// Created once per (track, zone) at the first threshold crossing, mutated
/// while active, immutable once resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub track_id: i64,
    pub zone_id: String,
    pub zone_name: String,
    pub zone_type: ZoneType,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub duration_secs: f64,
    pub license_plate: Option<String>,
    pub fine_amount: f64,
    pub status: ViolationStatus,
}

/// Events emitted by one frame of processing
#[derive(Debug, Clone)]
pub enum ViolationEvent {
    /// One-time dwell warning before the violation threshold
    Warning {
        track_id: i64,
        zone_id: String,
        zone_name: String,
        dwell_secs: f64,
    },
    /// Dwell crossed the zone threshold; fine already computed
    ParkingViolation {
        violation: Violation,
        fine: FineBreakdown,
    },
    /// An active violation ended (vehicle left or track went stale)
    ViolationResolved(Violation),
    /// Tracked vehicle crossed the stop line against a red light
    RedLightRunning {
        track_id: i64,
        license_plate: Option<String>,
        speed_px_per_sec: f32,
        timestamp: f64,
    },
    /// Detector-side speeding flag on a tracked vehicle
    Speeding {
        track_id: i64,
        license_plate: Option<String>,
        speed_kmh: f32,
        timestamp: f64,
    },
}

/// Stateful parking and red-light violation detector.
///
/// Owns all DwellRecords. Must be driven from a single sequential loop;
/// per-frame linearizability is what keeps "at most one violation per
/// threshold crossing" true.
pub struct ViolationDetector {
    config: DetectorConfig,
    registry: Arc<ZoneRegistry>,
    dwell: HashMap<(i64, String), DwellRecord>,
    active: HashMap<Uuid, Violation>,
    red_light_cooldown: KeyedCooldown<i64>,
    speeding_cooldown: KeyedCooldown<i64>,
    warning_cooldown: KeyedCooldown<i64>,
}

impl ViolationDetector {
    pub fn new(config: DetectorConfig, registry: Arc<ZoneRegistry>) -> Self {
        info!(
            stationary_kmh = config.stationary_speed_kmh,
            warning_secs = config.warning_threshold_secs,
            stale_secs = config.stale_timeout_secs,
            "Creating violation detector"
        );
        let red_light_cooldown = KeyedCooldown::new(config.red_light_cooldown_secs);
        let speeding_cooldown = KeyedCooldown::new(config.speeding_cooldown_secs);
        let warning_cooldown = KeyedCooldown::new(config.warning_cooldown_secs);
        Self {
            config,
            registry,
            dwell: HashMap::new(),
            active: HashMap::new(),
            red_light_cooldown,
            speeding_cooldown,
            warning_cooldown,
        }
    }

    /// Process one frame of detections against the current zone set and the
    /// signal state of the observed lane. Returns the events this frame
    /// produced, in detection order.
    pub fn process_frame(
        &mut self,
        frame: &FrameInput,
        observed_light: LightState,
    ) -> Vec<ViolationEvent> {
        // One snapshot per frame: admin edits landing mid-frame are not seen
        // until the next frame, so no violation references a vanished zone.
        let zones = self.registry.snapshot();
        let now = frame.timestamp;
        let mut events = Vec::new();

        for det in &frame.detections {
            if !well_formed(det) {
                debug!(track_id = det.track_id, "skipping malformed detection");
                continue;
            }

            self.check_red_light(det, frame, observed_light, now, &mut events);
            self.check_speeding(det, now, &mut events);

            // Dwell tracking needs a stable identity
            if !det.is_tracked() {
                continue;
            }
            for zone in &zones {
                self.check_zone(det, zone, frame, now, &mut events);
            }
        }

        self.finalize_stale(now, &mut events);

        // Track ids churn over a long run; keep cooldown maps bounded
        self.red_light_cooldown.purge_idle(now, 60.0);
        self.speeding_cooldown.purge_idle(now, 60.0);
        self.warning_cooldown.purge_idle(now, 600.0);

        events
    }

    /// Currently active (unresolved) violations, oldest first
    pub fn active_violations(&self) -> Vec<Violation> {
        let mut violations: Vec<Violation> = self.active.values().cloned().collect();
        violations.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        violations
    }

    /// Dwell records currently held (observability)
    pub fn tracked_dwell_count(&self) -> usize {
        self.dwell.len()
    }

    fn check_zone(
        &mut self,
        det: &Detection,
        zone: &Zone,
        frame: &FrameInput,
        now: f64,
        events: &mut Vec<ViolationEvent>,
    ) {
        let key = (det.track_id, zone.id.clone());
        let member = point_in_polygon(det.centroid, &zone.polygon)
            || overlap_ratio(&det.bbox, &zone.polygon) >= self.config.min_overlap_ratio;

        if !member {
            if let Some(record) = self.dwell.remove(&key) {
                debug!(track_id = det.track_id, zone_id = %zone.id, "track left zone");
                if let Some(vid) = record.violation_id {
                    self.resolve_violation(vid, record.last_seen, events);
                }
            }
            return;
        }

        let speed_kmh = effective_speed_kmh(det, self.config.pixel_to_kmh);
        if let Some(record) = self.dwell.get_mut(&key) {
            record.observe(now, det.centroid);
        } else {
            // A pass-through vehicle must never start the timer
            if speed_kmh >= self.config.stationary_speed_kmh {
                return;
            }
            debug!(track_id = det.track_id, zone_id = %zone.id, "dwell started");
            self.dwell
                .insert(key.clone(), DwellRecord::new(now, det.centroid));
        }
        let Some(record) = self.dwell.get_mut(&key) else {
            return;
        };

        let dwell_secs = record.dwell_secs(now);

        if record.penalized {
            // Keep the open violation's duration advancing while it dwells
            if let Some(vid) = record.violation_id {
                if let Some(violation) = self.active.get_mut(&vid) {
                    violation.duration_secs = dwell_secs;
                }
            }
        } else if dwell_secs >= zone.max_dwell_secs {
            let impact = frame.other_vehicle_count(det.track_id);
            let fine = fine::calculate_fine(zone.zone_type, dwell_secs, impact);
            let violation = Violation {
                id: Uuid::new_v4(),
                track_id: det.track_id,
                zone_id: zone.id.clone(),
                zone_name: zone.name.clone(),
                zone_type: zone.zone_type,
                start_time: record.first_seen,
                end_time: None,
                duration_secs: dwell_secs,
                license_plate: det.plate_text.clone(),
                fine_amount: fine.total,
                status: ViolationStatus::Active,
            };
            record.penalized = true;
            record.violation_id = Some(violation.id);

            warn!(
                track_id = det.track_id,
                zone_id = %zone.id,
                zone_type = zone.zone_type.as_str(),
                dwell_secs,
                fine = fine.total,
                "parking violation recorded"
            );
            self.active.insert(violation.id, violation.clone());
            events.push(ViolationEvent::ParkingViolation { violation, fine });
        } else if dwell_secs >= self.config.warning_threshold_secs && !record.warned {
            record.warned = true;
            let track_id = det.track_id;
            if self.warning_cooldown.try_fire(track_id, now) {
                info!(track_id, zone_id = %zone.id, dwell_secs, "dwell warning");
                events.push(ViolationEvent::Warning {
                    track_id,
                    zone_id: zone.id.clone(),
                    zone_name: zone.name.clone(),
                    dwell_secs,
                });
            }
        }
    }

    fn check_red_light(
        &mut self,
        det: &Detection,
        frame: &FrameInput,
        observed_light: LightState,
        now: f64,
        events: &mut Vec<ViolationEvent>,
    ) {
        if observed_light != LightState::Red || !det.is_tracked() {
            return;
        }

        let stop_line_y = self.config.stop_line_fraction * frame.frame_height as f32;
        let crossed = det.bbox.bottom_y() > stop_line_y;
        let moving = det.speed_px_per_sec > self.config.red_light_min_speed_px;

        if crossed && moving && self.red_light_cooldown.try_fire(det.track_id, now) {
            warn!(
                track_id = det.track_id,
                speed_px = det.speed_px_per_sec,
                "red light running recorded"
            );
            events.push(ViolationEvent::RedLightRunning {
                track_id: det.track_id,
                license_plate: det.plate_text.clone(),
                speed_px_per_sec: det.speed_px_per_sec,
                timestamp: now,
            });
        }
    }

    fn check_speeding(&mut self, det: &Detection, now: f64, events: &mut Vec<ViolationEvent>) {
        if !det.is_speeding || !det.is_tracked() {
            return;
        }
        if self.speeding_cooldown.try_fire(det.track_id, now) {
            warn!(
                track_id = det.track_id,
                speed_kmh = det.speed_kmh,
                "speeding recorded"
            );
            events.push(ViolationEvent::Speeding {
                track_id: det.track_id,
                license_plate: det.plate_text.clone(),
                speed_kmh: det.speed_kmh,
                timestamp: now,
            });
        }
    }

    fn finalize_stale(&mut self, now: f64, events: &mut Vec<ViolationEvent>) {
        let stale_keys: Vec<(i64, String)> = self
            .dwell
            .iter()
            .filter(|(_, record)| record.is_stale(now, self.config.stale_timeout_secs))
            .map(|(key, _)| key.clone())
            .collect();

        for key in stale_keys {
            if let Some(record) = self.dwell.remove(&key) {
                debug!(track_id = key.0, zone_id = %key.1, "dwell record went stale");
                if let Some(vid) = record.violation_id {
                    self.resolve_violation(vid, record.last_seen, events);
                }
            }
        }
    }

    fn resolve_violation(&mut self, id: Uuid, end_time: f64, events: &mut Vec<ViolationEvent>) {
        if let Some(mut violation) = self.active.remove(&id) {
            violation.end_time = Some(end_time);
            violation.duration_secs = (end_time - violation.start_time).max(0.0);
            violation.status = ViolationStatus::Resolved;
            info!(
                violation_id = %violation.id,
                track_id = violation.track_id,
                duration_secs = violation.duration_secs,
                "violation resolved"
            );
            events.push(ViolationEvent::ViolationResolved(violation));
        }
    }
}

/// Road speed for the dwell-start check, falling back to the per-camera
/// pixel scale when the detector produced no calibrated speed
fn effective_speed_kmh(det: &Detection, pixel_to_kmh: f32) -> f32 {
    if det.speed_kmh > 0.0 {
        det.speed_kmh
    } else {
        det.speed_px_per_sec * pixel_to_kmh
    }
}

/// Reject detections with non-finite geometry; one bad record must not
/// abort the frame
fn well_formed(det: &Detection) -> bool {
    det.centroid.0.is_finite()
        && det.centroid.1.is_finite()
        && det.bbox.x.is_finite()
        && det.bbox.y.is_finite()
        && det.bbox.width.is_finite()
        && det.bbox.height.is_finite()
        && det.bbox.width >= 0.0
        && det.bbox.height >= 0.0
}
