//! Production loop: frames in, decisions and snapshots out

use crate::frame_state::{FrameSnapshot, FrameState};
use driver_scoring::{DriverScore, PenaltyTable, ScoringEngine};
use perception::{Detection, DensitySource, FrameInput, FrameSource, SimulatedDensity};
use signal_control::{
    EmergencyOutcome, JunctionController, JunctionState, Lane, SignalConfig, SignalError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use storage::Repository;
use tracing::{debug, info, warn};
use violation_engine::{
    DetectorConfig, Violation, ViolationDetector, ViolationEvent, ZoneRegistry,
};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub signal: SignalConfig,
    pub detector: DetectorConfig,
    /// The camera-instrumented approach; detections, red-light checks and
    /// ambulance preemption all apply to this lane
    pub observed_lane: Lane,
    /// How often the non-instrumented lane densities are re-sampled (seconds)
    pub density_refresh_secs: f64,
    /// Seed for the simulated density sources
    pub density_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            signal: SignalConfig::default(),
            detector: DetectorConfig::default(),
            observed_lane: Lane::North,
            density_refresh_secs: 10.0,
            density_seed: 0,
        }
    }
}

/// Totals reported when the loop exits
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub frames_processed: u64,
    pub total_detections: u64,
    pub parking_violations: u64,
    pub red_light_violations: u64,
}

/// Cloneable read/control surface over a running (or finished) pipeline.
///
/// Everything here is safe to call concurrently with the production loop;
/// reads come from the published snapshot or short-lived locks.
#[derive(Clone)]
pub struct PipelineHandle {
    controller: Arc<Mutex<JunctionController>>,
    scoring: Arc<Mutex<ScoringEngine>>,
    zones: Arc<ZoneRegistry>,
    repository: Arc<Repository>,
    state: Arc<FrameState>,
    stop: Arc<AtomicBool>,
}

impl PipelineHandle {
    /// Request a clean shutdown; the loop exits at the next frame boundary
    pub fn stop(&self) {
        info!("Pipeline stop requested");
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Latest published frame snapshot
    pub fn latest(&self) -> Arc<FrameSnapshot> {
        self.state.latest()
    }

    /// Time-accurate junction state
    pub fn junction_status(&self) -> JunctionState {
        lock(&self.controller).status()
    }

    /// Unresolved violations as of the last published frame
    pub fn active_violations(&self) -> Vec<Violation> {
        self.state.latest().active_violations.clone()
    }

    /// Most recently recorded violations, newest first
    pub fn recent_violations(&self, limit: usize) -> Vec<Violation> {
        self.repository
            .list_recent_violations(limit)
            .unwrap_or_default()
    }

    /// A driver's current ledger, if one exists
    pub fn driver_score(&self, driver_id: &str) -> Option<DriverScore> {
        lock(&self.scoring).get(driver_id)
    }

    /// Zone registry shared with the detector (admin CRUD surface)
    pub fn zones(&self) -> Arc<ZoneRegistry> {
        self.zones.clone()
    }

    /// Override a lane's observed vehicle count
    pub fn update_lane_count(&self, lane: &str, count: u32) -> Result<(), SignalError> {
        let lane: Lane = lane.parse()?;
        lock(&self.controller).update_lane_count(lane, count)
    }

    /// Manually advance junction time (operator/testing surface)
    pub fn tick(&self, elapsed_secs: f64) {
        lock(&self.controller).tick(elapsed_secs);
    }

    /// Manually trigger emergency preemption for a lane
    pub fn trigger_emergency(&self, lane: &str) -> Result<EmergencyOutcome, SignalError> {
        let lane: Lane = lane.parse()?;
        Ok(lock(&self.controller).activate_emergency(lane))
    }

    /// End emergency preemption; returns the lane the round robin resumed at
    pub fn clear_emergency(&self) -> Option<Lane> {
        lock(&self.controller).deactivate_emergency()
    }
}

/// The per-frame orchestrator.
///
/// One instance owns the detector and drives one frame source; everything
/// shared with handles (controller, scoring, zones, snapshot slot) lives
/// behind its own lock and is touched briefly per frame.
pub struct Pipeline {
    config: PipelineConfig,
    controller: Arc<Mutex<JunctionController>>,
    scoring: Arc<Mutex<ScoringEngine>>,
    zones: Arc<ZoneRegistry>,
    repository: Arc<Repository>,
    state: Arc<FrameState>,
    stop: Arc<AtomicBool>,
    detector: ViolationDetector,
    densities: Vec<(Lane, Box<dyn DensitySource>)>,
    last_density_refresh: Option<f64>,
    frames_processed: u64,
    total_detections: u64,
    parking_violations: u64,
    red_light_violations: u64,
    last_sequence: u64,
    last_timestamp: f64,
    last_vehicle_count: usize,
    started_at: Instant,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, repository: Arc<Repository>) -> Self {
        info!(
            observed_lane = %config.observed_lane,
            density_refresh_secs = config.density_refresh_secs,
            "Creating pipeline"
        );

        let controller = JunctionController::new(config.signal.clone());
        let zones = Arc::new(ZoneRegistry::new());
        let detector = ViolationDetector::new(config.detector.clone(), zones.clone());
        let scoring = ScoringEngine::new(PenaltyTable::default()).with_store(repository.clone());

        // The instrumented lane gets its count from frames; the rest from
        // density sources
        let densities: Vec<(Lane, Box<dyn DensitySource>)> = Lane::ALL
            .iter()
            .filter(|lane| **lane != config.observed_lane)
            .enumerate()
            .map(|(i, lane)| {
                let source: Box<dyn DensitySource> =
                    Box::new(SimulatedDensity::new(config.density_seed + i as u64));
                (*lane, source)
            })
            .collect();

        let initial = FrameSnapshot {
            sequence: 0,
            timestamp: 0.0,
            frames_processed: 0,
            uptime_secs: 0.0,
            vehicle_count: 0,
            total_detections: 0,
            parking_violations: 0,
            red_light_violations: 0,
            junction: controller.snapshot(),
            active_violations: Vec::new(),
            running: true,
        };

        Self {
            config,
            controller: Arc::new(Mutex::new(controller)),
            scoring: Arc::new(Mutex::new(scoring)),
            zones,
            repository,
            state: Arc::new(FrameState::new(initial)),
            stop: Arc::new(AtomicBool::new(false)),
            detector,
            densities,
            last_density_refresh: None,
            frames_processed: 0,
            total_detections: 0,
            parking_violations: 0,
            red_light_violations: 0,
            last_sequence: 0,
            last_timestamp: 0.0,
            last_vehicle_count: 0,
            started_at: Instant::now(),
        }
    }

    /// Replace the density source for a non-instrumented lane
    pub fn set_density_source(&mut self, lane: Lane, source: Box<dyn DensitySource>) {
        self.densities.retain(|(l, _)| *l != lane);
        if lane != self.config.observed_lane {
            self.densities.push((lane, source));
        }
    }

    /// Shared zone registry (wire up the admin surface before `run`)
    pub fn zones(&self) -> Arc<ZoneRegistry> {
        self.zones.clone()
    }

    /// Read/control handle; clone freely across tasks
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            controller: self.controller.clone(),
            scoring: self.scoring.clone(),
            zones: self.zones.clone(),
            repository: self.repository.clone(),
            state: self.state.clone(),
            stop: self.stop.clone(),
        }
    }

    /// Drive the loop until the source is exhausted, fails, or a handle
    /// requests a stop. Always closes the source and publishes a final
    /// not-running snapshot.
    pub async fn run(mut self, mut source: Box<dyn FrameSource>) -> PipelineReport {
        info!("Pipeline started");

        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("Pipeline stopping on request");
                break;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Frame source exhausted");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Frame source failed, stopping");
                    break;
                }
            };

            self.process_frame(&frame);
            tokio::task::yield_now().await;
        }

        source.close();
        self.publish(false);

        info!(
            frames = self.frames_processed,
            parking = self.parking_violations,
            red_light = self.red_light_violations,
            "Pipeline stopped"
        );
        PipelineReport {
            frames_processed: self.frames_processed,
            total_detections: self.total_detections,
            parking_violations: self.parking_violations,
            red_light_violations: self.red_light_violations,
        }
    }

    fn process_frame(&mut self, frame: &FrameInput) {
        let now = frame.timestamp;
        self.refresh_densities(now);

        let observed_light = {
            let mut ctrl = lock(&self.controller);
            let count =
                (frame.detections.len() as u32).min(self.config.signal.max_vehicle_count);
            if let Err(e) = ctrl.update_lane_count(self.config.observed_lane, count) {
                warn!(error = %e, "Lane count rejected");
            }
            ctrl.auto_tick();

            if frame.detections.iter().any(Detection::is_emergency_vehicle) {
                if let EmergencyOutcome::Cooldown { remaining_secs } =
                    ctrl.activate_emergency(self.config.observed_lane)
                {
                    debug!(remaining_secs, "Ambulance seen, preemption in cooldown");
                }
            }

            ctrl.light_for(self.config.observed_lane)
        };

        let events = self.detector.process_frame(frame, observed_light);
        self.apply_events(events, now);

        self.frames_processed += 1;
        self.total_detections += frame.detections.len() as u64;
        self.last_sequence = frame.sequence;
        self.last_timestamp = now;
        self.last_vehicle_count = frame.detections.len();
        self.publish(true);
    }

    fn refresh_densities(&mut self, now: f64) {
        let due = match self.last_density_refresh {
            Some(last) => now - last >= self.config.density_refresh_secs,
            None => true,
        };
        if !due {
            return;
        }
        self.last_density_refresh = Some(now);

        let mut ctrl = lock(&self.controller);
        for (lane, source) in &mut self.densities {
            match source.sample() {
                Ok(count) => {
                    let count = count.min(self.config.signal.max_vehicle_count);
                    if let Err(e) = ctrl.update_lane_count(*lane, count) {
                        warn!(lane = %lane, error = %e, "Density sample rejected");
                    }
                }
                // Transient: the lane keeps its previous count
                Err(e) => warn!(lane = %lane, error = %e, "Density sample failed"),
            }
        }
    }

    fn apply_events(&mut self, events: Vec<ViolationEvent>, now: f64) {
        for event in events {
            match event {
                ViolationEvent::Warning {
                    track_id,
                    zone_name,
                    dwell_secs,
                    ..
                } => {
                    info!(track_id, zone = %zone_name, dwell_secs, "Move-along warning announced");
                }
                ViolationEvent::ParkingViolation { violation, fine } => {
                    self.parking_violations += 1;
                    let driver_id =
                        driver_identity(violation.track_id, violation.license_plate.as_deref());
                    lock(&self.scoring).apply_violation_with_fine(
                        &driver_id,
                        violation.zone_type.violation_type(),
                        fine.total,
                        violation.license_plate.clone(),
                        now,
                    );
                    if let Err(e) = self.repository.upsert_violation(&violation) {
                        warn!(violation_id = %violation.id, error = %e, "Violation persist failed");
                    }
                }
                ViolationEvent::ViolationResolved(violation) => {
                    if let Err(e) = self.repository.upsert_violation(&violation) {
                        warn!(violation_id = %violation.id, error = %e, "Resolution persist failed");
                    }
                }
                ViolationEvent::RedLightRunning {
                    track_id,
                    license_plate,
                    timestamp,
                    ..
                } => {
                    self.red_light_violations += 1;
                    let driver_id = driver_identity(track_id, license_plate.as_deref());
                    lock(&self.scoring).apply_violation(
                        &driver_id,
                        "red_light_running",
                        license_plate,
                        timestamp,
                    );
                }
                ViolationEvent::Speeding {
                    track_id,
                    license_plate,
                    timestamp,
                    ..
                } => {
                    let driver_id = driver_identity(track_id, license_plate.as_deref());
                    lock(&self.scoring).apply_violation(
                        &driver_id,
                        "speeding",
                        license_plate,
                        timestamp,
                    );
                }
            }
        }
    }

    fn publish(&self, running: bool) {
        let junction = lock(&self.controller).snapshot();
        self.state.publish(FrameSnapshot {
            sequence: self.last_sequence,
            timestamp: self.last_timestamp,
            frames_processed: self.frames_processed,
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            vehicle_count: self.last_vehicle_count,
            total_detections: self.total_detections,
            parking_violations: self.parking_violations,
            red_light_violations: self.red_light_violations,
            junction,
            active_violations: self.detector.active_violations(),
            running,
        });
    }
}

/// Driver identity for scoring: the plate when OCR produced one, otherwise
/// a stable per-track fallback
fn driver_identity(track_id: i64, plate: Option<&str>) -> String {
    match plate {
        Some(plate) => plate.to_string(),
        None => format!("vehicle-{track_id}"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
