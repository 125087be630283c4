//! Junction controller state machine

use crate::lane::{JunctionState, Lane, LaneState, LightState};
use crate::timing::{FuzzyGreenTime, GreenTimeStrategy, LinearGreenTime};
use crate::SignalError;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Signal timing configuration
#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// Shortest adaptive green window (seconds)
    pub min_green_secs: f64,
    /// Longest adaptive green window (seconds)
    pub max_green_secs: f64,
    /// Fixed yellow phase (seconds)
    pub yellow_secs: f64,
    /// How long an emergency preemption holds its lane green
    pub emergency_duration_secs: f64,
    /// Minimum spacing between emergency activations
    pub emergency_cooldown_secs: f64,
    /// Upper bound accepted by update_lane_count
    pub max_vehicle_count: u32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_green_secs: 10.0,
            max_green_secs: 60.0,
            yellow_secs: 3.0,
            emergency_duration_secs: 30.0,
            emergency_cooldown_secs: 30.0,
            max_vehicle_count: 100,
        }
    }
}

/// Outcome of an emergency activation request
#[derive(Debug, Clone, PartialEq)]
pub enum EmergencyOutcome {
    /// Preemption engaged; the lane is now forced green
    Activated { lane: Lane, duration_secs: f64 },
    /// Activation suppressed; a previous one is still within the cooldown
    Cooldown { remaining_secs: f64 },
}

/// Per-lane signal phase
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Green { remaining: f64 },
    Yellow { remaining: f64 },
}

#[derive(Debug, Clone, Copy)]
struct Emergency {
    lane: Lane,
    elapsed: f64,
    /// Lane the round robin resumes at when preemption ends
    saved_lane: Lane,
}

/// Four-way adaptive signal controller.
///
/// Owns all junction state explicitly; construct one instance per junction
/// and serialize access through a single lock or actor. Transitions are
/// driven by elapsed seconds, never frame counts, so behavior holds under
/// variable frame rates.
pub struct JunctionController {
    config: SignalConfig,
    strategy: Box<dyn GreenTimeStrategy>,
    counts: BTreeMap<Lane, u32>,
    current: Lane,
    phase: Phase,
    emergency: Option<Emergency>,
    /// Internal monotonic clock advanced by tick (seconds)
    clock: f64,
    last_emergency_activation: Option<f64>,
    /// Wall-clock anchor for poll-driven auto ticking
    last_poll: Instant,
}

impl JunctionController {
    /// Create a controller using fuzzy inference for green timing
    pub fn new(config: SignalConfig) -> Self {
        let strategy = Box::new(FuzzyGreenTime::new(
            config.min_green_secs,
            config.max_green_secs,
        ));
        Self::with_strategy(config, strategy)
    }

    /// Create a controller on the deterministic linear fallback.
    ///
    /// Used when the inference strategy is unavailable; degraded mode, not
    /// an error.
    pub fn with_fallback(config: SignalConfig) -> Self {
        warn!("Fuzzy inference unavailable, signal timing on linear fallback");
        let strategy = Box::new(LinearGreenTime::new(
            config.min_green_secs,
            config.max_green_secs,
        ));
        Self::with_strategy(config, strategy)
    }

    /// Create a controller with an explicit timing strategy
    pub fn with_strategy(config: SignalConfig, strategy: Box<dyn GreenTimeStrategy>) -> Self {
        info!(
            strategy = strategy.name(),
            min_green = config.min_green_secs,
            max_green = config.max_green_secs,
            "Creating junction controller"
        );
        let initial_green = strategy.green_duration(0);
        Self {
            config,
            strategy,
            counts: Lane::ALL.iter().map(|l| (*l, 0)).collect(),
            current: Lane::North,
            phase: Phase::Green {
                remaining: initial_green,
            },
            emergency: None,
            clock: 0.0,
            last_emergency_activation: None,
            last_poll: Instant::now(),
        }
    }

    /// Record a lane's observed vehicle density. No other side effects.
    pub fn update_lane_count(&mut self, lane: Lane, count: u32) -> Result<(), SignalError> {
        if count > self.config.max_vehicle_count {
            return Err(SignalError::CountOutOfRange(
                count,
                self.config.max_vehicle_count,
            ));
        }
        self.counts.insert(lane, count);
        Ok(())
    }

    /// Advance junction time by `elapsed_secs` of real time.
    ///
    /// Walks through as many phase transitions as the elapsed window covers,
    /// so a stalled caller catching up with one large tick lands in the same
    /// state as many small ones.
    pub fn tick(&mut self, elapsed_secs: f64) {
        if elapsed_secs <= 0.0 {
            return;
        }
        self.clock += elapsed_secs;
        self.last_poll = Instant::now();

        let mut dt = elapsed_secs;
        if let Some(mut em) = self.emergency {
            let remaining = self.config.emergency_duration_secs - em.elapsed;
            if dt < remaining {
                em.elapsed += dt;
                self.emergency = Some(em);
                return;
            }
            // Emergency expires inside this window; the leftover time
            // belongs to the resumed round-robin phase
            dt -= remaining;
            em.elapsed = self.config.emergency_duration_secs;
            self.emergency = Some(em);
            self.deactivate_emergency();
        }
        loop {
            match &mut self.phase {
                Phase::Green { remaining } => {
                    if dt < *remaining {
                        *remaining -= dt;
                        break;
                    }
                    dt -= *remaining;
                    debug!(lane = %self.current, "green expired, entering yellow");
                    self.phase = Phase::Yellow {
                        remaining: self.config.yellow_secs,
                    };
                }
                Phase::Yellow { remaining } => {
                    if dt < *remaining {
                        *remaining -= dt;
                        break;
                    }
                    dt -= *remaining;
                    let next = self.current.next();
                    let count = self.counts.get(&next).copied().unwrap_or(0);
                    let duration = self.strategy.green_duration(count);
                    info!(
                        from = %self.current,
                        to = %next,
                        vehicles = count,
                        green_secs = duration,
                        "signal advance"
                    );
                    self.current = next;
                    self.phase = Phase::Green {
                        remaining: duration,
                    };
                }
            }
        }
    }

    /// Tick by wall-clock time elapsed since the last tick or poll.
    ///
    /// Two calls within the same sub-second window advance the junction by
    /// exactly the real time between them, never double-counting.
    pub fn auto_tick(&mut self) {
        let elapsed = self.last_poll.elapsed().as_secs_f64();
        self.tick(elapsed);
        // tick() skips zero/negative elapsed; keep the anchor fresh anyway
        self.last_poll = Instant::now();
    }

    /// Force `lane` green, all others red, suspending the round robin.
    ///
    /// A repeat activation inside the cooldown window is a no-op reported as
    /// `Cooldown`; the running emergency timer is not reset.
    pub fn activate_emergency(&mut self, lane: Lane) -> EmergencyOutcome {
        if let Some(since) = self.last_emergency_activation {
            let age = self.clock - since;
            if age < self.config.emergency_cooldown_secs {
                let remaining = self.config.emergency_cooldown_secs - age;
                debug!(lane = %lane, remaining, "emergency activation in cooldown");
                return EmergencyOutcome::Cooldown {
                    remaining_secs: remaining,
                };
            }
        }

        let saved_lane = match self.emergency {
            // Back-to-back preemption keeps the original resume point
            Some(em) => em.saved_lane,
            None => self.current,
        };

        self.emergency = Some(Emergency {
            lane,
            elapsed: 0.0,
            saved_lane,
        });
        self.last_emergency_activation = Some(self.clock);
        info!(lane = %lane, duration = self.config.emergency_duration_secs, "EMERGENCY preemption active");

        EmergencyOutcome::Activated {
            lane,
            duration_secs: self.config.emergency_duration_secs,
        }
    }

    /// End preemption and resume the round robin at the pre-emergency lane
    /// with a freshly computed green duration. Returns the resumed lane.
    pub fn deactivate_emergency(&mut self) -> Option<Lane> {
        let em = self.emergency.take()?;
        let count = self.counts.get(&em.saved_lane).copied().unwrap_or(0);
        let duration = self.strategy.green_duration(count);
        self.current = em.saved_lane;
        self.phase = Phase::Green {
            remaining: duration,
        };
        info!(lane = %em.saved_lane, green_secs = duration, "emergency cleared, round robin resumed");
        Some(em.saved_lane)
    }

    /// Whether emergency preemption is currently active
    pub fn emergency_active(&self) -> bool {
        self.emergency.is_some()
    }

    /// Time-accurate junction snapshot for polled readers.
    ///
    /// Internally ticks by the wall-clock time since the last tick or poll,
    /// so callers see current state without running an explicit ticker.
    pub fn status(&mut self) -> JunctionState {
        self.auto_tick();
        self.snapshot()
    }

    /// Pure snapshot of current state, no time accounting
    pub fn snapshot(&self) -> JunctionState {
        let mut lanes = BTreeMap::new();

        for lane in Lane::ALL {
            let vehicle_count = self.counts.get(&lane).copied().unwrap_or(0);
            let (light, green_remaining) = match self.emergency {
                Some(em) => {
                    if lane == em.lane {
                        let remaining =
                            (self.config.emergency_duration_secs - em.elapsed).max(0.0);
                        (LightState::Green, remaining)
                    } else {
                        (LightState::Red, 0.0)
                    }
                }
                None => {
                    if lane == self.current {
                        match self.phase {
                            Phase::Green { remaining } => (LightState::Green, remaining),
                            Phase::Yellow { .. } => (LightState::Yellow, 0.0),
                        }
                    } else {
                        (LightState::Red, 0.0)
                    }
                }
            };

            lanes.insert(
                lane,
                LaneState {
                    vehicle_count,
                    light,
                    green_remaining_secs: green_remaining,
                },
            );
        }

        JunctionState {
            current_green: self.emergency.map(|em| em.lane).unwrap_or(self.current),
            lanes,
            emergency_mode: self.emergency.is_some(),
            emergency_lane: self.emergency.map(|em| em.lane),
            emergency_elapsed_secs: self.emergency.map(|em| em.elapsed).unwrap_or(0.0),
        }
    }

    /// Light currently shown to a lane (red-light checks)
    pub fn light_for(&self, lane: Lane) -> LightState {
        match self.emergency {
            Some(em) => {
                if lane == em.lane {
                    LightState::Green
                } else {
                    LightState::Red
                }
            }
            None => {
                if lane == self.current {
                    match self.phase {
                        Phase::Green { .. } => LightState::Green,
                        Phase::Yellow { .. } => LightState::Yellow,
                    }
                } else {
                    LightState::Red
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> JunctionController {
        JunctionController::new(SignalConfig::default())
    }

    fn assert_one_green_or_all_red(state: &JunctionState) {
        let greens = state.green_lanes().len();
        let yellows = state
            .lanes
            .values()
            .filter(|s| s.light == LightState::Yellow)
            .count();
        assert!(
            (greens == 1 && yellows == 0) || (greens == 0 && yellows == 1),
            "greens={greens} yellows={yellows}"
        );
    }

    #[test]
    fn test_initial_state_north_green() {
        let ctrl = controller();
        let state = ctrl.snapshot();
        assert_eq!(state.current_green, Lane::North);
        assert_eq!(state.lanes[&Lane::North].light, LightState::Green);
        assert_eq!(state.lanes[&Lane::East].light, LightState::Red);
    }

    #[test]
    fn test_invariant_holds_across_many_ticks() {
        let mut ctrl = controller();
        ctrl.update_lane_count(Lane::East, 30).unwrap();
        for _ in 0..500 {
            ctrl.tick(0.7);
            assert_one_green_or_all_red(&ctrl.snapshot());
        }
    }

    #[test]
    fn test_green_to_yellow_to_next_lane() {
        let mut ctrl = controller();
        // Empty lanes: green = min_green = 10s
        ctrl.tick(10.0);
        assert_eq!(ctrl.light_for(Lane::North), LightState::Yellow);
        ctrl.tick(3.0);
        assert_eq!(ctrl.light_for(Lane::East), LightState::Green);
        assert_eq!(ctrl.light_for(Lane::North), LightState::Red);
    }

    #[test]
    fn test_one_large_tick_matches_many_small() {
        let mut big = controller();
        let mut small = controller();
        big.tick(47.3);
        for _ in 0..473 {
            small.tick(0.1);
        }
        assert_eq!(big.snapshot().current_green, small.snapshot().current_green);
    }

    #[test]
    fn test_busy_lane_gets_longer_green() {
        let mut ctrl = controller();
        ctrl.update_lane_count(Lane::East, 50).unwrap();
        // Burn north's green (10s) and yellow (3s)
        ctrl.tick(13.0);
        let state = ctrl.snapshot();
        assert_eq!(state.current_green, Lane::East);
        assert!((state.lanes[&Lane::East].green_remaining_secs - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_count_out_of_range_rejected() {
        let mut ctrl = controller();
        assert!(ctrl.update_lane_count(Lane::North, 101).is_err());
        assert!(ctrl.update_lane_count(Lane::North, 100).is_ok());
    }

    #[test]
    fn test_emergency_forces_lane_green() {
        let mut ctrl = controller();
        let outcome = ctrl.activate_emergency(Lane::South);
        assert!(matches!(outcome, EmergencyOutcome::Activated { lane: Lane::South, .. }));

        let state = ctrl.snapshot();
        assert!(state.emergency_mode);
        assert_eq!(state.emergency_lane, Some(Lane::South));
        assert_eq!(state.lanes[&Lane::South].light, LightState::Green);
        for lane in [Lane::North, Lane::East, Lane::West] {
            assert_eq!(state.lanes[&lane].light, LightState::Red);
        }
    }

    #[test]
    fn test_emergency_cooldown_does_not_reset_timer() {
        let mut ctrl = controller();
        ctrl.activate_emergency(Lane::South);
        ctrl.tick(5.0);

        let elapsed_before = ctrl.snapshot().emergency_elapsed_secs;
        let outcome = ctrl.activate_emergency(Lane::West);
        assert!(matches!(outcome, EmergencyOutcome::Cooldown { .. }));

        let state = ctrl.snapshot();
        // Timer untouched, original lane still preempted
        assert_eq!(state.emergency_lane, Some(Lane::South));
        assert!((state.emergency_elapsed_secs - elapsed_before).abs() < 1e-9);
    }

    #[test]
    fn test_emergency_auto_expires_and_resumes() {
        let mut ctrl = controller();
        // Move round robin to East first
        ctrl.tick(13.0);
        assert_eq!(ctrl.snapshot().current_green, Lane::East);

        ctrl.activate_emergency(Lane::West);
        ctrl.tick(30.0);

        let state = ctrl.snapshot();
        assert!(!state.emergency_mode);
        // Round robin resumed at the preempted lane with a fresh green
        assert_eq!(state.current_green, Lane::East);
        assert_eq!(state.lanes[&Lane::East].light, LightState::Green);
    }

    #[test]
    fn test_large_tick_across_emergency_expiry_matches_small() {
        let mut big = controller();
        let mut small = controller();
        big.activate_emergency(Lane::South);
        small.activate_emergency(Lane::South);

        // 30s of emergency plus 7s into the resumed green
        big.tick(37.0);
        for _ in 0..370 {
            small.tick(0.1);
        }

        let b = big.snapshot();
        let s = small.snapshot();
        assert!(!b.emergency_mode);
        assert!(!s.emergency_mode);
        assert_eq!(b.current_green, s.current_green);
        // The time past expiry drains the resumed phase on both paths
        let b_remaining = b.lanes[&b.current_green].green_remaining_secs;
        let s_remaining = s.lanes[&s.current_green].green_remaining_secs;
        assert!((b_remaining - 3.0).abs() < 1e-9, "remaining {b_remaining}");
        assert!((b_remaining - s_remaining).abs() < 1e-6);
    }

    #[test]
    fn test_sub_second_status_polls_never_double_advance() {
        let started = Instant::now();
        let mut ctrl = controller();
        let first = ctrl.status();
        let second = ctrl.status();
        let wall = started.elapsed().as_secs_f64();

        let r1 = first.lanes[&Lane::North].green_remaining_secs;
        let r2 = second.lanes[&Lane::North].green_remaining_secs;
        assert!(r2 <= r1);
        // Two polls together drain at most the real wall time covering
        // them, never twice it (initial green is min_green = 10s)
        let drained = 10.0 - r2;
        assert!(drained <= wall + 1e-3, "drained {drained} in {wall}s");
    }

    #[test]
    fn test_manual_deactivate_restores_saved_lane() {
        let mut ctrl = controller();
        ctrl.activate_emergency(Lane::East);
        let resumed = ctrl.deactivate_emergency();
        assert_eq!(resumed, Some(Lane::North));
        assert!(!ctrl.emergency_active());
        assert_eq!(ctrl.light_for(Lane::North), LightState::Green);
    }

    #[test]
    fn test_deactivate_without_emergency_is_noop() {
        let mut ctrl = controller();
        assert_eq!(ctrl.deactivate_emergency(), None);
    }

    #[test]
    fn test_emergency_invariant_during_preemption() {
        let mut ctrl = controller();
        ctrl.activate_emergency(Lane::West);
        for _ in 0..20 {
            ctrl.tick(1.0);
            let state = ctrl.snapshot();
            if state.emergency_mode {
                assert_eq!(state.green_lanes(), vec![Lane::West]);
            }
        }
    }

    #[test]
    fn test_fallback_controller_same_invariants() {
        let mut ctrl = JunctionController::with_fallback(SignalConfig::default());
        ctrl.update_lane_count(Lane::East, 20).unwrap();
        for _ in 0..200 {
            ctrl.tick(0.9);
            assert_one_green_or_all_red(&ctrl.snapshot());
        }
    }
}
