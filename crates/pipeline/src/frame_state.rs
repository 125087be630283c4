//! Single-slot frame state shared between the production loop and readers

use serde::Serialize;
use signal_control::JunctionState;
use std::sync::{Arc, Mutex, PoisonError};
use violation_engine::Violation;

/// Immutable view of the pipeline after one processed frame.
///
/// Built off to the side by the production loop, then published in one slot
/// swap; readers always see a whole frame's worth of state, never a frame in
/// mid-assembly.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    /// Sequence number of the frame this snapshot reflects
    pub sequence: u64,
    /// Source timestamp of that frame (seconds)
    pub timestamp: f64,
    /// Frames processed since start
    pub frames_processed: u64,
    /// Wall-clock seconds since the pipeline started
    pub uptime_secs: f64,
    /// Vehicles detected in this frame
    pub vehicle_count: usize,
    /// Detections accumulated across all frames
    pub total_detections: u64,
    /// Parking violations recorded since start
    pub parking_violations: u64,
    /// Red-light violations recorded since start
    pub red_light_violations: u64,
    /// Junction signal state at publish time
    pub junction: JunctionState,
    /// Unresolved violations, oldest first
    pub active_violations: Vec<Violation>,
    /// False once the loop has shut down
    pub running: bool,
}

/// Thread-safe holder of the latest `FrameSnapshot`.
///
/// Exactly one writer (the production loop) swaps a fresh `Arc` in; any
/// number of readers clone the current one out. A reader holding an old
/// `Arc` keeps a stale-but-consistent snapshot, never a torn one.
pub struct FrameState {
    slot: Mutex<Arc<FrameSnapshot>>,
}

impl FrameState {
    pub fn new(initial: FrameSnapshot) -> Self {
        Self {
            slot: Mutex::new(Arc::new(initial)),
        }
    }

    /// Publish a fully-built snapshot, replacing the previous one
    pub fn publish(&self, snapshot: FrameSnapshot) {
        // The critical section is a pointer swap; recover on poison since
        // no writer mutates the snapshot while holding the lock
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(snapshot);
    }

    /// Latest published snapshot
    pub fn latest(&self) -> Arc<FrameSnapshot> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
