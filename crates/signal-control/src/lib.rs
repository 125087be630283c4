//! Four-Way Signal Control
//!
//! Adaptive traffic signal state machine for a four-lane junction:
//! - Density-driven green durations (fuzzy inference with a deterministic
//!   linear fallback behind one strategy trait)
//! - Fixed round-robin lane order with elapsed-time-driven transitions
//! - Emergency preemption with activation cooldown

pub mod controller;
pub mod lane;
pub mod timing;

pub use controller::{EmergencyOutcome, JunctionController, SignalConfig};
pub use lane::{JunctionState, Lane, LaneState, LightState};
pub use timing::{FuzzyGreenTime, GreenTimeStrategy, LinearGreenTime};

use thiserror::Error;

/// Signal control errors
#[derive(Debug, Clone, Error)]
pub enum SignalError {
    /// Lane name did not parse (control surface input)
    #[error("Invalid lane name: {0:?} (expected north, east, south or west)")]
    InvalidLane(String),

    /// Vehicle count outside the accepted range
    #[error("Vehicle count {0} exceeds maximum {1}")]
    CountOutOfRange(u32, u32),
}
