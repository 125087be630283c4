//! Violation Engine
//!
//! Stateful compliance detection between raw perception and persisted
//! outcomes:
//! - Restriction zone registry with validated CRUD and per-frame snapshots
//! - Per-vehicle zone-dwell state machine (warning -> violation -> resolved)
//! - Red-light running detection against the live signal state
//! - Dynamic fine formula and keyed side-effect cooldowns

pub mod cooldown;
pub mod detector;
pub mod dwell;
pub mod fine;
pub mod zone;

pub use cooldown::KeyedCooldown;
pub use detector::{DetectorConfig, Violation, ViolationDetector, ViolationEvent, ViolationStatus};
pub use dwell::DwellRecord;
pub use fine::FineBreakdown;
pub use zone::{Zone, ZoneRegistry, ZoneType};

use thiserror::Error;

/// Violation engine errors
#[derive(Debug, Clone, Error)]
pub enum ViolationError {
    /// Zone polygon failed validation at registration
    #[error("Zone {zone_id} rejected: {reason}")]
    InvalidZone { zone_id: String, reason: String },

    /// Referenced zone does not exist
    #[error("Unknown zone: {0}")]
    UnknownZone(String),
}
