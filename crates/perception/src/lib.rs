//! Perception Interface
//!
//! Boundary types between the opaque detector/OCR collaborators and the
//! decision layer:
//! - Per-frame detection records (tracked vehicles, plates, speeds)
//! - Frame source trait with a simulated implementation
//! - Lane density source trait for the non-instrumented junction approaches

pub mod density;
pub mod detection;
pub mod source;

pub use density::{DensitySource, SimulatedDensity};
pub use detection::{class_id, Detection, FrameInput};
pub use source::{FrameSource, SimulatedTraffic};

use thiserror::Error;

/// Perception boundary errors
#[derive(Debug, Error)]
pub enum PerceptionError {
    /// Frame source exhausted or closed
    #[error("Frame source closed")]
    SourceClosed,

    /// Density provider temporarily unreachable
    #[error("Density source unavailable: {0}")]
    DensityUnavailable(String),
}
