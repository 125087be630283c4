//! Junction Pipeline
//!
//! Wires perception, signal control, violation detection, scoring and
//! storage into one sequential production loop:
//! - One frame in: signal update, zone checks, scoring, persistence
//! - One snapshot out: single-slot `FrameState` swap for concurrent readers
//! - Cloneable handle for status reads and operator control

pub mod frame_state;
pub mod orchestrator;

pub use frame_state::{FrameSnapshot, FrameState};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle, PipelineReport};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
