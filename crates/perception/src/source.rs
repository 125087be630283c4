//! Frame sources
//!
//! The production loop pulls frames through `FrameSource` so the real
//! capture/detector stack and the simulated source are interchangeable.

use crate::detection::{class_id, Detection, FrameInput};
use crate::PerceptionError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use zone_geometry::Aabb;

/// A pull-based source of perception frames.
///
/// `next_frame` returns `Ok(None)` when the source is exhausted. `close`
/// releases any externally-held capture handle and must be safe to call
/// more than once.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<FrameInput>, PerceptionError>;

    fn close(&mut self);
}

/// Simulated traffic feed for development and tests.
///
/// Emits frames at a fixed simulated interval with a varying number of
/// tracked vehicles drifting down the frame, so the whole pipeline runs
/// without a camera or detector attached.
pub struct SimulatedTraffic {
    rng: StdRng,
    frame_width: u32,
    frame_height: u32,
    frame_interval: f64,
    clock: f64,
    sequence: u64,
    max_frames: Option<u64>,
    closed: bool,
}

impl SimulatedTraffic {
    pub fn new(seed: u64) -> Self {
        info!("Creating simulated traffic source (seed {})", seed);
        Self {
            rng: StdRng::seed_from_u64(seed),
            frame_width: 1280,
            frame_height: 720,
            frame_interval: 0.1,
            clock: 0.0,
            sequence: 0,
            max_frames: None,
            closed: false,
        }
    }

    /// Limit the source to a fixed number of frames (tests, demos)
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    fn synth_detection(&mut self, slot: u32) -> Detection {
        let track_id = slot as i64 + 1;
        let speed_px = self.rng.gen_range(0.0..120.0f32);
        let x = 100.0 + 150.0 * slot as f32;
        let y = (self.clock as f32 * speed_px) % self.frame_height as f32;
        let bbox = Aabb::new(x, y, 80.0, 60.0);

        Detection {
            track_id,
            class_id: class_id::CAR,
            centroid: bbox.center(),
            area_px: bbox.area(),
            bbox,
            speed_px_per_sec: speed_px,
            speed_kmh: speed_px * 0.18,
            is_speeding: false,
            plate_text: None,
            timestamp: self.clock,
        }
    }
}

impl FrameSource for SimulatedTraffic {
    fn next_frame(&mut self) -> Result<Option<FrameInput>, PerceptionError> {
        if self.closed {
            return Err(PerceptionError::SourceClosed);
        }
        if let Some(max) = self.max_frames {
            if self.sequence >= max {
                return Ok(None);
            }
        }

        let count = self.rng.gen_range(0..=6u32);
        let detections = (0..count).map(|slot| self.synth_detection(slot)).collect();

        let frame = FrameInput {
            detections,
            frame_width: self.frame_width,
            frame_height: self.frame_height,
            timestamp: self.clock,
            sequence: self.sequence,
        };

        self.clock += self.frame_interval;
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if !self.closed {
            info!("Simulated traffic source closed after {} frames", self.sequence);
            self.closed = true;
        }
    }
}
