//! Per-frame detection records

use serde::{Deserialize, Serialize};
use zone_geometry::Aabb;

/// Detector class ids (stable across the vehicle model's label map)
pub mod class_id {
    pub const CAR: u32 = 2;
    pub const MOTORCYCLE: u32 = 3;
    pub const BUS: u32 = 5;
    pub const TRUCK: u32 = 7;
    pub const AMBULANCE: u32 = 8;
}

/// One tracked vehicle observation from the detector.
///
/// Produced by the (out-of-scope) neural detector per frame. `track_id` is
/// stable while tracking succeeds and -1 when the tracker lost the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Tracker id, -1 when untracked
    pub track_id: i64,
    /// Detector class id
    pub class_id: u32,
    /// Bounding box in frame pixel coordinates
    pub bbox: Aabb,
    /// Box centroid (pixels)
    pub centroid: (f32, f32),
    /// Box area (pixels squared)
    pub area_px: f32,
    /// Raw tracker speed (pixels per second)
    pub speed_px_per_sec: f32,
    /// Calibrated speed (km/h), depends on per-camera scale
    pub speed_kmh: f32,
    /// Detector-side speeding flag
    pub is_speeding: bool,
    /// OCR plate text when a plate read succeeded
    pub plate_text: Option<String>,
    /// Pipeline timestamp of the observation (seconds)
    pub timestamp: f64,
}

impl Detection {
    /// Whether the tracker has a stable identity for this vehicle
    pub fn is_tracked(&self) -> bool {
        self.track_id >= 0
    }

    /// Whether this detection is an emergency vehicle
    pub fn is_emergency_vehicle(&self) -> bool {
        self.class_id == class_id::AMBULANCE
    }
}

/// One frame's worth of perception output
#[derive(Debug, Clone)]
pub struct FrameInput {
    /// Ordered detections for this frame
    pub detections: Vec<Detection>,
    /// Frame width (pixels)
    pub frame_width: u32,
    /// Frame height (pixels)
    pub frame_height: u32,
    /// Pipeline clock at capture (seconds)
    pub timestamp: f64,
    /// Frame sequence number
    pub sequence: u64,
}

impl FrameInput {
    /// Count of vehicles other than the given track (traffic-impact input)
    pub fn other_vehicle_count(&self, track_id: i64) -> usize {
        self.detections
            .iter()
            .filter(|d| d.track_id != track_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zone_geometry::Aabb;

    fn detection(track_id: i64) -> Detection {
        Detection {
            track_id,
            class_id: class_id::CAR,
            bbox: Aabb::new(0.0, 0.0, 10.0, 10.0),
            centroid: (5.0, 5.0),
            area_px: 100.0,
            speed_px_per_sec: 0.0,
            speed_kmh: 0.0,
            is_speeding: false,
            plate_text: None,
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_untracked_flag() {
        assert!(!detection(-1).is_tracked());
        assert!(detection(7).is_tracked());
    }

    #[test]
    fn test_other_vehicle_count() {
        let frame = FrameInput {
            detections: vec![detection(1), detection(2), detection(3)],
            frame_width: 1280,
            frame_height: 720,
            timestamp: 0.0,
            sequence: 0,
        };
        assert_eq!(frame.other_vehicle_count(2), 2);
        assert_eq!(frame.other_vehicle_count(99), 3);
    }

    #[test]
    fn test_ambulance_class() {
        let mut d = detection(1);
        d.class_id = class_id::AMBULANCE;
        assert!(d.is_emergency_vehicle());
    }
}
