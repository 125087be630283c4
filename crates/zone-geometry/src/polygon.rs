//! Polygon containment and overlap

use crate::GeometryError;
use serde::{Deserialize, Serialize};

/// A point in frame pixel coordinates
pub type Point = (f32, f32);

/// Grid resolution for overlap sampling (8x8 = 64 samples per box)
const OVERLAP_GRID: u32 = 8;

/// Axis-aligned bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Center point of the box
    pub fn center(&self) -> Point {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Lowest edge in image coordinates (largest y)
    pub fn bottom_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Check that a polygon is usable as a zone boundary
pub fn validate_polygon(polygon: &[Point]) -> Result<(), GeometryError> {
    if polygon.len() < 3 {
        return Err(GeometryError::DegeneratePolygon(polygon.len()));
    }
    Ok(())
}

/// Ray-casting point-in-polygon test.
///
/// Counts crossings of a horizontal ray from `point` toward +x against each
/// polygon edge. Odd crossing count means inside. Points exactly on an edge
/// may fall either way, which is acceptable at pixel granularity.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (px, py) = point;
    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];

        let crosses = (yi > py) != (yj > py);
        if crosses {
            let x_at_y = (xj - xi) * (py - yi) / (yj - yi) + xi;
            if px < x_at_y {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

/// Fraction of a bounding box that lies inside a polygon, in [0.0, 1.0].
///
/// Samples an even grid of points across the box and counts containment.
/// Coarse but stable: large vehicles straddling a tight zone boundary get
/// a smooth ratio instead of a brittle all-or-nothing centroid test.
pub fn overlap_ratio(bbox: &Aabb, polygon: &[Point]) -> f32 {
    if polygon.len() < 3 || bbox.width <= 0.0 || bbox.height <= 0.0 {
        return 0.0;
    }

    let mut hits = 0u32;
    let total = OVERLAP_GRID * OVERLAP_GRID;

    for gy in 0..OVERLAP_GRID {
        for gx in 0..OVERLAP_GRID {
            // Sample at cell centers so a 1-cell box still probes its middle
            let sx = bbox.x + bbox.width * (gx as f32 + 0.5) / OVERLAP_GRID as f32;
            let sy = bbox.y + bbox.height * (gy as f32 + 0.5) / OVERLAP_GRID as f32;
            if point_in_polygon((sx, sy), polygon) {
                hits += 1;
            }
        }
    }

    hits as f32 / total as f32
}
