//! Zone Geometry
//!
//! Pure polygon math for restriction zones:
//! - Point-in-polygon containment (ray casting)
//! - Bounding box / polygon overlap ratio (grid sampling)
//! - Polygon validation

mod polygon;

pub use polygon::{overlap_ratio, point_in_polygon, validate_polygon, Aabb, Point};

use thiserror::Error;

/// Geometry errors
#[derive(Debug, Clone, Error)]
pub enum GeometryError {
    /// Polygon has fewer than 3 vertices
    #[error("Polygon needs at least 3 vertices, got {0}")]
    DegeneratePolygon(usize),
}
