//! # Lightning Infill
//!
//! A Rust implementation of the "lightning" sparse infill pattern used by
//! FDM slicers.
//!
//! Instead of filling the inside of a part with a uniform pattern, lightning
//! infill grows minimal branching trees on every layer, only where the layer
//! above (ultimately the top skin) needs to be held up. Trees are built top to
//! bottom: the finished trees of a layer are pruned, straightened and
//! re-fitted onto the outline of the layer below, where they seed the next
//! round of growth.
//!
//! This library provides:
//! - Integer (scaled) 2D geometry primitives
//! - Polygon boolean and offset operations (`clipper`)
//! - A grid-based boundary segment locator (`edge_grid`)
//! - The lightning tree generator (`infill::lightning`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use lightning_infill::geometry::{ExPolygon, Point, Polygon};
//! use lightning_infill::infill::lightning::{Generator, LightningConfig};
//! use lightning_infill::scale;
//!
//! let square = ExPolygon::from(Polygon::rectangle(
//!     Point::new(0, 0),
//!     Point::new(scale(20.0), scale(20.0)),
//! ));
//! let slices = vec![vec![square]; 10];
//!
//! let generator = Generator::new(LightningConfig::default(), &slices)?;
//! let polylines_per_layer = generator.generate_polylines();
//! ```

pub mod clipper;
pub mod edge_grid;
pub mod geometry;
pub mod infill;

// Re-export commonly used types
pub use geometry::{BoundingBox, ExPolygon, ExPolygons, Line, Point, PointF, Polygon, Polyline};

// Re-export clipper operations
pub use clipper::{difference, offset_expolygons, opening, shrink, union_ex, OffsetJoinType};

// Re-export edge grid
pub use edge_grid::{ClosestPointResult, Contour, EdgeGrid, Intersection};

// Re-export lightning infill
pub use infill::lightning::{
    Generator, GroundingLocation, InfillOutline, Layer, LightningConfig, LightningError,
    LightningParams, LightningResult, NodeId, TreeArena, UnsupportedAreaField, UnsupportedCell,
};

/// Coordinate type used throughout the library.
/// Using i64 for integer coordinates (scaled by SCALING_FACTOR) to avoid floating-point issues.
pub type Coord = i64;

/// Floating-point coordinate type for unscaled values.
pub type CoordF = f64;

/// Scaling factor: coordinates are stored as integers scaled by this factor.
/// 1 unit = 1 nanometer, so 1mm = 1_000_000 units.
pub const SCALING_FACTOR: f64 = 1_000_000.0;

/// Scale a floating-point coordinate (mm) to integer units.
#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

/// Unscale an integer coordinate to floating-point (mm).
#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling() {
        assert_eq!(scale(1.0), 1_000_000);
        assert!((unscale(1_000_000) - 1.0).abs() < 1e-10);

        // Sub-millimeter precision
        assert_eq!(scale(0.001), 1_000);
        assert_eq!(scale(0.0001), 100);
    }

    #[test]
    fn test_scale_rounds_to_nearest() {
        assert_eq!(scale(0.0000004), 0);
        assert_eq!(scale(0.0000006), 1);
        assert_eq!(scale(-0.45), -450_000);
    }
}
