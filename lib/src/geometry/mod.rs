//! Geometry primitives.
//!
//! This module provides the planar types used by the infill generator:
//! - [`Point`] - 2D point with integer coordinates (scaled)
//! - [`PointF`] - 2D point/direction with floating-point coordinates
//! - [`Line`] - Line segment between two points
//! - [`Polygon`] - Closed polygon (boundary)
//! - [`Polyline`] - Open polyline (path)
//! - [`ExPolygon`] - Polygon with holes (exterior + interior contours)
//! - [`BoundingBox`] - Axis-aligned bounding box
//!
//! ## Coordinate System
//!
//! Coordinates are scaled integers to avoid floating-point precision issues.
//! They are scaled by `SCALING_FACTOR` (1,000,000), so 1 unit = 1 nanometer.
//!
//! - Use `scale()` to convert from mm to internal units
//! - Use `unscale()` to convert from internal units to mm

mod bounding_box;
mod expolygon;
mod line;
mod point;
mod polygon;
mod polyline;

pub use bounding_box::BoundingBox;
pub use expolygon::{ExPolygon, ExPolygons};
pub use line::{Line, Lines};
pub use point::{Point, PointF, Points};
pub use polygon::{Polygon, Polygons};
pub use polyline::{Polyline, Polylines};
