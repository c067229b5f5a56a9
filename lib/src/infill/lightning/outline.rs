//! The fillable area of one layer.

use crate::edge_grid::EdgeGrid;
use crate::geometry::{BoundingBox, ExPolygon, ExPolygons, Point, Polygon};
use crate::{Coord, CoordF};

/// Infill outline of one layer: the area lightning lines may occupy.
#[derive(Clone, Debug, Default)]
pub struct InfillOutline {
    expolygons: ExPolygons,
    bbox: BoundingBox,
}

impl InfillOutline {
    pub fn new(expolygons: ExPolygons) -> Self {
        let mut bbox = BoundingBox::new();
        for ex in &expolygons {
            bbox.merge(&ex.bounding_box());
        }
        Self { expolygons, bbox }
    }

    pub fn expolygons(&self) -> &[ExPolygon] {
        &self.expolygons
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn is_empty(&self) -> bool {
        self.contours().next().is_none()
    }

    /// Point-in-area test (inside a contour, outside its holes).
    pub fn contains(&self, p: &Point) -> bool {
        self.bbox.contains_point(p) && self.expolygons.iter().any(|ex| ex.contains_point(p))
    }

    /// Every usable boundary ring: contours and holes with at least 3 points.
    pub fn contours(&self) -> impl Iterator<Item = &Polygon> {
        self.expolygons
            .iter()
            .flat_map(ExPolygon::polygons)
            .filter(|p| p.len() >= 3)
    }

    /// Closest point on the boundary and its distance, by scanning every
    /// boundary segment.
    pub fn closest_boundary_point(&self, p: &Point) -> Option<(Point, CoordF)> {
        let mut best: Option<(CoordF, Point)> = None;
        for contour in self.contours() {
            for edge in contour.edges() {
                let d = edge.distance_to_point_squared(p);
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, edge.project_point(p)));
                }
            }
        }
        best.map(|(d, q)| (q, d.sqrt()))
    }

    /// Distance to the boundary, or infinity for an empty outline.
    pub fn distance_to_boundary(&self, p: &Point) -> CoordF {
        self.closest_boundary_point(p)
            .map_or(CoordF::INFINITY, |(_, d)| d)
    }

    /// Build a boundary locator over this outline.
    pub fn build_locator(&self, resolution: Coord) -> EdgeGrid {
        let polygons: Vec<Polygon> = self.contours().cloned().collect();
        EdgeGrid::from_polygons(&polygons, resolution)
    }
}

impl From<ExPolygons> for InfillOutline {
    fn from(expolygons: ExPolygons) -> Self {
        Self::new(expolygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> InfillOutline {
        let contour = Polygon::rectangle(Point::new(0, 0), Point::new(1000, 1000));
        let mut hole = Polygon::rectangle(Point::new(400, 400), Point::new(600, 600));
        hole.make_clockwise();
        InfillOutline::new(vec![ExPolygon::with_holes(contour, vec![hole])])
    }

    #[test]
    fn test_contains() {
        let outline = frame();
        assert!(outline.contains(&Point::new(100, 100)));
        assert!(!outline.contains(&Point::new(500, 500)));
        assert!(!outline.contains(&Point::new(1500, 500)));
    }

    #[test]
    fn test_closest_boundary_point() {
        let outline = frame();
        let (q, d) = outline.closest_boundary_point(&Point::new(100, 500)).unwrap();
        assert_eq!(q, Point::new(0, 500));
        assert!((d - 100.0).abs() < 1e-9);

        // Hole boundary is closer here
        let (q, _) = outline.closest_boundary_point(&Point::new(350, 500)).unwrap();
        assert_eq!(q, Point::new(400, 500));
    }

    #[test]
    fn test_degenerate_contours_skipped() {
        let sliver = Polygon::from_points(vec![Point::new(0, 0), Point::new(10, 0)]);
        let outline = InfillOutline::new(vec![ExPolygon::new(sliver)]);
        assert!(outline.is_empty());
        assert!(outline.closest_boundary_point(&Point::zero()).is_none());
        assert!(outline.distance_to_boundary(&Point::zero()).is_infinite());
    }

    #[test]
    fn test_locator_covers_holes() {
        let locator = frame().build_locator(100);
        assert_eq!(locator.contours().len(), 2);
    }
}
