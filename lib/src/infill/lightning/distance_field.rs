//! Sampled field of the points of a layer that still need support.

use super::InfillOutline;
use crate::geometry::{ExPolygon, Point};
use crate::Coord;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// Number of samples per supporting radius along each axis.
pub(crate) const SAMPLES_PER_RADIUS: Coord = 6;

/// Modulus of the location hash used to order samples at similar depth.
const HASH_BUCKETS: i64 = 191;

/// Grid spacing of the field for a given supporting radius.
pub(crate) fn sample_cell_size(supporting_radius: Coord) -> Coord {
    (supporting_radius / SAMPLES_PER_RADIUS).max(1)
}

/// A sample point and its distance to the outline boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsupportedCell {
    pub location: Point,
    pub dist_to_boundary: Coord,
}

/// The points of a layer's overhang not yet within the supporting radius of
/// any tree branch.
///
/// Samples sit at the centres of a regular grid. They are ordered once at
/// construction (roughly from the boundary inward) and then only ever
/// removed, so the field drains monotonically.
#[derive(Clone, Debug)]
pub struct UnsupportedAreaField {
    cell_size: Coord,
    supporting_radius: Coord,
    origin: Point,
    cells: Vec<UnsupportedCell>,
    erased: Vec<bool>,
    /// Grid address of each remaining sample, into `cells`.
    grid: HashMap<(Coord, Coord), usize>,
    cursor: usize,
    remaining: usize,
}

impl UnsupportedAreaField {
    /// Sample `overhang` (clipped to `outline`) with spacing
    /// `supporting_radius / 6`.
    pub fn new(supporting_radius: Coord, outline: &InfillOutline, overhang: &[ExPolygon]) -> Self {
        let cell_size = sample_cell_size(supporting_radius);
        let origin = if outline.bbox().is_defined() {
            outline.bbox().min
        } else {
            Point::zero()
        };

        let mut field = Self {
            cell_size,
            supporting_radius,
            origin,
            cells: Vec::new(),
            erased: Vec::new(),
            grid: HashMap::new(),
            cursor: 0,
            remaining: 0,
        };
        if outline.is_empty() {
            return field;
        }

        let mut sampled = HashSet::new();
        let mut locations = Vec::new();
        for ex in overhang {
            let bbox = ex.bounding_box();
            if !bbox.is_defined() {
                continue;
            }
            let (x0, y0) = field.address(&bbox.min);
            let (x1, y1) = field.address(&bbox.max);
            for ay in y0..=y1 {
                for ax in x0..=x1 {
                    let p = field.cell_center(ax, ay);
                    if sampled.contains(&(ax, ay)) || !ex.contains_point(&p) || !outline.contains(&p) {
                        continue;
                    }
                    sampled.insert((ax, ay));
                    locations.push(p);
                }
            }
        }

        let mut cells: Vec<UnsupportedCell> = locations
            .par_iter()
            .map(|p| UnsupportedCell {
                location: *p,
                dist_to_boundary: outline.distance_to_boundary(p).round() as Coord,
            })
            .collect();

        let radius = supporting_radius.max(1);
        cells.sort_by_key(|c| {
            (
                c.dist_to_boundary / radius,
                location_hash(&c.location),
                c.location.y,
                c.location.x,
            )
        });

        field.grid = cells
            .iter()
            .enumerate()
            .map(|(idx, c)| (field.address(&c.location), idx))
            .collect();
        field.erased = vec![false; cells.len()];
        field.remaining = cells.len();
        field.cells = cells;
        field
    }

    #[inline]
    fn address(&self, p: &Point) -> (Coord, Coord) {
        (
            (p.x - self.origin.x).div_euclid(self.cell_size),
            (p.y - self.origin.y).div_euclid(self.cell_size),
        )
    }

    #[inline]
    fn cell_center(&self, ax: Coord, ay: Coord) -> Point {
        Point::new(
            self.origin.x + ax * self.cell_size + self.cell_size / 2,
            self.origin.y + ay * self.cell_size + self.cell_size / 2,
        )
    }

    pub fn cell_size(&self) -> Coord {
        self.cell_size
    }

    pub fn supporting_radius(&self) -> Coord {
        self.supporting_radius
    }

    /// Number of samples taken at construction.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of samples still uncovered.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Uncovered samples, in field order.
    pub fn cells(&self) -> impl Iterator<Item = &UnsupportedCell> {
        self.cells
            .iter()
            .zip(&self.erased)
            .filter(|(_, erased)| !**erased)
            .map(|(c, _)| c)
    }

    /// First uncovered sample, or `None` once everything is supported.
    pub fn next_point(&mut self) -> Option<Point> {
        while self.cursor < self.cells.len() && self.erased[self.cursor] {
            self.cursor += 1;
        }
        self.cells.get(self.cursor).map(|c| c.location)
    }

    /// Mark as covered every sample within the supporting radius of the
    /// branch `from`-`to`: the disc around `to` plus the band of half-width R
    /// along the segment.
    pub fn update(&mut self, from: &Point, to: &Point) {
        let radius = self.supporting_radius;
        let (x0, y0) = self.address(&Point::new(from.x.min(to.x) - radius, from.y.min(to.y) - radius));
        let (x1, y1) = self.address(&Point::new(from.x.max(to.x) + radius, from.y.max(to.y) + radius));

        let r_sq = radius as i128 * radius as i128;
        let ab = *to - *from;
        let ab_len_sq = ab.length_squared();

        for ay in y0..=y1 {
            for ax in x0..=x1 {
                let Some(&idx) = self.grid.get(&(ax, ay)) else {
                    continue;
                };
                let p = self.cells[idx].location;

                let in_disc = p.distance_squared(to) <= r_sq;
                let in_band = ab_len_sq > 0 && {
                    let ap = p - *from;
                    let t = ap.dot(&ab);
                    let cross = ab.cross(&ap);
                    (0..=ab_len_sq).contains(&t) && cross * cross <= r_sq * ab_len_sq
                };

                if in_disc || in_band {
                    self.grid.remove(&(ax, ay));
                    self.erased[idx] = true;
                    self.remaining -= 1;
                }
            }
        }
    }
}

/// Deterministic scatter of sample locations.
fn location_hash(p: &Point) -> i64 {
    (89_i64
        .wrapping_mul(31)
        .wrapping_add(p.x)
        .wrapping_mul(31)
        .wrapping_add(p.y))
    .rem_euclid(HASH_BUCKETS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;

    fn square_outline(min: Coord, max: Coord) -> (InfillOutline, Vec<ExPolygon>) {
        let ex = ExPolygon::new(Polygon::rectangle(Point::new(min, min), Point::new(max, max)));
        (InfillOutline::new(vec![ex.clone()]), vec![ex])
    }

    #[test]
    fn test_samples_on_grid() {
        // R = 60 gives a 10 unit grid; the bbox min puts centres on multiples of 10
        let (outline, overhang) = square_outline(-105, 305);
        let field = UnsupportedAreaField::new(60, &outline, &overhang);

        assert_eq!(field.cell_size(), 10);
        assert_eq!(field.len(), 41 * 41);
        assert!(field.cells().all(|c| c.location.x % 10 == 0 && c.location.y % 10 == 0));
    }

    #[test]
    fn test_update_covers_branch_footprint() {
        let (outline, overhang) = square_outline(-105, 305);
        let mut field = UnsupportedAreaField::new(60, &outline, &overhang);
        let has = |f: &UnsupportedAreaField, p: Point| f.cells().any(|c| c.location == p);

        assert!(has(&field, Point::new(0, 50)));
        assert!(has(&field, Point::new(200, 50)));

        let before = field.remaining();
        field.update(&Point::new(0, 0), &Point::new(0, 100));

        assert!(!has(&field, Point::new(0, 50)));
        assert!(!has(&field, Point::new(50, 50)));
        assert!(!has(&field, Point::new(0, 150)));
        assert!(has(&field, Point::new(200, 50)));
        assert!(has(&field, Point::new(0, -100)));
        assert_eq!(field.remaining(), field.cells().count());
        assert!(field.remaining() < before);
    }

    #[test]
    fn test_update_is_monotonic() {
        let (outline, overhang) = square_outline(-105, 305);
        let mut field = UnsupportedAreaField::new(60, &outline, &overhang);

        field.update(&Point::new(100, 100), &Point::new(100, 100));
        let after_first = field.remaining();
        field.update(&Point::new(100, 100), &Point::new(100, 100));
        assert_eq!(field.remaining(), after_first);
    }

    #[test]
    fn test_drains_to_exhaustion() {
        let (outline, overhang) = square_outline(0, 1000);
        let mut field = UnsupportedAreaField::new(200, &outline, &overhang);
        let total = field.len();
        assert!(total > 0);

        let mut steps = 0;
        while let Some(p) = field.next_point() {
            field.update(&p, &p);
            steps += 1;
            assert!(steps <= total);
        }
        assert!(field.is_exhausted());
        assert!(field.next_point().is_none());
    }

    #[test]
    fn test_order_starts_near_boundary() {
        let (outline, overhang) = square_outline(0, 1000);
        let mut field = UnsupportedAreaField::new(200, &outline, &overhang);
        let first = field.next_point().unwrap();
        let d = outline.distance_to_boundary(&first);
        assert!(d < 200.0);
    }

    #[test]
    fn test_order_is_deterministic() {
        let (outline, overhang) = square_outline(0, 1000);
        let a: Vec<_> = UnsupportedAreaField::new(200, &outline, &overhang).cells().copied().collect();
        let b: Vec<_> = UnsupportedAreaField::new(200, &outline, &overhang).cells().copied().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_inputs() {
        let (outline, _) = square_outline(0, 1000);
        let mut field = UnsupportedAreaField::new(200, &outline, &[]);
        assert!(field.is_empty());
        assert!(field.next_point().is_none());

        let mut field = UnsupportedAreaField::new(200, &InfillOutline::default(), &[]);
        assert!(field.next_point().is_none());
    }

    #[test]
    fn test_overhang_outside_outline_not_sampled() {
        let (outline, _) = square_outline(0, 1000);
        let (_, far) = square_outline(5000, 6000);
        let field = UnsupportedAreaField::new(200, &outline, &far);
        assert!(field.is_empty());
    }
}
