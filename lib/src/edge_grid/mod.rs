//! EdgeGrid - Spatial acceleration structure for polygon edge queries.
//!
//! Boundary segments of closed contours are bucketed into a uniform grid of
//! square cells. A segment is registered in every cell it touches, so any
//! query that walks the cells of a probe segment (or of a search square)
//! sees every stored segment that could interact with it.
//!
//! # Key Features
//!
//! - Fast "does this segment cross the boundary" tests
//! - All boundary crossings along a segment, ordered from its start
//! - Closest point on the boundary within a search radius
//!
//! # Example
//!
//! ```
//! use lightning_infill::edge_grid::EdgeGrid;
//! use lightning_infill::geometry::{Point, Polygon};
//!
//! let square = Polygon::rectangle(Point::new(0, 0), Point::new(1_000_000, 1_000_000));
//! let grid = EdgeGrid::from_polygons(&[square], 100_000); // 0.1mm resolution
//!
//! assert!(grid.intersects_segment(&Point::new(500_000, -100_000), &Point::new(500_000, 500_000)));
//! ```

use crate::geometry::{BoundingBox, ExPolygon, Line, Point, Polygon};
use crate::{Coord, CoordF};
use std::collections::HashSet;

/// A closed contour: the last point connects back to the first.
#[derive(Clone, Debug)]
pub struct Contour {
    points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn from_polygon(polygon: &Polygon) -> Self {
        Self::new(polygon.points().to_vec())
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of segments, including the closing one.
    pub fn num_segments(&self) -> usize {
        if self.points.len() < 2 {
            0
        } else {
            self.points.len()
        }
    }

    /// Get a segment as a Line.
    pub fn segment(&self, idx: usize) -> Line {
        let next = if idx + 1 >= self.points.len() { 0 } else { idx + 1 };
        Line::new(self.points[idx], self.points[next])
    }

    pub fn segments(&self) -> impl Iterator<Item = Line> + '_ {
        (0..self.num_segments()).map(move |i| self.segment(i))
    }
}

/// A cell in the edge grid: a range into `cell_data`.
#[derive(Clone, Copy, Debug, Default)]
struct Cell {
    begin: usize,
    end: usize,
}

/// Result of a closest point query.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosestPointResult {
    /// Index of the contour.
    pub contour_idx: usize,
    /// Index of the segment within the contour.
    pub segment_idx: usize,
    /// Distance from the query point.
    pub distance: CoordF,
    /// Parameter of the closest point on the segment, in [0, 1].
    pub t: CoordF,
    /// The closest point itself.
    pub point: Point,
}

/// A crossing between a probe segment and a stored boundary segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Intersection {
    /// Index of the contour (boundary polygon).
    pub contour_idx: usize,
    /// Index of the segment within the contour.
    pub segment_idx: usize,
    /// The intersection point.
    pub point: Point,
    /// Distance from the start of the probe segment.
    pub distance: CoordF,
}

/// EdgeGrid - A spatial acceleration structure for polygon edges.
///
/// The grid divides the bounding box into cells and stores which polygon edges
/// pass through each cell, in CSR layout (`cells` index into `cell_data`).
#[derive(Clone, Debug, Default)]
pub struct EdgeGrid {
    /// Bounding box of the grid.
    bbox: BoundingBox,
    /// Resolution (cell size) in scaled coordinates.
    resolution: Coord,
    rows: usize,
    cols: usize,
    contours: Vec<Contour>,
    /// (contour_idx, segment_idx) pairs.
    cell_data: Vec<(usize, usize)>,
    cells: Vec<Cell>,
}

impl EdgeGrid {
    /// Create an EdgeGrid from polygons with the given resolution.
    pub fn from_polygons(polygons: &[Polygon], resolution: Coord) -> Self {
        let contours = polygons
            .iter()
            .filter(|p| p.len() >= 2)
            .map(Contour::from_polygon)
            .collect();
        Self::from_contours(contours, resolution)
    }

    /// Create an EdgeGrid over every contour and hole of `expolygons`.
    pub fn from_expolygons(expolygons: &[ExPolygon], resolution: Coord) -> Self {
        let contours = expolygons
            .iter()
            .flat_map(ExPolygon::polygons)
            .filter(|p| p.len() >= 2)
            .map(Contour::from_polygon)
            .collect();
        Self::from_contours(contours, resolution)
    }

    fn from_contours(contours: Vec<Contour>, resolution: Coord) -> Self {
        let mut grid = Self {
            bbox: BoundingBox::new(),
            resolution: resolution.max(1),
            rows: 0,
            cols: 0,
            contours,
            cell_data: Vec::new(),
            cells: Vec::new(),
        };
        grid.build();
        grid
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn resolution(&self) -> Coord {
        self.resolution
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bucket every segment into the cells it touches.
    fn build(&mut self) {
        for contour in &self.contours {
            for p in contour.points() {
                self.bbox.merge_point(*p);
            }
        }
        if !self.bbox.is_defined() {
            return;
        }

        // One cell of margin so boundary points never sit on the last cell edge
        self.bbox.expand(self.resolution);
        let size = self.bbox.size();
        self.cols = ((size.x + self.resolution - 1) / self.resolution).max(1) as usize;
        self.rows = ((size.y + self.resolution - 1) / self.resolution).max(1) as usize;

        let num_cells = self.rows * self.cols;
        let mut counts = vec![0usize; num_cells];
        for contour in &self.contours {
            for line in contour.segments() {
                self.visit_segment_cells(&line, |cell| {
                    counts[cell] += 1;
                    true
                });
            }
        }

        self.cells = Vec::with_capacity(num_cells);
        let mut offset = 0;
        for count in &counts {
            self.cells.push(Cell {
                begin: offset,
                end: offset,
            });
            offset += count;
        }

        let mut cells = std::mem::take(&mut self.cells);
        let mut cell_data = vec![(0, 0); offset];
        for (contour_idx, contour) in self.contours.iter().enumerate() {
            for (segment_idx, line) in contour.segments().enumerate() {
                self.visit_segment_cells(&line, |cell| {
                    cell_data[cells[cell].end] = (contour_idx, segment_idx);
                    cells[cell].end += 1;
                    true
                });
            }
        }
        self.cells = cells;
        self.cell_data = cell_data;
    }

    /// Column (x) or row (y) index of a coordinate, unclamped.
    #[inline]
    fn cell_coord(&self, v: Coord, origin: Coord) -> i64 {
        (v - origin).div_euclid(self.resolution)
    }

    /// Visit every cell a segment touches, clipped to the grid.
    ///
    /// The traversal is conservative: for each row band the segment spans,
    /// the whole column range covered within that band is visited, padded by
    /// one unit, so cells touched only at a corner are included. The visitor
    /// returns `false` to stop early.
    fn visit_segment_cells<F>(&self, line: &Line, mut visitor: F)
    where
        F: FnMut(usize) -> bool,
    {
        if self.rows == 0 || self.cols == 0 {
            return;
        }

        let (a, b) = (line.a, line.b);
        let min = self.bbox.min;
        let (y_lo, y_hi) = (a.y.min(b.y), a.y.max(b.y));

        let row_first = self.cell_coord(y_lo, min.y).max(0);
        let row_last = self.cell_coord(y_hi, min.y).min(self.rows as i64 - 1);
        if row_first > row_last {
            return;
        }

        let dx = (b.x - a.x) as CoordF;
        let dy = (b.y - a.y) as CoordF;

        for row in row_first..=row_last {
            let band_lo = (min.y + row * self.resolution).max(y_lo);
            let band_hi = (min.y + (row + 1) * self.resolution).min(y_hi);

            let (x0, x1) = if dy == 0.0 {
                (a.x.min(b.x) as CoordF, a.x.max(b.x) as CoordF)
            } else {
                let xa = a.x as CoordF + (band_lo - a.y) as CoordF * dx / dy;
                let xb = a.x as CoordF + (band_hi - a.y) as CoordF * dx / dy;
                (xa.min(xb), xa.max(xb))
            };

            let col_first = self
                .cell_coord(x0.floor() as Coord - 1, min.x)
                .max(0);
            let col_last = self
                .cell_coord(x1.ceil() as Coord + 1, min.x)
                .min(self.cols as i64 - 1);

            for col in col_first..=col_last {
                if !visitor(row as usize * self.cols + col as usize) {
                    return;
                }
            }
        }
    }

    fn cell_entries(&self, cell: usize) -> &[(usize, usize)] {
        match self.cells.get(cell) {
            Some(c) => &self.cell_data[c.begin..c.end],
            None => &[],
        }
    }

    /// Get the stored segment for a (contour, segment) pair.
    pub fn segment(&self, contour_idx: usize, segment_idx: usize) -> Line {
        self.contours[contour_idx].segment(segment_idx)
    }

    /// Check if segment `p1`-`p2` touches or crosses any stored edge.
    pub fn intersects_segment(&self, p1: &Point, p2: &Point) -> bool {
        let line = Line::new(*p1, *p2);
        let mut found = false;

        self.visit_segment_cells(&line, |cell| {
            found = self
                .cell_entries(cell)
                .iter()
                .any(|&(ci, si)| line.intersects(&self.segment(ci, si)));
            !found
        });

        found
    }

    /// Check if segment `p1`-`p2` crosses the boundary away from its ends.
    ///
    /// Crossings closer than `tolerance` to either endpoint are ignored, so a
    /// segment that merely starts or ends on the boundary does not count.
    pub fn crosses_segment(&self, p1: &Point, p2: &Point, tolerance: Coord) -> bool {
        let line = Line::new(*p1, *p2);
        let tol_sq = tolerance as i128 * tolerance as i128;
        let mut found = false;

        self.visit_segment_cells(&line, |cell| {
            found = self.cell_entries(cell).iter().any(|&(ci, si)| {
                line.intersection(&self.segment(ci, si)).map_or(false, |x| {
                    x.distance_squared(p1) > tol_sq && x.distance_squared(p2) > tol_sq
                })
            });
            !found
        });

        found
    }

    /// All crossings between segment `p1`-`p2` and stored edges, sorted by
    /// distance from `p1`.
    pub fn segment_crossings(&self, p1: &Point, p2: &Point) -> Vec<Intersection> {
        let line = Line::new(*p1, *p2);
        let mut seen = HashSet::new();
        let mut intersections = Vec::new();

        self.visit_segment_cells(&line, |cell| {
            for &(contour_idx, segment_idx) in self.cell_entries(cell) {
                if !seen.insert((contour_idx, segment_idx)) {
                    continue;
                }
                if let Some(point) = line.intersection(&self.segment(contour_idx, segment_idx)) {
                    intersections.push(Intersection {
                        contour_idx,
                        segment_idx,
                        point,
                        distance: p1.distance(&point),
                    });
                }
            }
            true
        });

        intersections.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        intersections
    }

    /// Find the closest point on any edge strictly within `search_radius`.
    pub fn closest_point(&self, query: &Point, search_radius: Coord) -> Option<ClosestPointResult> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }

        let min = self.bbox.min;
        let col_first = self.cell_coord(query.x - search_radius, min.x).max(0);
        let col_last = self
            .cell_coord(query.x + search_radius, min.x)
            .min(self.cols as i64 - 1);
        let row_first = self.cell_coord(query.y - search_radius, min.y).max(0);
        let row_last = self
            .cell_coord(query.y + search_radius, min.y)
            .min(self.rows as i64 - 1);

        let radius_sq = search_radius as CoordF * search_radius as CoordF;
        let mut best: Option<(CoordF, usize, usize)> = None;
        let mut seen = HashSet::new();

        for row in row_first..=row_last {
            for col in col_first..=col_last {
                let cell = row as usize * self.cols + col as usize;
                for &(ci, si) in self.cell_entries(cell) {
                    if !seen.insert((ci, si)) {
                        continue;
                    }
                    let d = self.segment(ci, si).distance_to_point_squared(query);
                    if d < radius_sq && best.map_or(true, |(bd, _, _)| d < bd) {
                        best = Some((d, ci, si));
                    }
                }
            }
        }

        best.map(|(d, contour_idx, segment_idx)| {
            let line = self.segment(contour_idx, segment_idx);
            let point = line.project_point(query);
            let len = line.length();
            let t = if len > 0.0 {
                line.a.distance(&point) / len
            } else {
                0.0
            };
            ClosestPointResult {
                contour_idx,
                segment_idx,
                distance: d.sqrt(),
                t,
                point,
            }
        })
    }
}
