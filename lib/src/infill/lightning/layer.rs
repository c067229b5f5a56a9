//! The support trees of one layer.

use super::tree::{NodeId, TreeArena};
use super::{InfillOutline, LightningParams, UnsupportedAreaField, BOUNDARY_TOLERANCE};
use crate::clipper::intersect_polylines_with_expolygons;
use crate::edge_grid::EdgeGrid;
use crate::geometry::{ExPolygon, Point, Polyline};
use crate::{Coord, CoordF};
use rand::Rng;
use std::collections::HashMap;
use tracing::trace;

/// Where a new or reconnected branch attaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundingLocation {
    /// Graft onto an existing tree node.
    Node(NodeId),
    /// Start a new tree at this point of the outline boundary.
    Boundary(Point),
}

impl GroundingLocation {
    pub fn point(&self, arena: &TreeArena) -> Point {
        match *self {
            GroundingLocation::Node(id) => arena.location(id),
            GroundingLocation::Boundary(p) => p,
        }
    }
}

/// Tree nodes bucketed by grid cell.
#[derive(Debug)]
pub(crate) struct NodeLookup {
    origin: Point,
    cell_size: Coord,
    cells: HashMap<(Coord, Coord), Vec<NodeId>>,
}

impl NodeLookup {
    fn new(outline: &InfillOutline, cell_size: Coord) -> Self {
        let origin = if outline.bbox().is_defined() {
            outline.bbox().min
        } else {
            Point::zero()
        };
        Self {
            origin,
            cell_size: cell_size.max(1),
            cells: HashMap::new(),
        }
    }

    fn fill(&mut self, arena: &TreeArena, roots: &[NodeId]) {
        for &root in roots {
            arena.visit_nodes(root, |id, node| self.insert(id, node.location()));
        }
    }

    #[inline]
    fn address(&self, p: &Point) -> (Coord, Coord) {
        (
            (p.x - self.origin.x).div_euclid(self.cell_size),
            (p.y - self.origin.y).div_euclid(self.cell_size),
        )
    }

    fn insert(&mut self, id: NodeId, location: Point) {
        let address = self.address(&location);
        self.cells.entry(address).or_default().push(id);
    }

    fn remove(&mut self, id: NodeId, location: Point) {
        let address = self.address(&location);
        if let Some(ids) = self.cells.get_mut(&address) {
            ids.retain(|&n| n != id);
        }
    }

    fn cell(&self, address: (Coord, Coord)) -> &[NodeId] {
        self.cells.get(&address).map_or(&[], Vec::as_slice)
    }
}

/// All support trees of one layer.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    arena: TreeArena,
    roots: Vec<NodeId>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arena(&self) -> &TreeArena {
        &self.arena
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn tree_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of nodes reachable from the roots.
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(|&r| self.arena.preorder(r).len()).sum()
    }

    /// Grow branches until every sample of `overhang` is within
    /// `supporting_radius` of a branch. Returns the number of branches added.
    pub fn generate_new_trees(
        &mut self,
        overhang: &[ExPolygon],
        outline: &InfillOutline,
        locator: &EdgeGrid,
        supporting_radius: Coord,
        wall_supporting_radius: Coord,
    ) -> usize {
        let mut field = UnsupportedAreaField::new(supporting_radius, outline, overhang);
        let mut lookup = NodeLookup::new(outline, locator.resolution());
        lookup.fill(&self.arena, &self.roots);

        let mut branches = 0;
        while let Some(p) = field.next_point() {
            let ground = self
                .best_grounding_location(
                    &p,
                    outline,
                    locator,
                    supporting_radius,
                    wall_supporting_radius,
                    &lookup,
                    None,
                )
                .filter(|g| g.point(&self.arena) != p);

            let Some(ground) = ground else {
                // Already on the wall
                field.update(&p, &p);
                continue;
            };

            let from = ground.point(&self.arena);
            let (child, new_root) = self.attach(p, ground);
            lookup.insert(child, p);
            if let Some(root) = new_root {
                lookup.insert(root, from);
            }
            field.update(&from, &p);
            branches += 1;
        }

        branches
    }

    /// Pick where `p` should attach: the nearest boundary point, or an
    /// existing node with a smaller weighted distance reachable without
    /// crossing the boundary.
    ///
    /// Nodes are only considered when `p` is at least `wall_threshold` away
    /// from the boundary. Nodes of the tree under `exclude` are never
    /// candidates. Returns `None` for an empty outline.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn best_grounding_location(
        &self,
        p: &Point,
        outline: &InfillOutline,
        locator: &EdgeGrid,
        supporting_radius: Coord,
        wall_threshold: Coord,
        lookup: &NodeLookup,
        exclude: Option<NodeId>,
    ) -> Option<GroundingLocation> {
        let (boundary, distance) = outline.closest_boundary_point(p)?;
        let mut current = distance as Coord;
        let mut best = None;

        if current >= wall_threshold {
            let radius = current;
            let reach = radius + lookup.cell_size;
            let (x0, y0) = lookup.address(&Point::new(p.x - radius, p.y - radius));
            let (x1, y1) = lookup.address(&Point::new(p.x + reach, p.y + reach));

            for ay in y0..y1 {
                for ax in x0..x1 {
                    for &candidate in lookup.cell((ax, ay)) {
                        if exclude.map_or(false, |ex| self.arena.has_offspring(ex, candidate)) {
                            continue;
                        }
                        let location = self.arena.location(candidate);
                        if location == *p || locator.crosses_segment(p, &location, BOUNDARY_TOLERANCE) {
                            continue;
                        }
                        let d = self.arena.weighted_distance(candidate, p, supporting_radius);
                        if d < current {
                            current = d;
                            best = Some(candidate);
                        }
                    }
                }
            }
        }

        Some(best.map_or(GroundingLocation::Boundary(boundary), GroundingLocation::Node))
    }

    /// Add a branch ending at `p`. Returns the new leaf and, when grounded on
    /// the boundary, the new root.
    pub fn attach(&mut self, p: Point, ground: GroundingLocation) -> (NodeId, Option<NodeId>) {
        match ground {
            GroundingLocation::Boundary(b) => {
                let root = self.arena.new_root(b, Some(b));
                let child = self.arena.add_child(root, p);
                self.roots.push(root);
                (child, Some(root))
            }
            GroundingLocation::Node(node) => (self.arena.add_child(node, p), None),
        }
    }

    /// Re-ground the trees inherited from the layer above.
    ///
    /// A tree whose remembered grounding point lies just past the new
    /// boundary gets a new root where its root edge meets the boundary.
    /// Otherwise it is re-grounded on the nearest boundary point or grafted
    /// onto another tree, whichever is closer by weighted distance.
    pub fn reconnect_roots(
        &mut self,
        incoming: &[NodeId],
        outline: &InfillOutline,
        locator: &EdgeGrid,
        supporting_radius: Coord,
        wall_threshold: Coord,
    ) -> usize {
        let mut lookup = NodeLookup::new(outline, locator.resolution());
        lookup.fill(&self.arena, &self.roots);
        let within = (locator.resolution() * 2) as CoordF;
        let mut merged = 0;

        for &root in incoming {
            let Some(slot) = self.roots.iter().position(|&r| r == root) else {
                continue;
            };
            let root_loc = self.arena.location(root);

            if let Some(ground) = self.arena.node(root).last_grounding_location() {
                if ground != root_loc {
                    let crossing = locator
                        .segment_crossings(&root_loc, &ground)
                        .last()
                        .map(|x| x.point)
                        .filter(|pt| pt.distance(&ground) <= within);

                    if let Some(pt) = crossing {
                        if pt != root_loc {
                            let new_root = self.arena.new_root(pt, Some(pt));
                            self.arena.attach_child(new_root, root);
                            lookup.insert(new_root, pt);
                            self.roots[slot] = new_root;
                            trace!(?root_loc, ?pt, "regrounded at last grounding location");
                        }
                        continue;
                    }
                }
            }

            let ground = self.best_grounding_location(
                &root_loc,
                outline,
                locator,
                supporting_radius,
                wall_threshold,
                &lookup,
                Some(root),
            );

            match ground {
                None => {}
                Some(GroundingLocation::Boundary(b)) => {
                    if b == root_loc {
                        continue;
                    }
                    let attach = self.arena.closest_node(root, &b);
                    self.arena.reroot(attach);

                    let new_root = if self.arena.location(attach) == b {
                        self.arena.set_last_grounding_location(attach, Some(b));
                        attach
                    } else {
                        let new_root = self.arena.new_root(b, Some(b));
                        self.arena.attach_child(new_root, attach);
                        lookup.insert(new_root, b);
                        new_root
                    };
                    self.roots[slot] = new_root;
                    trace!(?root_loc, boundary = ?b, "regrounded on boundary");
                }
                Some(GroundingLocation::Node(target)) => {
                    let target_loc = self.arena.location(target);
                    let attach = self.arena.closest_node(root, &target_loc);
                    self.arena.reroot(attach);

                    if self.arena.location(attach) == target_loc {
                        // Same spot: hand the children over instead
                        for child in self.arena.children(attach).to_vec() {
                            self.arena.detach(child);
                            self.arena.attach_child(target, child);
                        }
                        lookup.remove(attach, target_loc);
                    } else {
                        self.arena.attach_child(target, attach);
                    }
                    self.roots.swap_remove(slot);
                    merged += 1;
                    trace!(?root_loc, ?target_loc, "merged into another tree");
                }
            }
        }

        merged
    }

    /// Serialize every tree into polylines.
    pub fn convert_to_polylines<R>(&self, overlap: Coord, rng: &mut R) -> Vec<Polyline>
    where
        R: Rng + ?Sized,
    {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.arena.convert_to_polylines(root, overlap, rng, &mut out);
        }
        out
    }

    /// Serialize every tree into polylines clipped to `outline`.
    pub fn convert_to_lines<R>(&self, outline: &InfillOutline, overlap: Coord, rng: &mut R) -> Vec<Polyline>
    where
        R: Rng + ?Sized,
    {
        let polylines = self.convert_to_polylines(overlap, rng);
        intersect_polylines_with_expolygons(&polylines, outline.expolygons())
    }

    /// Seed `below` with this layer's trees, fitted onto `outline`.
    pub fn propagate_into(
        &self,
        below: &mut Layer,
        outline: &InfillOutline,
        locator: &EdgeGrid,
        params: &LightningParams,
    ) {
        for &root in &self.roots {
            self.arena.propagate_to_next_layer(
                root,
                &mut below.arena,
                &mut below.roots,
                outline,
                locator,
                params.prune_length,
                params.straightening_max_distance,
                params.max_colinear_distance,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::scale;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const RADIUS: Coord = 3_000_000;
    const WALL_RADIUS: Coord = 200_000;

    fn mm(x: CoordF, y: CoordF) -> Point {
        Point::new_scale(x, y)
    }

    fn square(size: CoordF) -> (InfillOutline, Vec<ExPolygon>, EdgeGrid) {
        let ex = ExPolygon::new(Polygon::rectangle(mm(0.0, 0.0), mm(size, size)));
        let outline = InfillOutline::new(vec![ex.clone()]);
        let locator = outline.build_locator(scale(4.0));
        (outline, vec![ex], locator)
    }

    fn lookup_for(layer: &Layer, outline: &InfillOutline, locator: &EdgeGrid) -> NodeLookup {
        let mut lookup = NodeLookup::new(outline, locator.resolution());
        lookup.fill(&layer.arena, &layer.roots);
        lookup
    }

    #[test]
    fn test_generate_covers_overhang() {
        let (outline, overhang, locator) = square(20.0);
        let mut layer = Layer::new();
        let branches = layer.generate_new_trees(&overhang, &outline, &locator, RADIUS, WALL_RADIUS);

        assert!(branches > 0);
        assert!(layer.tree_count() > 0);

        let mut edges = Vec::new();
        for &root in layer.roots() {
            let root_loc = layer.arena().location(root);
            assert!(outline.distance_to_boundary(&root_loc) < 1.0);
            layer.arena().visit_branches(root, |a, b| edges.push((a, b)));
        }

        // Every sample ends up within the supporting radius of some branch
        let field = UnsupportedAreaField::new(RADIUS, &outline, &overhang);
        for cell in field.cells() {
            let nearest = edges
                .iter()
                .map(|(a, b)| cell.location.distance_to_segment_squared(*a, *b).sqrt())
                .fold(CoordF::INFINITY, CoordF::min);
            assert!(nearest <= RADIUS as CoordF + 1.0, "{:?} unsupported", cell.location);
        }
    }

    #[test]
    fn test_generate_without_overhang_adds_nothing() {
        let (outline, _, locator) = square(20.0);
        let mut layer = Layer::new();
        assert_eq!(layer.generate_new_trees(&[], &outline, &locator, RADIUS, WALL_RADIUS), 0);
        assert_eq!(layer.tree_count(), 0);
    }

    #[test]
    fn test_grounding_near_wall_uses_boundary() {
        let (outline, _, locator) = square(20.0);
        let mut layer = Layer::new();
        layer.attach(mm(2.0, 10.0), GroundingLocation::Boundary(mm(0.0, 10.0)));
        let lookup = lookup_for(&layer, &outline, &locator);

        // Inside the wall threshold: nodes are not even looked at
        let ground = layer
            .best_grounding_location(&mm(0.1, 5.0), &outline, &locator, RADIUS, WALL_RADIUS, &lookup, None)
            .unwrap();
        assert_eq!(ground, GroundingLocation::Boundary(mm(0.0, 5.0)));
    }

    #[test]
    fn test_grounding_prefers_nearby_node() {
        let (outline, _, locator) = square(20.0);
        let mut layer = Layer::new();
        let (leaf, _) = layer.attach(mm(6.0, 10.0), GroundingLocation::Boundary(mm(0.0, 10.0)));
        let lookup = lookup_for(&layer, &outline, &locator);

        let ground = layer
            .best_grounding_location(&mm(8.0, 10.0), &outline, &locator, RADIUS, WALL_RADIUS, &lookup, None)
            .unwrap();
        assert_eq!(ground, GroundingLocation::Node(leaf));

        // Excluding the tree leaves only the boundary
        let root = layer.roots()[0];
        let ground = layer
            .best_grounding_location(&mm(8.0, 10.0), &outline, &locator, RADIUS, WALL_RADIUS, &lookup, Some(root))
            .unwrap();
        assert_eq!(ground, GroundingLocation::Boundary(mm(0.0, 10.0)));
    }

    #[test]
    fn test_grounding_never_crosses_holes() {
        let contour = Polygon::rectangle(mm(0.0, 0.0), mm(20.0, 20.0));
        let mut hole = Polygon::rectangle(mm(9.0, 5.0), mm(11.0, 15.0));
        hole.make_clockwise();
        let outline = InfillOutline::new(vec![ExPolygon::with_holes(contour, vec![hole])]);
        let locator = outline.build_locator(scale(4.0));

        let mut layer = Layer::new();
        layer.attach(mm(8.5, 10.0), GroundingLocation::Boundary(mm(6.0, 0.0)));
        let lookup = lookup_for(&layer, &outline, &locator);

        // The leaf across the hole wins on weighted distance, but is unreachable
        let ground = layer
            .best_grounding_location(&mm(14.0, 10.0), &outline, &locator, RADIUS, WALL_RADIUS, &lookup, None)
            .unwrap();
        assert_eq!(ground, GroundingLocation::Boundary(mm(11.0, 10.0)));
    }

    #[test]
    fn test_attach() {
        let mut layer = Layer::new();
        let (leaf, root) = layer.attach(mm(1.0, 1.0), GroundingLocation::Boundary(mm(0.0, 1.0)));
        let root = root.unwrap();
        assert_eq!(layer.roots(), &[root]);
        assert_eq!(layer.arena().parent(leaf), Some(root));
        assert_eq!(layer.arena().node(root).last_grounding_location(), Some(mm(0.0, 1.0)));

        let (second, none) = layer.attach(mm(2.0, 2.0), GroundingLocation::Node(leaf));
        assert!(none.is_none());
        assert_eq!(layer.arena().parent(second), Some(leaf));
        assert_eq!(layer.node_count(), 3);
    }

    #[test]
    fn test_reconnect_uses_last_grounding() {
        let (outline, _, locator) = square(20.0);
        let mut layer = Layer::new();
        let root = layer.arena.new_root(mm(2.0, 10.0), Some(mm(-1.0, 10.0)));
        layer.arena.add_child(root, mm(5.0, 10.0));
        layer.roots.push(root);

        layer.reconnect_roots(&[root], &outline, &locator, RADIUS, WALL_RADIUS);

        assert_eq!(layer.tree_count(), 1);
        let new_root = layer.roots()[0];
        assert_eq!(layer.arena().location(new_root), mm(0.0, 10.0));
        assert_eq!(layer.arena().children(new_root), &[root]);
    }

    #[test]
    fn test_reconnect_regrounds_on_boundary() {
        let (outline, _, locator) = square(20.0);
        let mut layer = Layer::new();
        let root = layer.arena.new_root(mm(1.0, 10.0), None);
        layer.arena.add_child(root, mm(2.0, 10.0));
        layer.roots.push(root);

        layer.reconnect_roots(&[root], &outline, &locator, RADIUS, 0);

        let new_root = layer.roots()[0];
        assert_eq!(layer.arena().location(new_root), mm(0.0, 10.0));
        assert_eq!(layer.arena().children(new_root), &[root]);
        assert_eq!(layer.node_count(), 3);
    }

    #[test]
    fn test_reconnect_merges_trees() {
        let (outline, _, locator) = square(20.0);
        let mut layer = Layer::new();
        let (a_leaf, _) = layer.attach(mm(4.0, 10.0), GroundingLocation::Boundary(mm(0.0, 10.0)));

        let b_root = layer.arena.new_root(mm(5.0, 10.0), None);
        layer.arena.add_child(b_root, mm(5.0, 11.0));
        layer.roots.push(b_root);

        let merged = layer.reconnect_roots(&[b_root], &outline, &locator, RADIUS, WALL_RADIUS);

        assert_eq!(merged, 1);
        assert_eq!(layer.tree_count(), 1);
        assert_eq!(layer.arena().parent(b_root), Some(a_leaf));
        assert_eq!(layer.node_count(), 4);
    }

    #[test]
    fn test_convert_to_lines_stays_inside() {
        let (outline, overhang, locator) = square(20.0);
        let mut layer = Layer::new();
        layer.generate_new_trees(&overhang, &outline, &locator, RADIUS, WALL_RADIUS);

        let mut rng = StdRng::seed_from_u64(1);
        let lines = layer.convert_to_lines(&outline, scale(0.2), &mut rng);
        assert!(!lines.is_empty());
        for line in &lines {
            assert!(line.is_valid());
            for p in line.points() {
                assert!(outline.distance_to_boundary(p) < 10.0 || outline.contains(p));
            }
        }
    }

    #[test]
    fn test_propagate_into_keeps_trees_inside() {
        let (outline, overhang, locator) = square(20.0);
        let mut layer = Layer::new();
        layer.generate_new_trees(&overhang, &outline, &locator, RADIUS, WALL_RADIUS);

        // Smaller outline below
        let (below_outline, _, below_locator) = square(15.0);
        let params = crate::infill::lightning::LightningConfig::default().params().unwrap();
        let mut below = Layer::new();
        layer.propagate_into(&mut below, &below_outline, &below_locator, &params);

        for &root in below.roots() {
            assert!(!below.arena().children(root).is_empty());
            below.arena().visit_nodes(root, |_, node| {
                let p = node.location();
                assert!(below_outline.contains(&p) || below_outline.distance_to_boundary(&p) <= 10_000.0);
            });
        }
    }
}
