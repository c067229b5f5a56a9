//! Lightning support trees.
//!
//! Every tree of a layer lives in one [`TreeArena`] and nodes are addressed
//! by [`NodeId`]. A node stores its parent index and its ordered children,
//! so re-rooting a tree is a sequence of edge reversals and never moves
//! ownership around.
//!
//! All traversals run on explicit stacks: trees propagated over many layers
//! can get deep.

use super::{is_inside, InfillOutline, BOUNDARY_TOLERANCE};
use crate::edge_grid::EdgeGrid;
use crate::geometry::{Point, PointF, Polyline};
use crate::{scale, Coord, CoordF};
use rand::Rng;
use std::collections::HashMap;

/// Nodes with fewer connections than this get the valence boost.
const MAX_BOOSTED_VALENCE: usize = 4;

/// Valence boost, in supporting radii.
const VALENCE_BOOST_FACTOR: Coord = 4;

/// Index of a node in a [`TreeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One node of a support tree.
#[derive(Clone, Debug)]
pub struct Node {
    location: Point,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Where the tree last touched the outline boundary. Only meaningful on
    /// roots.
    last_grounding_location: Option<Point>,
}

impl Node {
    #[inline]
    pub fn location(&self) -> Point {
        self.location
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn last_grounding_location(&self) -> Option<Point> {
        self.last_grounding_location
    }
}

/// Result of straightening a subtree, handed to its parent.
#[derive(Clone, Copy, Debug)]
struct Junction {
    /// Path length from the junction above down to this junction.
    total_recti_dist: Coord,
    location: Point,
}

enum StraightenFrame {
    Visit {
        node: NodeId,
        above: Point,
        accumulated: Coord,
    },
    /// A pass-through node waiting for the junction below it.
    Chain {
        node: NodeId,
        above: Point,
        accumulated: Coord,
    },
    /// A branching node collecting the junctions of its children.
    Branch {
        node: NodeId,
        accumulated: Coord,
        next: usize,
        pull: PointF,
        hold: bool,
    },
}

enum PolylineFrame {
    Visit { node: NodeId, line: usize },
    Push { line: usize, point: Point },
    Branch { child: NodeId, point: Point },
}

/// Storage for the nodes of any number of support trees.
#[derive(Clone, Debug, Default)]
pub struct TreeArena {
    nodes: Vec<Node>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of node slots, including nodes no longer reachable from any
    /// root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    pub fn location(&self, id: NodeId) -> Point {
        self.nodes[id.0].location
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn set_last_grounding_location(&mut self, id: NodeId, location: Option<Point>) {
        self.nodes[id.0].last_grounding_location = location;
    }

    /// Create a detached root node.
    pub fn new_root(&mut self, location: Point, grounding: Option<Point>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            location,
            parent: None,
            children: Vec::new(),
            last_grounding_location: grounding,
        });
        id
    }

    /// Append a new leaf at `location` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `location` equals the parent's location.
    pub fn add_child(&mut self, parent: NodeId, location: Point) -> NodeId {
        assert_ne!(
            self.location(parent),
            location,
            "child created at its parent's location"
        );
        let child = self.new_root(location, None);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        child
    }

    /// Hang the root `child` (with its subtree) under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `child` is not a root, if `parent` belongs to the subtree of
    /// `child`, or if both share a location.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        assert!(self.nodes[child.0].parent.is_none(), "attached node already has a parent");
        assert!(
            !self.has_offspring(child, parent),
            "attaching a tree under its own descendant"
        );
        assert_ne!(
            self.location(parent),
            self.location(child),
            "zero-length edge"
        );
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Cut `child` off its parent, making it a root.
    pub fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != child);
        }
    }

    /// Number of edges at a node: its children plus the parent edge.
    pub fn valence(&self, id: NodeId) -> usize {
        let node = &self.nodes[id.0];
        node.children.len() + usize::from(node.parent.is_some())
    }

    /// Distance from node `id` to `p`, shortened by four supporting radii for
    /// nodes with between one and three edges.
    pub fn weighted_distance(&self, id: NodeId, p: &Point, supporting_radius: Coord) -> Coord {
        let distance = self.location(id).distance(p) as Coord;
        let valence = self.valence(id);
        let boost = if valence > 0 && valence < MAX_BOOSTED_VALENCE {
            VALENCE_BOOST_FACTOR * supporting_radius
        } else {
            0
        };
        distance - boost
    }

    /// True if `candidate` is `ancestor` or lies anywhere below it.
    pub fn has_offspring(&self, ancestor: NodeId, candidate: NodeId) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current
    }

    /// Make `id` the root of its tree by reversing every edge on the path to
    /// the old root.
    pub fn reroot(&mut self, id: NodeId) {
        let mut path = vec![id];
        while let Some(parent) = self.nodes[path[path.len() - 1].0].parent {
            path.push(parent);
        }

        for pair in path.windows(2).rev() {
            let (child, parent) = (pair[0], pair[1]);
            self.nodes[parent.0].children.retain(|&c| c != child);
            self.nodes[parent.0].parent = Some(child);
            self.nodes[child.0].children.push(parent);
        }
        self.nodes[id.0].parent = None;
    }

    /// Nodes of the tree under `root`, parents before children.
    pub fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev());
        }
        order
    }

    pub fn visit_nodes<F>(&self, root: NodeId, mut visitor: F)
    where
        F: FnMut(NodeId, &Node),
    {
        for id in self.preorder(root) {
            visitor(id, &self.nodes[id.0]);
        }
    }

    /// Call `visitor(parent_location, child_location)` for every edge.
    pub fn visit_branches<F>(&self, root: NodeId, mut visitor: F)
    where
        F: FnMut(Point, Point),
    {
        for id in self.preorder(root) {
            let node = &self.nodes[id.0];
            for &child in &node.children {
                visitor(node.location, self.location(child));
            }
        }
    }

    pub fn edge_count(&self, root: NodeId) -> usize {
        self.preorder(root).len() - 1
    }

    /// The node of the tree under `root` nearest to `p`. Ties keep the node
    /// met first in preorder.
    pub fn closest_node(&self, root: NodeId, p: &Point) -> NodeId {
        let mut best = root;
        let mut best_dist = self.location(root).distance_squared(p);
        for id in self.preorder(root) {
            let d = self.location(id).distance_squared(p);
            if d < best_dist {
                best = id;
                best_dist = d;
            }
        }
        best
    }

    /// Trim up to `budget` length off every leaf-to-root path.
    ///
    /// Leaves are removed whole while they fit in the remaining budget;
    /// otherwise the last edge is shortened by moving the child toward its
    /// parent. Returns the largest length pruned along any path.
    pub fn prune(&mut self, root: NodeId, budget: Coord) -> Coord {
        if budget <= 0 {
            return 0;
        }

        let mut pruned: HashMap<NodeId, Coord> = HashMap::new();
        for id in self.preorder(root).into_iter().rev() {
            let a = self.location(id);
            let mut max_pruned = 0;
            let mut kept = Vec::with_capacity(self.nodes[id.0].children.len());

            for child in std::mem::take(&mut self.nodes[id.0].children) {
                let child_pruned = pruned.get(&child).copied().unwrap_or(0);
                if child_pruned >= budget {
                    max_pruned = max_pruned.max(child_pruned);
                    kept.push(child);
                    continue;
                }

                let b = self.location(child);
                let ab_len = a.distance(&b) as Coord;
                if child_pruned + ab_len <= budget {
                    // Everything below was pruned already
                    max_pruned = max_pruned.max(child_pruned + ab_len);
                    self.nodes[child.0].parent = None;
                } else {
                    let moved = b.moved_toward(a, (budget - child_pruned) as CoordF);
                    if moved != a {
                        self.nodes[child.0].location = moved;
                    }
                    max_pruned = max_pruned.max(budget);
                    kept.push(child);
                }
            }

            self.nodes[id.0].children = kept;
            pruned.insert(id, max_pruned);
        }

        pruned.get(&root).copied().unwrap_or(0)
    }

    /// Smooth the tree under `root`.
    ///
    /// Pass-through nodes move (by at most `magnitude`) toward the straight
    /// line between the junctions above and below them, and are spliced out
    /// once they sit on the line between two neighbours closer than
    /// `max_colinear_distance`. Junctions move along the mean direction of
    /// their edges by at most three quarters of `magnitude`, unless one of
    /// their branches is shorter than `magnitude`.
    pub fn straighten(&mut self, root: NodeId, magnitude: Coord, max_colinear_distance: Coord) {
        let junction_magnitude = magnitude * 3 / 4;
        let pull_weight = scale(1.0) as CoordF;
        let max_colinear_sq = max_colinear_distance as i128 * max_colinear_distance as i128;
        let colinear_tol_sq = (BOUNDARY_TOLERANCE as CoordF).powi(2);

        let mut below: Option<Junction> = None;
        let mut stack = vec![StraightenFrame::Visit {
            node: root,
            above: self.location(root),
            accumulated: 0,
        }];

        while let Some(frame) = stack.pop() {
            match frame {
                StraightenFrame::Visit {
                    node,
                    above,
                    accumulated,
                } => {
                    let loc = self.location(node);
                    let children = &self.nodes[node.0].children;
                    if children.len() == 1 {
                        let child = children[0];
                        let child_dist = loc.distance(&self.location(child)) as Coord;
                        stack.push(StraightenFrame::Chain {
                            node,
                            above,
                            accumulated,
                        });
                        stack.push(StraightenFrame::Visit {
                            node: child,
                            above,
                            accumulated: accumulated + child_dist,
                        });
                    } else {
                        let pull = PointF::from(above - loc).normalize() * pull_weight;
                        stack.push(StraightenFrame::Branch {
                            node,
                            accumulated,
                            next: 0,
                            pull,
                            hold: false,
                        });
                    }
                }

                StraightenFrame::Chain {
                    node,
                    above,
                    accumulated,
                } => {
                    let Some(junction) = below else {
                        continue;
                    };
                    let loc = self.location(node);
                    let parent = self.nodes[node.0].parent;
                    let child = self.nodes[node.0].children[0];

                    let (a, b) = (above, junction.location);
                    if a != b {
                        let ab = b - a;
                        let total = junction.total_recti_dist.max(1) as i128;
                        let destination = Point::new(
                            (a.x as i128 + ab.x as i128 * accumulated as i128 / total) as Coord,
                            (a.y as i128 + ab.y as i128 * accumulated as i128 / total) as Coord,
                        );
                        let moved = loc.moved_toward(destination, magnitude as CoordF);
                        let clashes = moved == self.location(child)
                            || parent.map_or(false, |p| moved == self.location(p));
                        if !clashes {
                            self.nodes[node.0].location = moved;
                        }
                    }

                    // Splice out nodes sitting on the line between their neighbours
                    let child = self.nodes[node.0].children[0];
                    if let Some(parent) = parent {
                        let loc = self.location(node);
                        let (p, c) = (self.location(parent), self.location(child));
                        if p != c
                            && p.distance_squared(&c) < max_colinear_sq
                            && loc.distance_to_segment_squared(p, c) < colinear_tol_sq
                        {
                            self.splice_out(node, parent, child);
                        }
                    }
                    below = Some(junction);
                }

                StraightenFrame::Branch {
                    node,
                    accumulated,
                    next,
                    mut pull,
                    mut hold,
                } => {
                    let loc = self.location(node);
                    if next > 0 {
                        if let Some(junction) = below.take() {
                            pull += PointF::from(junction.location - loc).normalize() * pull_weight;
                            if junction.total_recti_dist < magnitude {
                                hold = true;
                            }
                        }
                    }

                    let children = &self.nodes[node.0].children;
                    if let Some(&child) = children.get(next) {
                        let child_dist = loc.distance(&self.location(child)) as Coord;
                        stack.push(StraightenFrame::Branch {
                            node,
                            accumulated,
                            next: next + 1,
                            pull,
                            hold,
                        });
                        stack.push(StraightenFrame::Visit {
                            node: child,
                            above: loc,
                            accumulated: child_dist,
                        });
                        continue;
                    }

                    let movable = !children.is_empty() && !self.nodes[node.0].is_root() && !hold;
                    if movable && pull.round() != Point::zero() {
                        let len = pull.length();
                        if len > junction_magnitude as CoordF {
                            pull = pull * (junction_magnitude as CoordF / len);
                        }
                        let moved = loc + pull.round();
                        if !self.clashes_with_neighbours(node, moved) {
                            self.nodes[node.0].location = moved;
                        }
                    }

                    below = Some(Junction {
                        total_recti_dist: accumulated,
                        location: self.location(node),
                    });
                }
            }
        }
    }

    fn clashes_with_neighbours(&self, node: NodeId, location: Point) -> bool {
        let n = &self.nodes[node.0];
        n.parent.map_or(false, |p| self.location(p) == location)
            || n.children.iter().any(|&c| self.location(c) == location)
    }

    /// Replace `node` by its only child in the children of `parent`.
    fn splice_out(&mut self, node: NodeId, parent: NodeId, child: NodeId) {
        if let Some(slot) = self.nodes[parent.0].children.iter_mut().find(|c| **c == node) {
            *slot = child;
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[node.0].parent = None;
        self.nodes[node.0].children.clear();
    }

    /// Copy the tree under `root` of `src` into this arena and return the
    /// new root. Locations, child order and grounding are preserved.
    pub fn copy_tree_from(&mut self, src: &TreeArena, root: NodeId) -> NodeId {
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        for id in src.preorder(root) {
            let node = src.node(id);
            let new_id = self.new_root(node.location, node.last_grounding_location);
            if let Some(parent) = node.parent.and_then(|p| mapping.get(&p).copied()) {
                self.nodes[new_id.0].parent = Some(parent);
                self.nodes[parent.0].children.push(new_id);
            }
            mapping.insert(id, new_id);
        }
        mapping[&root]
    }

    /// Fit the tree under `root` onto `outline`.
    ///
    /// Nodes outside the outline are dropped. Edges that leave the outline
    /// are cut and the part below the cut becomes a tree of its own, grounded
    /// where its edge met the boundary. Returns the roots of the resulting
    /// trees that still have at least one edge.
    pub fn realign(&mut self, root: NodeId, outline: &InfillOutline, locator: &EdgeGrid) -> Vec<NodeId> {
        if outline.is_empty() {
            return Vec::new();
        }

        let order = self.preorder(root);
        let inside: HashMap<NodeId, bool> = order
            .iter()
            .map(|&id| (id, is_inside(outline, locator, &self.location(id))))
            .collect();

        let mut parts = Vec::new();
        if inside[&root] {
            parts.push(root);
        }

        for &id in &order {
            let loc = self.location(id);
            let children = self.nodes[id.0].children.clone();

            for child in children {
                let child_inside = inside[&child];
                let child_loc = self.location(child);
                let keep = inside[&id]
                    && child_inside
                    && !locator.crosses_segment(&loc, &child_loc, BOUNDARY_TOLERANCE);
                if keep {
                    continue;
                }

                self.detach(child);
                if child_inside {
                    parts.push(self.ground_cut(child, loc, locator));
                }
            }
        }

        parts.retain(|&id| !self.nodes[id.0].children.is_empty());
        parts
    }

    /// Ground the freshly cut root `child` at the boundary crossing nearest
    /// to it on its old edge toward `toward`.
    fn ground_cut(&mut self, child: NodeId, toward: Point, locator: &EdgeGrid) -> NodeId {
        let loc = self.location(child);
        let crossing = locator.segment_crossings(&loc, &toward).first().map(|x| x.point);
        match crossing {
            Some(point) if point.distance(&loc) > BOUNDARY_TOLERANCE as CoordF => {
                let new_root = self.new_root(point, Some(point));
                self.attach_child(new_root, child);
                new_root
            }
            Some(_) => {
                self.nodes[child.0].last_grounding_location = Some(loc);
                child
            }
            None => {
                self.nodes[child.0].last_grounding_location = Some(toward);
                child
            }
        }
    }

    /// Copy the tree under `root` into `dst` as it should appear on the layer
    /// below: pruned, straightened and fitted onto `outline`.
    #[allow(clippy::too_many_arguments)]
    pub fn propagate_to_next_layer(
        &self,
        root: NodeId,
        dst: &mut TreeArena,
        dst_roots: &mut Vec<NodeId>,
        outline: &InfillOutline,
        locator: &EdgeGrid,
        prune_length: Coord,
        straightening_max_distance: Coord,
        max_colinear_distance: Coord,
    ) {
        let mut scratch = TreeArena::new();
        let copy = scratch.copy_tree_from(self, root);
        let grounding = scratch.node(copy).last_grounding_location;
        scratch.nodes[copy.0].last_grounding_location = grounding.or(Some(scratch.location(copy)));

        scratch.prune(copy, prune_length);
        scratch.straighten(copy, straightening_max_distance, max_colinear_distance);

        for part in scratch.realign(copy, outline, locator) {
            dst_roots.push(dst.copy_tree_from(&scratch, part));
        }
    }

    /// Write the tree under `root` as polylines running from leaves to
    /// junctions, with `overlap` trimmed off the junction end of each.
    ///
    /// At each junction `rng` picks the child whose polyline continues
    /// through it.
    pub fn convert_to_polylines<R>(&self, root: NodeId, overlap: Coord, rng: &mut R, out: &mut Vec<Polyline>)
    where
        R: Rng + ?Sized,
    {
        let mut lines: Vec<Vec<Point>> = vec![Vec::new()];
        let mut stack = vec![PolylineFrame::Visit { node: root, line: 0 }];

        while let Some(frame) = stack.pop() {
            match frame {
                PolylineFrame::Visit { node, line } => {
                    let n = &self.nodes[node.0];
                    if n.children.is_empty() {
                        lines[line].push(n.location);
                        continue;
                    }
                    let count = n.children.len();
                    let first = rng.gen_range(0..count);
                    for offset in (1..count).rev() {
                        stack.push(PolylineFrame::Branch {
                            child: n.children[(first + offset) % count],
                            point: n.location,
                        });
                    }
                    stack.push(PolylineFrame::Push {
                        line,
                        point: n.location,
                    });
                    stack.push(PolylineFrame::Visit {
                        node: n.children[first],
                        line,
                    });
                }
                PolylineFrame::Push { line, point } => lines[line].push(point),
                PolylineFrame::Branch { child, point } => {
                    let line = lines.len();
                    lines.push(Vec::new());
                    stack.push(PolylineFrame::Push { line, point });
                    stack.push(PolylineFrame::Visit { node: child, line });
                }
            }
        }

        for points in lines {
            let mut polyline = Polyline::from_points(points);
            polyline.clip_end(overlap);
            if polyline.is_valid() {
                out.push(polyline);
            }
        }
    }
}
