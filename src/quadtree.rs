//! Pool-allocated Barnes-Hut quadtree.
//!
//! Nodes live in a flat `Vec` and reference each other by index. The pool is
//! logically reset at the start of every build (`Vec::clear` keeps its
//! allocation), so once the pool has grown to its high-water mark, rebuilding
//! the tree every step allocates nothing.
//!
//! The pool is capped at [`SimConfig::node_capacity`] nodes and the tree at
//! [`SimConfig::max_tree_depth`] levels. When a node cannot be subdivided for
//! either reason it keeps absorbing bodies into its aggregate mass and center
//! of mass but has no children to descend into. Those bodies are reported as
//! `unplaced` in [`BuildStats`]: they still pull on distant bodies through the
//! aggregate, but a traversal that needs to open that node loses them.

use bevy::math::DVec2;

use crate::bodies::BodyStore;
use crate::resources::{ROOT_MARGIN, ROOT_PADDING, SimConfig};

/// Index of the root node in the pool.
pub const ROOT: usize = 0;

/// Entries in the fixed-size stack used by [`QuadTree::acceleration_at`].
pub const TRAVERSAL_STACK_CAPACITY: usize = 256;

/// Deepest tree whose traversal is guaranteed to fit in the stack: every
/// level leaves at most three siblings pending, plus four at the bottom.
pub const MAX_SUPPORTED_DEPTH: usize = (TRAVERSAL_STACK_CAPACITY - 4) / 3;

pub const NW: usize = 0;
pub const NE: usize = 1;
pub const SW: usize = 2;
pub const SE: usize = 3;

/// An axis-aligned square region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Square {
    pub center: DVec2,
    pub half: f64,
}

impl Square {
    /// Bounding square for a set of points, padded so that no point sits
    /// exactly on the outer edge. An empty set yields a small square at the origin.
    pub fn enclosing(points: &[DVec2]) -> Self {
        if points.is_empty() {
            return Self {
                center: DVec2::ZERO,
                half: ROOT_PADDING,
            };
        }

        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }

        let extent = max - min;
        Self {
            center: (min + max) * 0.5,
            half: extent.x.max(extent.y) * ROOT_MARGIN + ROOT_PADDING,
        }
    }

    /// Picks a quadrant by comparing each axis against the center on its own.
    /// Points outside the square still get a quadrant.
    pub fn quadrant(&self, point: DVec2) -> usize {
        let north = point.y >= self.center.y;
        if point.x < self.center.x {
            if north { NW } else { SW }
        } else if north {
            NE
        } else {
            SE
        }
    }

    pub fn child(&self, quadrant: usize) -> Square {
        let half = self.half * 0.5;
        let offset = match quadrant {
            NW => DVec2::new(-half, half),
            NE => DVec2::new(half, half),
            SW => DVec2::new(-half, -half),
            _ => DVec2::new(half, -half),
        };
        Square {
            center: self.center + offset,
            half,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    Empty,
    /// Holds exactly one body directly.
    Leaf { body: usize },
    /// Holds more than one body. The children are all absent when the node
    /// could not be subdivided.
    Internal { children: [Option<usize>; 4] },
}

#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub bounds: Square,
    pub mass: f64,
    pub center_of_mass: DVec2,
    pub count: u32,
    pub kind: NodeKind,
}

impl Node {
    pub fn empty(bounds: Square) -> Self {
        Self {
            bounds,
            mass: 0.0,
            center_of_mass: DVec2::ZERO,
            count: 0,
            kind: NodeKind::Empty,
        }
    }

    pub fn children(&self) -> [Option<usize>; 4] {
        match self.kind {
            NodeKind::Internal { children } => children,
            _ => [None; 4],
        }
    }
}

/// What happened during one build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub bodies: usize,
    pub nodes: usize,
    /// Bodies that did not end up alone in a leaf.
    pub unplaced: usize,
    /// Subdivisions refused because the node pool was full.
    pub refused_allocations: usize,
    /// Subdivisions refused because the node was at the depth limit.
    pub depth_capped: usize,
}

impl BuildStats {
    pub fn is_degraded(&self) -> bool {
        self.unplaced > 0
    }
}

#[derive(Debug, Default)]
pub struct QuadTree {
    nodes: Vec<Node>,
    capacity: usize,
    max_depth: usize,
    stats: BuildStats,
}

impl QuadTree {
    /// Rebuilds the tree from scratch over every body in `store`.
    pub fn build(&mut self, store: &BodyStore, config: &SimConfig) -> BuildStats {
        self.nodes.clear();
        self.capacity = config.node_capacity;
        self.max_depth = config.max_tree_depth.min(MAX_SUPPORTED_DEPTH);
        self.stats = BuildStats {
            bodies: store.len(),
            ..BuildStats::default()
        };

        let bounds = Square::enclosing(&store.pos);
        if self.alloc(bounds).is_none() {
            self.stats.refused_allocations += 1;
            self.stats.unplaced = store.len();
            return self.stats;
        }

        for body in 0..store.len() {
            self.insert(ROOT, body, store, 0);
        }

        self.stats.nodes = self.nodes.len();
        self.stats
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(ROOT)
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    fn alloc(&mut self, bounds: Square) -> Option<usize> {
        if self.nodes.len() >= self.capacity {
            return None;
        }
        let index = self.nodes.len();
        self.nodes.push(Node::empty(bounds));
        Some(index)
    }

    fn insert(&mut self, index: usize, body: usize, store: &BodyStore, depth: usize) {
        let position = store.pos[body];
        let mass = store.mass[body];
        let node = self.nodes[index];

        match node.kind {
            NodeKind::Empty => {
                let node = &mut self.nodes[index];
                node.kind = NodeKind::Leaf { body };
                node.mass = mass;
                node.center_of_mass = position;
                node.count = 1;
                return;
            }
            NodeKind::Leaf { body: existing } => match self.subdivide(index, depth) {
                Some(children) => {
                    self.nodes[index].kind = NodeKind::Internal {
                        children: children.map(Some),
                    };
                    let q = node.bounds.quadrant(store.pos[existing]);
                    self.insert(children[q], existing, store, depth + 1);
                    let q = node.bounds.quadrant(position);
                    self.insert(children[q], body, store, depth + 1);
                }
                None => {
                    self.nodes[index].kind = NodeKind::Internal {
                        children: [None; 4],
                    };
                    self.stats.unplaced += 2;
                }
            },
            NodeKind::Internal { children } => {
                match children[node.bounds.quadrant(position)] {
                    Some(child) => self.insert(child, body, store, depth + 1),
                    None => self.stats.unplaced += 1,
                }
            }
        }

        // Running weighted average; the direct occupant of a former leaf is
        // already part of this aggregate.
        let node = &mut self.nodes[index];
        let total = node.mass + mass;
        node.center_of_mass = (node.center_of_mass * node.mass + position * mass) / total;
        node.mass = total;
        node.count += 1;
    }

    /// Allocates all four children or none of them.
    fn subdivide(&mut self, index: usize, depth: usize) -> Option<[usize; 4]> {
        if depth >= self.max_depth {
            self.stats.depth_capped += 1;
            return None;
        }
        if self.nodes.len() + 4 > self.capacity {
            self.stats.refused_allocations += 1;
            return None;
        }

        let bounds = self.nodes[index].bounds;
        let mut children = [0; 4];
        for (quadrant, child) in children.iter_mut().enumerate() {
            *child = self.alloc(bounds.child(quadrant))?;
        }
        Some(children)
    }

    /// Approximate acceleration at `point` due to every body in the tree.
    ///
    /// Walks the tree with an explicit fixed-size stack. A node is treated as
    /// a single mass at its center of mass when `(2 * half)^2 < theta^2 * r2`.
    /// Single-body leaves closer than the softening length are skipped, which
    /// is how a body avoids pulling on itself. Returns the acceleration and
    /// the number of nodes that had to be approximated because opening them
    /// would have overflowed the stack. Trees built within
    /// [`MAX_SUPPORTED_DEPTH`] never overflow.
    pub fn acceleration_at(&self, point: DVec2, theta: f64, config: &SimConfig) -> (DVec2, usize) {
        if self.nodes.is_empty() {
            return (DVec2::ZERO, 0);
        }

        let theta_sq = theta * theta;
        let softening = config.softening;
        let mut stack = [0usize; TRAVERSAL_STACK_CAPACITY];
        stack[0] = ROOT;
        let mut top = 1;
        let mut acc = DVec2::ZERO;
        let mut overflows = 0;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top]];
            if node.count == 0 {
                continue;
            }

            let delta = node.center_of_mass - point;
            let r2 = delta.length_squared() + softening;

            match node.kind {
                NodeKind::Empty => {}
                NodeKind::Leaf { .. } => {
                    if r2 >= softening * 2.0 {
                        acc += pull(delta, r2, node.mass);
                    }
                }
                NodeKind::Internal { children } => {
                    let size = node.bounds.half * 2.0;
                    if size * size < theta_sq * r2 {
                        acc += pull(delta, r2, node.mass);
                        continue;
                    }

                    let pending = children.iter().flatten().count();
                    if top + pending > TRAVERSAL_STACK_CAPACITY {
                        overflows += 1;
                        acc += pull(delta, r2, node.mass);
                        continue;
                    }
                    for child in children.iter().flatten() {
                        stack[top] = *child;
                        top += 1;
                    }
                }
            }
        }

        (acc * config.g, overflows)
    }
}

/// `mass * delta / r^3` for an already softened `r2`.
#[inline]
fn pull(delta: DVec2, r2: f64, mass: f64) -> DVec2 {
    let inv_r = r2.sqrt().recip();
    delta * (mass * inv_r * inv_r * inv_r)
}
