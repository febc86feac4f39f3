//! Barnes–Hut quad-tree over node positions.
//!
//! The tree is an arena of [`QuadNode`]s addressed by `u32` index. It is
//! rebuilt from scratch every simulation iteration; [`QuadTree::rebuild`]
//! clears the arena but keeps its allocation, so a simulator can hold one
//! tree for its whole run.
//!
//! Layout of the arena:
//! - index 0 is the root, the minimal enclosing square of all bodies
//!   (slightly padded so no body sits on the upper edge)
//! - an internal node's four children are stored contiguously starting at
//!   `first_child`, in quadrant order SW, SE, NW, NE
//! - children are always allocated after their parent, so one reverse pass
//!   over the arena computes aggregate mass and centroid bottom-up
//! - a leaf holds at most one body; internal nodes hold none
//!
//! Two bodies at the exact same position would subdivide forever. The
//! incoming body is nudged by a small deterministic offset (seeded from its
//! index) and reinserted. The tree keeps its own copy of body positions, so
//! the nudge never leaks back into the caller's layout.
//!
//! # References
//!
//! - Barnes & Hut, "A hierarchical O(N log N) force-calculation algorithm" (1986)

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Sentinel for "no child" / "no body".
const NONE: u32 = u32::MAX;

/// Subdivision depth at which coincident bodies are nudged apart.
const MAX_DEPTH: u32 = 48;

/// Relative padding applied to the root square.
const ROOT_PADDING: f64 = 1e-6;

/// Smallest root half-width, relative to the coordinate magnitude.
const MIN_RELATIVE_HALF: f64 = 1e-6;

/// Smallest root half-width in absolute units.
const MIN_HALF: f64 = 1e-6;

/// Jitter magnitude as a fraction of the root half-width.
const JITTER_FRACTION: f64 = 1e-3;

/// Distance law used for repulsion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepulsionLaw {
    /// Magnitude `k * m_i * m_j / d`.
    #[default]
    Linear,
    /// Magnitude `k * m_i * m_j / d^2`.
    AntiCollision,
}

impl RepulsionLaw {
    /// Scalar that multiplies the separation vector `(dx, dy)`.
    ///
    /// `d2` is the squared distance and must be positive.
    #[inline]
    pub fn factor(self, coefficient: f64, m1: f64, m2: f64, d2: f64) -> f64 {
        match self {
            RepulsionLaw::Linear => coefficient * m1 * m2 / d2,
            RepulsionLaw::AntiCollision => coefficient * m1 * m2 / (d2 * d2.sqrt()),
        }
    }
}

/// Accumulated force plus the number of bodies/pseudo-bodies it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceSample {
    /// Force X component.
    pub fx: f64,
    /// Force Y component.
    pub fy: f64,
    /// Number of interactions evaluated.
    pub interactions: usize,
}

/// One cell of the quad-tree.
#[derive(Debug, Clone, Copy)]
struct QuadNode {
    /// Square center X.
    cx: f64,
    /// Square center Y.
    cy: f64,
    /// Half of the square's side.
    half: f64,
    /// Total mass of bodies beneath this cell.
    mass: f64,
    /// Mass-weighted centroid X.
    com_x: f64,
    /// Mass-weighted centroid Y.
    com_y: f64,
    /// Body index for occupied leaves, NONE otherwise.
    body: u32,
    /// Index of the first of four children, NONE for leaves.
    first_child: u32,
}

impl QuadNode {
    fn leaf(cx: f64, cy: f64, half: f64) -> Self {
        Self {
            cx,
            cy,
            half,
            mass: 0.0,
            com_x: cx,
            com_y: cy,
            body: NONE,
            first_child: NONE,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.first_child == NONE
    }

    #[inline]
    fn quadrant(&self, x: f64, y: f64) -> usize {
        usize::from(x >= self.cx) | (usize::from(y >= self.cy) << 1)
    }

    #[inline]
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.cx - self.half
            && x < self.cx + self.half
            && y >= self.cy - self.half
            && y < self.cy + self.half
    }
}

/// Barnes–Hut quad-tree.
#[derive(Debug, Clone, Default)]
pub struct QuadTree {
    /// Cell arena; index 0 is the root when non-empty.
    nodes: Vec<QuadNode>,
    /// Body X positions (possibly nudged).
    xs: Vec<f64>,
    /// Body Y positions (possibly nudged).
    ys: Vec<f64>,
    /// Body masses.
    masses: Vec<f64>,
    /// Number of bodies actually inserted.
    inserted: usize,
    /// Number of bodies that had to be nudged during the last build.
    jittered: usize,
}

impl QuadTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree over the given bodies.
    pub fn build(xs: &[f64], ys: &[f64], masses: &[f64]) -> Self {
        let mut tree = Self::new();
        tree.rebuild(xs, ys, masses);
        tree
    }

    /// Rebuild the tree in place, reusing its storage.
    ///
    /// Bodies with non-finite coordinates are left out of the tree.
    ///
    /// # Panics
    ///
    /// Panics if the three slices differ in length.
    pub fn rebuild(&mut self, xs: &[f64], ys: &[f64], masses: &[f64]) {
        assert!(
            xs.len() == ys.len() && xs.len() == masses.len(),
            "position and mass buffers must have equal length"
        );

        self.nodes.clear();
        self.xs.clear();
        self.ys.clear();
        self.masses.clear();
        self.xs.extend_from_slice(xs);
        self.ys.extend_from_slice(ys);
        self.masses.extend_from_slice(masses);
        self.inserted = 0;
        self.jittered = 0;

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for (&x, &y) in xs.iter().zip(ys) {
            if x.is_finite() && y.is_finite() {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
        if min_x == f64::INFINITY {
            return;
        }

        let extent = (max_x - min_x).max(max_y - min_y);
        let scale = min_x.abs().max(max_x.abs()).max(min_y.abs()).max(max_y.abs());
        let half = (extent * 0.5)
            .max(scale * MIN_RELATIVE_HALF)
            .max(MIN_HALF)
            * (1.0 + ROOT_PADDING);
        let cx = min_x + (max_x - min_x) * 0.5;
        let cy = min_y + (max_y - min_y) * 0.5;
        self.nodes.push(QuadNode::leaf(cx, cy, half));

        for body in 0..xs.len() {
            if xs[body].is_finite() && ys[body].is_finite() {
                self.insert(body);
                self.inserted += 1;
            }
        }
        self.accumulate();
    }

    /// Insert one body, splitting occupied leaves on the way down.
    fn insert(&mut self, body: usize) {
        let mut salt = 0u64;
        'restart: loop {
            let (bx, by) = (self.xs[body], self.ys[body]);
            let mut node = 0usize;
            let mut depth = 0u32;
            loop {
                let cell = self.nodes[node];
                if !cell.is_leaf() {
                    node = cell.first_child as usize + cell.quadrant(bx, by);
                    depth += 1;
                    continue;
                }
                if cell.body == NONE {
                    self.nodes[node].body = body as u32;
                    return;
                }

                let other = cell.body as usize;
                let coincident = self.xs[other] == bx && self.ys[other] == by;
                if coincident || depth >= MAX_DEPTH {
                    salt += 1;
                    self.nudge(body, salt);
                    continue 'restart;
                }

                // Split the leaf and push the resident body down one level.
                let first = self.nodes.len();
                let quarter = cell.half * 0.5;
                for q in 0..4 {
                    let x = if q & 1 == 1 { cell.cx + quarter } else { cell.cx - quarter };
                    let y = if q & 2 == 2 { cell.cy + quarter } else { cell.cy - quarter };
                    self.nodes.push(QuadNode::leaf(x, y, quarter));
                }
                self.nodes[node].first_child = first as u32;
                self.nodes[node].body = NONE;

                let resident = first + cell.quadrant(self.xs[other], self.ys[other]);
                self.nodes[resident].body = other as u32;

                node = first + cell.quadrant(bx, by);
                depth += 1;
            }
        }
    }

    /// Move a body by a small deterministic offset, staying inside the root.
    fn nudge(&mut self, body: usize, salt: u64) {
        let root = self.nodes[0];
        let magnitude = root.half * JITTER_FRACTION;
        let (ox, oy) = jitter_offset(((body as u64) << 16) ^ salt, magnitude);

        let lo_x = root.cx - root.half;
        let hi_x = root.cx + root.half;
        let lo_y = root.cy - root.half;
        let hi_y = root.cy + root.half;

        let x = self.xs[body] + ox;
        self.xs[body] = if x >= lo_x && x < hi_x { x } else { self.xs[body] - ox };
        let y = self.ys[body] + oy;
        self.ys[body] = if y >= lo_y && y < hi_y { y } else { self.ys[body] - oy };

        if salt == 1 {
            self.jittered += 1;
        }
    }

    /// Compute aggregate mass and centroid bottom-up.
    fn accumulate(&mut self) {
        for index in (0..self.nodes.len()).rev() {
            let cell = self.nodes[index];
            if cell.is_leaf() {
                if cell.body != NONE {
                    let b = cell.body as usize;
                    let node = &mut self.nodes[index];
                    node.mass = self.masses[b];
                    node.com_x = self.xs[b];
                    node.com_y = self.ys[b];
                }
                continue;
            }

            let first = cell.first_child as usize;
            let mut mass = 0.0;
            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            for child in &self.nodes[first..first + 4] {
                mass += child.mass;
                sum_x += child.mass * child.com_x;
                sum_y += child.mass * child.com_y;
            }
            let node = &mut self.nodes[index];
            node.mass = mass;
            if mass > 0.0 {
                node.com_x = sum_x / mass;
                node.com_y = sum_y / mass;
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of bodies in the tree.
    pub fn len(&self) -> usize {
        self.inserted
    }

    /// Check if the tree holds no bodies.
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Number of cells in the arena.
    pub fn cell_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of bodies nudged apart during the last build.
    pub fn jittered(&self) -> usize {
        self.jittered
    }

    /// Total mass of all bodies.
    pub fn total_mass(&self) -> f64 {
        self.nodes.first().map(|root| root.mass).unwrap_or(0.0)
    }

    /// Mass-weighted centroid of all bodies.
    pub fn center_of_mass(&self) -> Option<(f64, f64)> {
        self.nodes
            .first()
            .filter(|root| root.mass > 0.0)
            .map(|root| (root.com_x, root.com_y))
    }

    /// Root square as `(center_x, center_y, half_width)`.
    pub fn bounds(&self) -> Option<(f64, f64, f64)> {
        self.nodes.first().map(|root| (root.cx, root.cy, root.half))
    }

    /// Body positions as stored in the tree, nudges included.
    pub fn positions(&self) -> (&[f64], &[f64]) {
        (&self.xs, &self.ys)
    }

    /// Repulsive force acting on body `i`.
    ///
    /// `theta = 0` visits every other body and is exact.
    pub fn repulsion_on(&self, i: usize, theta: f64, law: RepulsionLaw, coefficient: f64) -> (f64, f64) {
        let sample = self.repulsion_on_counted(i, theta, law, coefficient);
        (sample.fx, sample.fy)
    }

    /// Repulsive force on body `i` together with the interaction count.
    pub fn repulsion_on_counted(
        &self,
        i: usize,
        theta: f64,
        law: RepulsionLaw,
        coefficient: f64,
    ) -> ForceSample {
        let mut sample = ForceSample::default();
        if self.nodes.is_empty() || i >= self.xs.len() {
            return sample;
        }
        let query = Query {
            body: i,
            x: self.xs[i],
            y: self.ys[i],
            mass: self.masses[i],
            theta,
            law,
            coefficient,
        };
        self.visit(0, &query, &mut sample);
        sample
    }

    fn visit(&self, index: usize, query: &Query, sample: &mut ForceSample) {
        let cell = &self.nodes[index];
        if cell.is_leaf() {
            if cell.body == NONE || cell.body as usize == query.body {
                return;
            }
            let b = cell.body as usize;
            query.apply(self.xs[b], self.ys[b], self.masses[b], b as u64, sample);
            return;
        }

        // A cell containing the query body is always opened, so a body never
        // repels itself through an aggregate.
        if !cell.contains(query.x, query.y) {
            let dx = query.x - cell.com_x;
            let dy = query.y - cell.com_y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > 0.0 && (2.0 * cell.half) / distance < query.theta {
                query.apply(cell.com_x, cell.com_y, cell.mass, index as u64, sample);
                return;
            }
        }

        let first = cell.first_child as usize;
        for child in first..first + 4 {
            self.visit(child, query, sample);
        }
    }
}

/// Parameters of one force query.
struct Query {
    body: usize,
    x: f64,
    y: f64,
    mass: f64,
    theta: f64,
    law: RepulsionLaw,
    coefficient: f64,
}

impl Query {
    #[inline]
    fn apply(&self, x: f64, y: f64, mass: f64, salt: u64, sample: &mut ForceSample) {
        let (dx, dy, d2) = separation(self.x - x, self.y - y, self.body as u64, salt);
        let factor = self.law.factor(self.coefficient, self.mass, mass, d2);
        sample.fx += dx * factor;
        sample.fy += dy * factor;
        sample.interactions += 1;
    }
}

/// Replace a zero separation with a small deterministic one.
#[inline]
fn separation(dx: f64, dy: f64, body: u64, salt: u64) -> (f64, f64, f64) {
    let d2 = dx * dx + dy * dy;
    if d2 > 0.0 {
        return (dx, dy, d2);
    }
    let (jx, jy) = jitter_offset(body.rotate_left(32) ^ salt, MIN_HALF);
    (jx, jy, jx * jx + jy * jy)
}

/// Deterministic offset with each component in `±[0.5, 1) * magnitude`.
fn jitter_offset(seed: u64, magnitude: f64) -> (f64, f64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut component = || {
        let value = rng.gen_range(0.5..1.0) * magnitude;
        if rng.gen_bool(0.5) { value } else { -value }
    };
    let x = component();
    let y = component();
    (x, y)
}

/// Exact O(N) repulsion on body `i`, for verification against the tree.
pub fn pairwise_repulsion(
    xs: &[f64],
    ys: &[f64],
    masses: &[f64],
    i: usize,
    law: RepulsionLaw,
    coefficient: f64,
) -> (f64, f64) {
    let query = Query {
        body: i,
        x: xs[i],
        y: ys[i],
        mass: masses[i],
        theta: 0.0,
        law,
        coefficient,
    };
    let mut sample = ForceSample::default();
    for j in 0..xs.len() {
        if j != i && xs[j].is_finite() && ys[j].is_finite() {
            query.apply(xs[j], ys[j], masses[j], j as u64, &mut sample);
        }
    }
    (sample.fx, sample.fy)
}
