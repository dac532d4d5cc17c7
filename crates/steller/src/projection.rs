//! Projection of candidate positions onto the feasible region of the layout constraints.

use crate::constraints::{AlignmentConstraint, Axis, LayoutConstraint};
use crate::error::{Error, Result};
use crate::group::{self, DEFAULT_GROUP_STIFFNESS, Group};
use crate::rectangle::Rectangle;
use steller_vpsc::{Constraint, Solver, Variable};

/// Pulls a candidate coordinate row back onto the feasible region, one axis at a time.
///
/// `x0`/`y0` are the positions before the step, `candidate` the stepped row for the axis being
/// projected. [`crate::Descent`] calls `project_x` first and passes its result as `x0` to
/// `project_y`.
pub trait Projector {
    fn node_count(&self) -> usize;
    fn project_x(&mut self, x0: &[f64], y0: &[f64], candidate: &mut [f64]);
    fn project_y(&mut self, x0: &[f64], y0: &[f64], candidate: &mut [f64]);
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectionOptions {
    /// Generate non-overlap constraints between node (and group) boxes.
    pub avoid_overlaps: bool,
    pub min_separation: f64,
    /// Weight of fixed nodes without their own `fixed_weight`.
    pub fixed_weight: f64,
    /// Weight of group boundary variables without their own stiffness.
    pub group_stiffness: f64,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            avoid_overlaps: false,
            min_separation: 1e-6,
            fixed_weight: 1000.0,
            group_stiffness: DEFAULT_GROUP_STIFFNESS,
        }
    }
}

/// A node as seen by the projection: centre, size and whether it is pinned.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fixed: bool,
    pub fixed_weight: Option<f64>,
    /// Where a fixed node wants to be.
    pub px: f64,
    pub py: f64,
    pub bounds: Rectangle,
}

impl GraphNode {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fixed: false,
            fixed_weight: None,
            px: x,
            py: y,
            bounds: Rectangle::from_center(x, y, width, height),
        }
    }

    /// Pins the node at `(px, py)`.
    pub fn fixed_at(mut self, px: f64, py: f64) -> Self {
        self.fixed = true;
        self.px = px;
        self.py = py;
        self
    }

    fn refresh_bounds(&mut self) {
        self.bounds = Rectangle::from_center(self.x, self.y, self.width, self.height);
    }
}

/// Turns separation, alignment, non-overlap and group containment constraints into one
/// [`Solver`] problem per axis.
///
/// Variables `0..n` are the nodes; each group `g` owns variables `n + 2g` (min edge) and
/// `n + 2g + 1` (max edge).
#[derive(Debug, Clone)]
pub struct Projection {
    nodes: Vec<GraphNode>,
    groups: Vec<Group>,
    root: Option<usize>,
    x_constraints: Vec<Constraint>,
    y_constraints: Vec<Constraint>,
    options: ProjectionOptions,
}

impl Projection {
    pub fn new(
        nodes: Vec<GraphNode>,
        groups: Vec<Group>,
        root: Option<usize>,
        constraints: &[LayoutConstraint],
        options: ProjectionOptions,
    ) -> Result<Self> {
        let n = nodes.len();
        for (ci, c) in constraints.iter().enumerate() {
            if let Some(node) = c.nodes().into_iter().find(|&node| node >= n) {
                return Err(Error::UnknownNode {
                    constraint: ci,
                    node,
                    len: n,
                });
            }
        }
        group::validate_groups(&groups, n)?;
        if let Some(root) = root.filter(|&r| r >= groups.len()) {
            return Err(Error::UnknownRoot { root });
        }

        let mut projection = Self {
            nodes,
            groups,
            root,
            x_constraints: Vec::new(),
            y_constraints: Vec::new(),
            options,
        };

        for c in constraints {
            match c {
                LayoutConstraint::Separation(s) => {
                    let con = if s.equality {
                        Constraint::equality(s.left, s.right, s.gap)
                    } else {
                        Constraint::new(s.left, s.right, s.gap)
                    };
                    projection.constraints_mut(s.axis).push(con);
                }
                LayoutConstraint::Alignment(a) => projection.add_alignment(a),
            }
        }

        if projection.options.avoid_overlaps && projection.root.is_none() {
            projection.add_implicit_root();
        }
        for (gi, g) in projection.groups.iter_mut().enumerate() {
            g.vars = Some((n + 2 * gi, n + 2 * gi + 1));
        }
        for node in &mut projection.nodes {
            node.refresh_bounds();
        }
        projection.refresh_group_bounds();

        tracing::debug!(
            nodes = n,
            groups = projection.groups.len(),
            x_constraints = projection.x_constraints.len(),
            y_constraints = projection.y_constraints.len(),
            avoid_overlaps = projection.options.avoid_overlaps,
            "built projection"
        );
        Ok(projection)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [GraphNode] {
        &mut self.nodes
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn root(&self) -> Option<usize> {
        self.root
    }

    pub fn group_bounds(&self, g: usize) -> Option<Rectangle> {
        self.groups.get(g).map(|g| g.bounds)
    }

    /// Node variables plus two boundary variables per group.
    pub fn variable_count(&self) -> usize {
        self.nodes.len() + 2 * self.groups.len()
    }

    pub fn constraints(&self, axis: Axis) -> &[Constraint] {
        match axis {
            Axis::X => &self.x_constraints,
            Axis::Y => &self.y_constraints,
        }
    }

    fn constraints_mut(&mut self, axis: Axis) -> &mut Vec<Constraint> {
        match axis {
            Axis::X => &mut self.x_constraints,
            Axis::Y => &mut self.y_constraints,
        }
    }

    /// Equalities from the first listed node to each other one, offset relative to the first.
    fn add_alignment(&mut self, a: &AlignmentConstraint) {
        let Some(first) = a.offsets.first().copied() else {
            return;
        };
        self.make_feasible(a);
        let cons: Vec<Constraint> = a.offsets[1..]
            .iter()
            .map(|o| Constraint::equality(first.node, o.node, o.offset - first.offset))
            .collect();
        self.constraints_mut(a.axis).extend(cons);
    }

    /// With overlap avoidance on, aligned nodes would collapse onto each other along the
    /// alignment axis. Spread them along the other axis first so they start disjoint.
    fn make_feasible(&mut self, a: &AlignmentConstraint) {
        if !self.options.avoid_overlaps {
            return;
        }
        let spread = match a.axis {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        };
        let coord = |n: &GraphNode| match spread {
            Axis::X => n.x,
            Axis::Y => n.y,
        };
        let size = |n: &GraphNode| match spread {
            Axis::X => n.width,
            Axis::Y => n.height,
        };

        let mut order: Vec<usize> = a.offsets.iter().map(|o| o.node).collect();
        order.sort_by(|&l, &r| coord(&self.nodes[l]).total_cmp(&coord(&self.nodes[r])));
        order.dedup();
        for w in 1..order.len() {
            let (p, v) = (&self.nodes[order[w - 1]], &self.nodes[order[w]]);
            let next = coord(p) + (size(p) + size(v)) / 2.0;
            if next > coord(v) {
                let v = &mut self.nodes[order[w]];
                match spread {
                    Axis::X => v.x = next,
                    Axis::Y => v.y = next,
                }
            }
        }
    }

    /// A root holding every node and top-level group that no group already contains.
    fn add_implicit_root(&mut self) {
        let mut claimed_leaf = vec![false; self.nodes.len()];
        let mut claimed_group = vec![false; self.groups.len()];
        for g in &self.groups {
            for &l in &g.leaves {
                claimed_leaf[l] = true;
            }
            for &c in &g.groups {
                claimed_group[c] = true;
            }
        }
        let leaves = (0..self.nodes.len()).filter(|&i| !claimed_leaf[i]).collect();
        let groups = (0..self.groups.len())
            .filter(|&i| !claimed_group[i])
            .collect();
        self.groups.push(Group::new(leaves, groups, 0.0));
        self.root = Some(self.groups.len() - 1);
    }

    fn refresh_group_bounds(&mut self) {
        if let Some(root) = self.root {
            let leaf_bounds: Vec<Rectangle> = self.nodes.iter().map(|n| n.bounds).collect();
            group::update_bounds(&mut self.groups, root, &leaf_bounds);
        }
    }

    fn project(&mut self, axis: Axis, x0: &[f64], y0: &[f64], candidate: &mut [f64]) {
        let n = self.nodes.len();
        if x0.len() != n || y0.len() != n || candidate.len() != n {
            tracing::warn!(
                nodes = n,
                x0 = x0.len(),
                y0 = y0.len(),
                candidate = candidate.len(),
                "position rows do not match the projection's node count; skipping"
            );
            return;
        }
        let with_groups = self.options.avoid_overlaps && self.root.is_some();
        if !with_groups && self.constraints(axis).is_empty() {
            return;
        }

        let mut vars: Vec<Variable> = Vec::with_capacity(self.variable_count());
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.x = x0[i];
            node.y = y0[i];
            node.refresh_bounds();
            vars.push(if node.fixed {
                let p = match axis {
                    Axis::X => node.px,
                    Axis::Y => node.py,
                };
                Variable::with_weight(p, node.fixed_weight.unwrap_or(self.options.fixed_weight))
            } else {
                Variable::new(candidate[i])
            });
        }
        let mut start: Vec<f64> = match axis {
            Axis::X => x0.to_vec(),
            Axis::Y => y0.to_vec(),
        };

        let mut cs = self.constraints(axis).to_vec();
        if let Some(root) = self.root.filter(|_| with_groups) {
            self.refresh_group_bounds();
            for g in &self.groups {
                let (min, max) = g.extent(axis);
                let w = g.stiffness.unwrap_or(self.options.group_stiffness);
                vars.push(Variable::with_weight(min, w));
                vars.push(Variable::with_weight(max, w));
                start.extend([min, max]);
            }
            let leaf_bounds: Vec<Rectangle> = self.nodes.iter().map(|n| n.bounds).collect();
            cs.extend(group::generate_group_constraints(
                &mut self.groups,
                root,
                &leaf_bounds,
                &mut vars,
                axis,
                self.options.min_separation,
                false,
            ));
        }

        let mut solver = match Solver::new(vars, cs) {
            Ok(solver) => solver,
            Err(err) => {
                tracing::warn!(?axis, %err, "projection solver rejected its input");
                return;
            }
        };
        if let Err(err) = solver.set_starting_positions(&start) {
            tracing::warn!(?axis, %err, "projection solver rejected its starting positions");
            return;
        }
        solver.solve();

        for (i, node) in self.nodes.iter_mut().enumerate() {
            let p = solver.position(i);
            candidate[i] = p;
            match axis {
                Axis::X => {
                    node.x = p;
                    node.bounds.set_x_centre(p);
                }
                Axis::Y => {
                    node.y = p;
                    node.bounds.set_y_centre(p);
                }
            }
        }
        if with_groups {
            self.refresh_group_bounds();
        }
    }
}

impl Projector for Projection {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn project_x(&mut self, x0: &[f64], y0: &[f64], candidate: &mut [f64]) {
        self.project(Axis::X, x0, y0, candidate);
    }

    fn project_y(&mut self, x0: &[f64], y0: &[f64], candidate: &mut [f64]) {
        self.project(Axis::Y, x0, y0, candidate);
    }
}
