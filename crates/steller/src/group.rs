//! Nested groups of nodes and the constraints that keep members inside their group's box.
//!
//! Groups live in an arena (`&[Group]`) and refer to their children by index; leaves are node
//! indices. Each group that is itself contained in another is represented in the solver by two
//! dummy variables marking its min and max edge along the axis being solved.

use crate::constraints::Axis;
use crate::error::{Error, Result};
use crate::rectangle::Rectangle;
use crate::scanline::{self, DEFAULT_MIN_SEPARATION};
use rustc_hash::FxHashMap;
use steller_vpsc::{Constraint, Variable};

pub const DEFAULT_GROUP_STIFFNESS: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Group {
    /// Node indices directly inside this group.
    pub leaves: Vec<usize>,
    /// Child group indices.
    pub groups: Vec<usize>,
    pub padding: f64,
    /// Weight of the boundary variables; `None` uses the projection's default.
    pub stiffness: Option<f64>,
    pub bounds: Rectangle,
    pub(crate) vars: Option<(usize, usize)>,
}

impl Group {
    pub fn new(leaves: Vec<usize>, groups: Vec<usize>, padding: f64) -> Self {
        Self {
            leaves,
            groups,
            padding,
            stiffness: None,
            bounds: Rectangle::empty(),
            vars: None,
        }
    }

    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = Some(stiffness);
        self
    }

    /// Solver variables holding this group's min and max edge, once assigned.
    pub fn variables(&self) -> Option<(usize, usize)> {
        self.vars
    }

    /// Where the min and max boundary variables sit for the current bounds.
    pub(crate) fn extent(&self, axis: Axis) -> (f64, f64) {
        if self.bounds.is_empty() {
            return (0.0, 0.0);
        }
        let c = scanline::centre(axis, &self.bounds);
        let s = scanline::size(axis, &self.bounds) / 2.0;
        (c - s + self.padding / 2.0, c + s - self.padding / 2.0)
    }

    fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.groups.is_empty()
    }
}

/// Checks that every leaf and child index resolves and that no group contains itself.
pub fn validate_groups(groups: &[Group], node_count: usize) -> Result<()> {
    for (gi, g) in groups.iter().enumerate() {
        if let Some(&leaf) = g.leaves.iter().find(|&&l| l >= node_count) {
            return Err(Error::UnknownLeaf {
                group: gi,
                leaf,
                len: node_count,
            });
        }
        if let Some(&child) = g.groups.iter().find(|&&c| c >= groups.len()) {
            return Err(Error::UnknownGroup { group: gi, child });
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        OnStack,
        Done,
    }
    let mut marks = vec![Mark::New; groups.len()];
    for start in 0..groups.len() {
        if marks[start] != Mark::New {
            continue;
        }
        // (group, next child cursor)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::OnStack;
        while let Some(top) = stack.last_mut() {
            let (g, cursor) = *top;
            let Some(&child) = groups[g].groups.get(cursor) else {
                marks[g] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;
            match marks[child] {
                Mark::OnStack => return Err(Error::GroupCycle { group: child }),
                Mark::Done => {}
                Mark::New => {
                    marks[child] = Mark::OnStack;
                    stack.push((child, 0));
                }
            }
        }
    }
    Ok(())
}

/// Recomputes the bounds of `root` and every group below it from the leaf rectangles, each
/// inflated by its group's padding, and returns the root's bounds.
pub fn compute_group_bounds(
    groups: &mut [Group],
    root: usize,
    leaf_bounds: &[Rectangle],
) -> Result<Rectangle> {
    validate_groups(groups, leaf_bounds.len())?;
    if root >= groups.len() {
        return Err(Error::UnknownRoot { root });
    }
    Ok(update_bounds(groups, root, leaf_bounds))
}

/// [`compute_group_bounds`] over an already validated tree.
pub(crate) fn update_bounds(groups: &mut [Group], g: usize, leaf_bounds: &[Rectangle]) -> Rectangle {
    let mut bounds = groups[g]
        .leaves
        .iter()
        .fold(Rectangle::empty(), |r, &l| leaf_bounds[l].union(&r));
    for ci in groups[g].groups.clone() {
        let child = update_bounds(groups, ci, leaf_bounds);
        if !child.is_empty() {
            bounds = child.union(&bounds);
        }
    }
    let group = &mut groups[g];
    group.bounds = if group.is_empty() {
        Rectangle::empty()
    } else {
        bounds.inflate(group.padding)
    };
    group.bounds
}

/// Horizontal containment and non-overlap constraints for the tree under `root`.
///
/// Leaf `i` is solver variable `i`. Every group gets a fresh pair of boundary variables appended
/// to `vars`, weighted by its stiffness, so each axis can be solved with its own variable list.
pub fn generate_x_group_constraints(
    groups: &mut [Group],
    root: usize,
    leaf_bounds: &[Rectangle],
    vars: &mut Vec<Variable>,
) -> Result<Vec<Constraint>> {
    generate_group_constraints_checked(groups, root, leaf_bounds, vars, Axis::X)
}

pub fn generate_y_group_constraints(
    groups: &mut [Group],
    root: usize,
    leaf_bounds: &[Rectangle],
    vars: &mut Vec<Variable>,
) -> Result<Vec<Constraint>> {
    generate_group_constraints_checked(groups, root, leaf_bounds, vars, Axis::Y)
}

fn generate_group_constraints_checked(
    groups: &mut [Group],
    root: usize,
    leaf_bounds: &[Rectangle],
    vars: &mut Vec<Variable>,
    axis: Axis,
) -> Result<Vec<Constraint>> {
    compute_group_bounds(groups, root, leaf_bounds)?;
    if vars.len() < leaf_bounds.len() {
        return Err(Error::DimensionMismatch {
            what: "solver variables for leaves",
            expected: leaf_bounds.len(),
            got: vars.len(),
        });
    }
    for g in groups.iter_mut() {
        let w = g.stiffness.unwrap_or(DEFAULT_GROUP_STIFFNESS);
        vars.push(Variable::with_weight(0.0, w));
        vars.push(Variable::with_weight(0.0, w));
        g.vars = Some((vars.len() - 2, vars.len() - 1));
    }
    Ok(generate_group_constraints(
        groups,
        root,
        leaf_bounds,
        vars,
        axis,
        DEFAULT_MIN_SEPARATION,
        false,
    ))
}

/// Constraints for group `g` and, recursively, its descendants. Bounds must be current and every
/// group reachable from `g` must have boundary variables.
///
/// The group's own boundary variables (when it is contained by a parent) are placed as thin
/// rectangles of width `padding` just inside its edges, then swept together with its leaves and
/// its child groups. A child group enters the sweep as one rectangle tied to its min variable;
/// the gaps are then shifted so neighbours on its left push its min edge and neighbours on its
/// right are pushed by its max edge.
pub(crate) fn generate_group_constraints(
    groups: &mut [Group],
    g: usize,
    leaf_bounds: &[Rectangle],
    vars: &mut [Variable],
    axis: Axis,
    min_sep: f64,
    is_contained: bool,
) -> Vec<Constraint> {
    let children = groups[g].groups.clone();
    let mut cs = Vec::new();
    for &ci in &children {
        cs.extend(generate_group_constraints(
            groups,
            ci,
            leaf_bounds,
            vars,
            axis,
            min_sep,
            true,
        ));
    }

    let group = &groups[g];
    let mut rs: Vec<Rectangle> = Vec::new();
    let mut vs: Vec<usize> = Vec::new();

    if is_contained && !group.bounds.is_empty() {
        let (min_var, max_var) = group.vars.expect("contained group has boundary variables");
        let (min, max) = group.extent(axis);
        let b = &group.bounds;
        let (open, close) = (scanline::open(axis, b), scanline::close(axis, b));
        vars[min_var].desired_position = min;
        rs.push(scanline::make_rect(axis, open, close, min, group.padding));
        vs.push(min_var);
        vars[max_var].desired_position = max;
        rs.push(scanline::make_rect(axis, open, close, max, group.padding));
        vs.push(max_var);
    }

    for &l in &group.leaves {
        rs.push(leaf_bounds[l]);
        vs.push(l);
    }

    // min var -> (max var, gap adjustment)
    let mut child_edges: FxHashMap<usize, (usize, f64)> = FxHashMap::default();
    for &ci in &children {
        let child = &groups[ci];
        if child.bounds.is_empty() {
            continue;
        }
        let (min_var, max_var) = child.vars.expect("contained group has boundary variables");
        let b = &child.bounds;
        rs.push(scanline::make_rect(
            axis,
            scanline::open(axis, b),
            scanline::close(axis, b),
            scanline::centre(axis, b),
            scanline::size(axis, b),
        ));
        vs.push(min_var);
        let adjustment = (child.padding - scanline::size(axis, b)) / 2.0;
        child_edges.insert(min_var, (max_var, adjustment));
    }

    let mut own = scanline::generate_constraints(&rs, &vs, axis, min_sep);
    if !child_edges.is_empty() {
        for c in &mut own {
            let (left, right) = (c.left, c.right);
            if let Some(&(_, adjustment)) = child_edges.get(&right) {
                c.gap += adjustment;
            }
            if let Some(&(max_var, adjustment)) = child_edges.get(&left) {
                c.left = max_var;
                c.gap += adjustment;
            }
        }
    }

    cs.extend(own);
    cs
}

#[cfg(test)]
mod tests {
    use super::{
        Group, compute_group_bounds, generate_x_group_constraints, generate_y_group_constraints,
        validate_groups,
    };
    use crate::error::Error;
    use crate::rectangle::Rectangle;
    use steller_vpsc::Variable;

    #[test]
    fn bounds_union_children_and_add_padding() {
        let leaves = [
            Rectangle::new(0.0, 1.0, 0.0, 1.0),
            Rectangle::new(4.0, 5.0, 2.0, 3.0),
            Rectangle::new(10.0, 11.0, 0.0, 1.0),
        ];
        let mut groups = vec![
            Group::new(vec![2], vec![1], 1.0),
            Group::new(vec![0, 1], vec![], 0.5),
        ];
        let root = compute_group_bounds(&mut groups, 0, &leaves).unwrap();
        assert_eq!(groups[1].bounds, Rectangle::new(-0.5, 5.5, -0.5, 3.5));
        assert_eq!(root, Rectangle::new(-1.5, 12.0, -1.5, 4.5));
    }

    #[test]
    fn empty_groups_have_empty_bounds() {
        let mut groups = vec![Group::new(vec![], vec![], 3.0)];
        let b = compute_group_bounds(&mut groups, 0, &[]).unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn cycles_and_dangling_indices_are_rejected() {
        let groups = vec![Group::new(vec![], vec![1], 0.0), Group::new(vec![], vec![0], 0.0)];
        assert!(matches!(
            validate_groups(&groups, 0),
            Err(Error::GroupCycle { .. })
        ));

        let groups = vec![Group::new(vec![3], vec![], 0.0)];
        assert!(matches!(
            validate_groups(&groups, 2),
            Err(Error::UnknownLeaf {
                group: 0,
                leaf: 3,
                len: 2
            })
        ));

        let groups = vec![Group::new(vec![], vec![4], 0.0)];
        assert!(matches!(
            validate_groups(&groups, 0),
            Err(Error::UnknownGroup { group: 0, child: 4 })
        ));
    }

    #[test]
    fn shared_subtrees_are_not_cycles() {
        let groups = vec![
            Group::new(vec![], vec![1, 2], 0.0),
            Group::new(vec![], vec![2], 0.0),
            Group::new(vec![0], vec![], 0.0),
        ];
        validate_groups(&groups, 1).unwrap();
    }

    #[test]
    fn sibling_group_constraints_run_from_max_edge_to_min_edge() {
        // Root holding two padded groups side by side, overlapping in x.
        let leaves = [
            Rectangle::new(0.0, 2.0, 0.0, 2.0),
            Rectangle::new(1.0, 3.0, 0.0, 2.0),
        ];
        let mut groups = vec![
            Group::new(vec![], vec![1, 2], 0.0),
            Group::new(vec![0], vec![], 1.0),
            Group::new(vec![1], vec![], 1.0),
        ];
        let mut vars: Vec<Variable> = leaves.iter().map(|r| Variable::new(r.cx())).collect();
        let cs = generate_x_group_constraints(&mut groups, 0, &leaves, &mut vars).unwrap();
        assert_eq!(vars.len(), 2 + 2 * 3);

        let (min1, max1) = groups[1].variables().unwrap();
        let (min2, _) = groups[2].variables().unwrap();
        let between = cs
            .iter()
            .find(|c| c.left == max1 && c.right == min2)
            .expect("constraint between the two groups");
        // Two paddings halves plus the minimum separation.
        assert!((between.gap - 1.0).abs() < 1e-5, "gap {}", between.gap);
        assert!(cs.iter().any(|c| c.left == min1 && c.right == 0));
        assert!(cs.iter().any(|c| c.left == 0 && c.right == max1));
    }

    #[test]
    fn each_axis_gets_boundary_variables_in_its_own_list() {
        let leaves = [
            Rectangle::new(0.0, 2.0, 0.0, 2.0),
            Rectangle::new(1.0, 3.0, 1.0, 3.0),
        ];
        let mut groups = vec![
            Group::new(vec![], vec![1], 0.0),
            Group::new(vec![0, 1], vec![], 1.0),
        ];

        let mut xv: Vec<Variable> = leaves.iter().map(|r| Variable::new(r.cx())).collect();
        let xs = generate_x_group_constraints(&mut groups, 0, &leaves, &mut xv).unwrap();
        assert_eq!(xv.len(), 2 + 2 * 2);

        let mut yv: Vec<Variable> = leaves.iter().map(|r| Variable::new(r.cy())).collect();
        let ys = generate_y_group_constraints(&mut groups, 0, &leaves, &mut yv).unwrap();
        assert_eq!(yv.len(), 2 + 2 * 2);
        assert_eq!(groups[1].variables(), Some((4, 5)));
        for c in xs.iter().chain(&ys) {
            assert!(c.left < 6 && c.right < 6);
        }
        // Min edge of the inner group sits half its padding inside its bounds.
        let b = groups[1].bounds;
        assert!((yv[4].desired_position - (b.min_y + 0.5)).abs() < 1e-9);
        assert!(ys.iter().any(|c| c.left == 4 && c.right == 0));
    }
}
