//! Sweep-line generation of non-overlap constraints.
//!
//! To separate rectangles horizontally, sweep along y: a rectangle enters the scanline when the
//! sweep reaches its top and leaves at its bottom. While open, it records the rectangles it
//! must be kept apart from (its closest scanline neighbours, ordered by centre x); one
//! separation constraint per recorded pair is emitted when it closes. Vertical constraints are
//! the same sweep with the axes swapped. This emits O(n log n + k) constraints rather than one
//! per overlapping pair.

use crate::constraints::Axis;
use crate::error::Result;
use crate::rectangle::Rectangle;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;
use steller_vpsc::{Constraint, Solver, Variable};

pub const DEFAULT_MIN_SEPARATION: f64 = 1e-6;

/// Centre of `r` along the axis being separated.
pub(crate) fn centre(axis: Axis, r: &Rectangle) -> f64 {
    match axis {
        Axis::X => r.cx(),
        Axis::Y => r.cy(),
    }
}

/// Where the sweep (along the other axis) reaches `r`.
pub(crate) fn open(axis: Axis, r: &Rectangle) -> f64 {
    match axis {
        Axis::X => r.min_y,
        Axis::Y => r.min_x,
    }
}

pub(crate) fn close(axis: Axis, r: &Rectangle) -> f64 {
    match axis {
        Axis::X => r.max_y,
        Axis::Y => r.max_x,
    }
}

pub(crate) fn size(axis: Axis, r: &Rectangle) -> f64 {
    match axis {
        Axis::X => r.width(),
        Axis::Y => r.height(),
    }
}

/// Rectangle spanning `open..close` along the sweep axis and `size` around `center` along `axis`.
pub(crate) fn make_rect(axis: Axis, open: f64, close: f64, center: f64, size: f64) -> Rectangle {
    match axis {
        Axis::X => Rectangle::new(center - size / 2.0, center + size / 2.0, open, close),
        Axis::Y => Rectangle::new(open, close, center - size / 2.0, center + size / 2.0),
    }
}

/// Scanline ordering: by centre, ties broken by node so equal centres can coexist.
#[derive(Debug, Clone, Copy)]
struct ScanKey {
    pos: f64,
    id: usize,
}

impl PartialEq for ScanKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScanKey {}

impl PartialOrd for ScanKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScanKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pos
            .total_cmp(&other.pos)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[derive(Debug)]
struct ScanNode {
    var: usize,
    rect: Rectangle,
    key: ScanKey,
    prev: BTreeSet<ScanKey>,
    next: BTreeSet<ScanKey>,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    is_open: bool,
    node: usize,
    pos: f64,
}

fn compare_events(a: &Event, b: &Event) -> Ordering {
    a.pos
        .total_cmp(&b.pos)
        .then_with(|| match (a.is_open, b.is_open) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        })
}

fn find_x_neighbours(v: usize, scanline: &BTreeSet<ScanKey>, nodes: &mut [ScanNode]) {
    let key = nodes[v].key;
    let forward = scanline.range((Bound::Excluded(key), Bound::Unbounded));
    let backward = scanline.range(..key).rev();
    for (is_next, side) in [
        (true, Box::new(forward) as Box<dyn Iterator<Item = &ScanKey>>),
        (false, Box::new(backward)),
    ] {
        for u in side {
            let u_over_v_x = nodes[u.id].rect.overlap_x(&nodes[v].rect);
            if u_over_v_x <= 0.0 || u_over_v_x <= nodes[u.id].rect.overlap_y(&nodes[v].rect) {
                link(nodes, v, *u, is_next);
            }
            if u_over_v_x <= 0.0 {
                break;
            }
        }
    }
}

fn find_y_neighbours(v: usize, scanline: &BTreeSet<ScanKey>, nodes: &mut [ScanNode]) {
    let key = nodes[v].key;
    let after = scanline
        .range((Bound::Excluded(key), Bound::Unbounded))
        .next()
        .copied();
    let before = scanline.range(..key).next_back().copied();
    for (is_next, u) in [(true, after), (false, before)] {
        let Some(u) = u else {
            continue;
        };
        if nodes[u.id].rect.overlap_x(&nodes[v].rect) > 0.0 {
            link(nodes, v, u, is_next);
        }
    }
}

/// Records `u` as `v`'s neighbour on the given side, and `v` as `u`'s on the other.
fn link(nodes: &mut [ScanNode], v: usize, u: ScanKey, is_next: bool) {
    let v_key = nodes[v].key;
    if is_next {
        nodes[v].next.insert(u);
        nodes[u.id].prev.insert(v_key);
    } else {
        nodes[v].prev.insert(u);
        nodes[u.id].next.insert(v_key);
    }
}

/// Separation constraints along `axis` that keep the rectangles `rs` from overlapping.
/// `vars[i]` is the solver variable holding the centre of `rs[i]`; both slices have equal length.
pub fn generate_constraints(
    rs: &[Rectangle],
    vars: &[usize],
    axis: Axis,
    min_sep: f64,
) -> Vec<Constraint> {
    debug_assert_eq!(rs.len(), vars.len(), "one solver variable per rectangle");
    let n = rs.len();
    let mut nodes: Vec<ScanNode> = rs
        .iter()
        .zip(vars)
        .enumerate()
        .map(|(id, (r, &var))| ScanNode {
            var,
            rect: *r,
            key: ScanKey {
                pos: centre(axis, r),
                id,
            },
            prev: BTreeSet::new(),
            next: BTreeSet::new(),
        })
        .collect();

    let mut events: Vec<Event> = Vec::with_capacity(2 * n);
    for (i, node) in nodes.iter().enumerate() {
        events.push(Event {
            is_open: true,
            node: i,
            pos: open(axis, &node.rect),
        });
    }
    for (i, node) in nodes.iter().enumerate() {
        events.push(Event {
            is_open: false,
            node: i,
            pos: close(axis, &node.rect),
        });
    }
    events.sort_by(compare_events);

    let mut cs = Vec::new();
    let mut scanline: BTreeSet<ScanKey> = BTreeSet::new();
    let make_constraint = |nodes: &[ScanNode], l: usize, r: usize| {
        let sep = (size(axis, &nodes[l].rect) + size(axis, &nodes[r].rect)) / 2.0 + min_sep;
        Constraint::new(nodes[l].var, nodes[r].var, sep)
    };

    for e in events {
        let v = e.node;
        let v_key = nodes[v].key;
        if e.is_open {
            scanline.insert(v_key);
            match axis {
                Axis::X => find_x_neighbours(v, &scanline, &mut nodes),
                Axis::Y => find_y_neighbours(v, &scanline, &mut nodes),
            }
            continue;
        }

        scanline.remove(&v_key);
        let prev = std::mem::take(&mut nodes[v].prev);
        for u in prev.iter().rev() {
            cs.push(make_constraint(&nodes, u.id, v));
            nodes[u.id].next.remove(&v_key);
        }
        let next = std::mem::take(&mut nodes[v].next);
        for u in &next {
            cs.push(make_constraint(&nodes, v, u.id));
            nodes[u.id].prev.remove(&v_key);
        }
    }
    debug_assert!(scanline.is_empty());

    tracing::trace!(?axis, rects = n, constraints = cs.len(), "generated non-overlap constraints");
    cs
}

pub fn generate_x_constraints(rs: &[Rectangle], vars: &[usize]) -> Vec<Constraint> {
    generate_constraints(rs, vars, Axis::X, DEFAULT_MIN_SEPARATION)
}

pub fn generate_y_constraints(rs: &[Rectangle], vars: &[usize]) -> Vec<Constraint> {
    generate_constraints(rs, vars, Axis::Y, DEFAULT_MIN_SEPARATION)
}

/// Moves `rs` the least distance needed so no two overlap: a horizontal pass, then a vertical
/// pass over the horizontally separated boxes.
pub fn remove_overlaps(rs: &mut [Rectangle]) -> Result<()> {
    let ids: Vec<usize> = (0..rs.len()).collect();
    for axis in [Axis::X, Axis::Y] {
        let vars: Vec<Variable> = rs.iter().map(|r| Variable::new(centre(axis, r))).collect();
        let cs = generate_constraints(rs, &ids, axis, DEFAULT_MIN_SEPARATION);
        let mut solver = Solver::new(vars, cs)?;
        solver.solve();
        for (i, r) in rs.iter_mut().enumerate() {
            match axis {
                Axis::X => r.set_x_centre(solver.position(i)),
                Axis::Y => r.set_y_centre(solver.position(i)),
            }
        }
    }
    Ok(())
}
