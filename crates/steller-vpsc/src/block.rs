//! Rigid groups of variables linked by active constraints.
//!
//! The active constraints inside a block form a spanning tree over its variables (undirected),
//! so every traversal below can walk the tree with a "came from" pointer instead of a visited set.

use crate::constraint::Constraint;
use crate::variable::Variable;
use rustc_hash::FxHashMap;

/// Running sums for the weighted least-squares block position.
#[derive(Debug, Clone)]
pub(crate) struct PositionStats {
    pub(crate) scale: f64,
    ab: f64,
    ad: f64,
    a2: f64,
}

impl PositionStats {
    fn new(scale: f64) -> Self {
        Self {
            scale,
            ab: 0.0,
            ad: 0.0,
            a2: 0.0,
        }
    }

    fn reset(&mut self) {
        self.ab = 0.0;
        self.ad = 0.0;
        self.a2 = 0.0;
    }

    fn add_variable(&mut self, v: &Variable) {
        let ai = self.scale / v.scale;
        let bi = v.offset / v.scale;
        let wi = v.weight;
        self.ab += wi * ai * bi;
        self.ad += wi * ai * v.desired_position;
        self.a2 += wi * ai * ai;
    }

    fn posn(&self) -> f64 {
        (self.ad - self.ab) / self.a2
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub(crate) vars: Vec<usize>,
    pub(crate) stats: PositionStats,
    pub(crate) posn: f64,
    /// Position in `Blocks::live`, for O(1) removal.
    pub(crate) live_index: usize,
}

/// Advances `cursor` over `v`'s outgoing then incoming constraints and returns the next active
/// one that does not lead back to `prev`, with the variable at its other end.
fn next_active_neighbour(
    vars: &[Variable],
    cons: &[Constraint],
    v: usize,
    prev: Option<usize>,
    cursor: &mut usize,
) -> Option<(usize, usize)> {
    let var = &vars[v];
    let out_len = var.c_out.len();
    while *cursor < out_len + var.c_in.len() {
        let k = *cursor;
        *cursor += 1;
        let (ci, next) = if k < out_len {
            let ci = var.c_out[k];
            (ci, cons[ci].right)
        } else {
            let ci = var.c_in[k - out_len];
            (ci, cons[ci].left)
        };
        if cons[ci].active && Some(next) != prev {
            return Some((ci, next));
        }
    }
    None
}

#[derive(Debug, Clone, Copy)]
struct LmFrame {
    var: usize,
    prev: Option<usize>,
    via: Option<usize>,
    cursor: usize,
    dfdv: f64,
}

#[derive(Debug, Clone, Copy)]
struct WalkFrame {
    var: usize,
    prev: Option<usize>,
    cursor: usize,
}

impl Block {
    /// A singleton block. Resets `v`'s offset; the caller records block membership on insert.
    pub(crate) fn new(v: usize, vars: &mut [Variable]) -> Self {
        vars[v].offset = 0.0;
        let mut b = Self {
            vars: Vec::new(),
            stats: PositionStats::new(vars[v].scale),
            posn: 0.0,
            live_index: 0,
        };
        b.add_variable(v, vars);
        b
    }

    fn add_variable(&mut self, v: usize, vars: &[Variable]) {
        self.vars.push(v);
        self.stats.add_variable(&vars[v]);
        self.posn = self.stats.posn();
    }

    pub(crate) fn position_of(&self, v: &Variable) -> f64 {
        (self.stats.scale * self.posn + v.offset) / v.scale
    }

    pub(crate) fn update_weighted_position(&mut self, vars: &[Variable]) {
        self.stats.reset();
        for &v in &self.vars {
            self.stats.add_variable(&vars[v]);
        }
        self.posn = self.stats.posn();
    }

    /// Post-order pass over the active tree that stores each constraint's Lagrangian multiplier,
    /// calling `visit` once per constraint after its subtree is done.
    fn compute_lm(
        &self,
        vars: &[Variable],
        cons: &mut [Constraint],
        mut visit: impl FnMut(usize, &Constraint),
    ) {
        let Some(&root) = self.vars.first() else {
            return;
        };
        let frame = |var: usize, prev: Option<usize>, via: Option<usize>| LmFrame {
            var,
            prev,
            via,
            cursor: 0,
            dfdv: vars[var].dfdv(self.position_of(&vars[var])),
        };

        let mut stack = vec![frame(root, None, None)];
        loop {
            let top = stack.last_mut().expect("stack is non-empty");
            if let Some((ci, next)) =
                next_active_neighbour(vars, cons, top.var, top.prev, &mut top.cursor)
            {
                let from = top.var;
                stack.push(frame(next, Some(from), Some(ci)));
                continue;
            }

            let done = stack.pop().expect("stack is non-empty");
            let Some(parent) = stack.last_mut() else {
                break;
            };
            let ci = done.via.expect("non-root frames carry their constraint");
            let lm = done.dfdv / vars[done.var].scale;
            let c = &mut cons[ci];
            if done.var == c.right {
                parent.dfdv += lm * vars[c.left].scale;
                c.lm = lm;
            } else {
                parent.dfdv += lm * vars[c.right].scale;
                c.lm = -lm;
            }
            visit(ci, c);
        }
    }

    /// The active inequality with the most negative multiplier: the best place to split.
    pub(crate) fn find_min_lm(&self, vars: &[Variable], cons: &mut [Constraint]) -> Option<usize> {
        let mut min: Option<(usize, f64)> = None;
        self.compute_lm(vars, cons, |ci, c| {
            if !c.equality && min.is_none_or(|(_, lm)| c.lm < lm) {
                min = Some((ci, c.lm));
            }
        });
        min.map(|(ci, _)| ci)
    }

    /// Like [`Self::find_min_lm`], restricted to constraints on the active path from `lv` to
    /// `rv` that point along it.
    fn find_min_lm_between(
        &self,
        lv: usize,
        rv: usize,
        vars: &[Variable],
        cons: &mut [Constraint],
    ) -> Option<usize> {
        self.compute_lm(vars, cons, |_, _| {});
        let mut min: Option<(usize, f64)> = None;
        for (ci, next) in Self::find_path(lv, rv, vars, cons) {
            let c = &cons[ci];
            if !c.equality && c.right == next && min.is_none_or(|(_, lm)| c.lm < lm) {
                min = Some((ci, c.lm));
            }
        }
        min.map(|(ci, _)| ci)
    }

    /// Active path from `from` to `to` as `(constraint, variable nearer to `to`)` pairs,
    /// listed from the `to` end back towards `from`. Empty when no path exists.
    fn find_path(
        from: usize,
        to: usize,
        vars: &[Variable],
        cons: &[Constraint],
    ) -> Vec<(usize, usize)> {
        let mut parent: FxHashMap<usize, (usize, usize)> = FxHashMap::default();
        let mut stack = vec![WalkFrame {
            var: from,
            prev: None,
            cursor: 0,
        }];
        let mut found = from == to;
        while !found {
            let Some(top) = stack.last_mut() else {
                break;
            };
            match next_active_neighbour(vars, cons, top.var, top.prev, &mut top.cursor) {
                Some((ci, next)) => {
                    let v = top.var;
                    parent.insert(next, (ci, v));
                    found = next == to;
                    stack.push(WalkFrame {
                        var: next,
                        prev: Some(v),
                        cursor: 0,
                    });
                }
                None => {
                    stack.pop();
                }
            }
        }
        if !found {
            return Vec::new();
        }

        let mut path = Vec::new();
        let mut cur = to;
        while cur != from {
            let (ci, prev) = parent[&cur];
            path.push((ci, cur));
            cur = prev;
        }
        path
    }

    /// Whether `u` reaches `v` following active constraints left-to-right.
    pub(crate) fn is_active_directed_path_between(
        &self,
        u: usize,
        v: usize,
        vars: &[Variable],
        cons: &[Constraint],
    ) -> bool {
        let mut stack = vec![u];
        while let Some(w) = stack.pop() {
            if w == v {
                return true;
            }
            for &ci in vars[w].c_out.iter().rev() {
                let c = &cons[ci];
                if c.active {
                    stack.push(c.right);
                }
            }
        }
        false
    }

    /// Flood-fills the active tree reachable from `start` into this block, fixing each reached
    /// variable's offset relative to `start`.
    fn populate_split_block(&mut self, start: usize, vars: &mut [Variable], cons: &[Constraint]) {
        let mut stack = vec![WalkFrame {
            var: start,
            prev: None,
            cursor: 0,
        }];
        while let Some(top) = stack.last_mut() {
            let Some((ci, next)) =
                next_active_neighbour(vars, cons, top.var, top.prev, &mut top.cursor)
            else {
                stack.pop();
                continue;
            };
            let v = top.var;
            let c = &cons[ci];
            let delta = if next == c.right { c.gap } else { -c.gap };
            vars[next].offset = vars[v].offset + delta;
            self.add_variable(next, vars);
            stack.push(WalkFrame {
                var: next,
                prev: Some(v),
                cursor: 0,
            });
        }
    }

    fn create_split_block(start: usize, vars: &mut [Variable], cons: &[Constraint]) -> Self {
        let mut b = Self::new(start, vars);
        b.populate_split_block(start, vars, cons);
        b
    }

    /// Deactivates `ci` and returns the two halves of the active tree it held together.
    pub(crate) fn split(ci: usize, vars: &mut [Variable], cons: &mut [Constraint]) -> (Self, Self) {
        cons[ci].active = false;
        let (left, right) = (cons[ci].left, cons[ci].right);
        (
            Self::create_split_block(left, vars, cons),
            Self::create_split_block(right, vars, cons),
        )
    }

    /// Splits at the best constraint between `vl` and `vr`. `None` when every constraint on the
    /// path is an equality (or points against the path), i.e. there is nothing to release.
    pub(crate) fn split_between(
        &self,
        vl: usize,
        vr: usize,
        vars: &mut [Variable],
        cons: &mut [Constraint],
    ) -> Option<(usize, Self, Self)> {
        let ci = self.find_min_lm_between(vl, vr, vars, cons)?;
        let (lb, rb) = Self::split(ci, vars, cons);
        Some((ci, lb, rb))
    }

    /// Absorbs `other`, shifting its variables by `distance`, and activates `ci`.
    pub(crate) fn merge_across(
        &mut self,
        other: Block,
        ci: usize,
        distance: f64,
        vars: &mut [Variable],
        cons: &mut [Constraint],
    ) {
        cons[ci].active = true;
        for v in other.vars {
            vars[v].offset += distance;
            self.add_variable(v, vars);
        }
        self.posn = self.stats.posn();
    }

    pub(crate) fn cost(&self, vars: &[Variable]) -> f64 {
        self.vars
            .iter()
            .map(|&v| {
                let var = &vars[v];
                let d = self.position_of(var) - var.desired_position;
                d * d * var.weight
            })
            .sum()
    }
}
