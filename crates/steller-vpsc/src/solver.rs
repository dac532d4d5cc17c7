use crate::blocks::Blocks;
use crate::constraint::Constraint;
use crate::error::{Error, Result};
use crate::variable::Variable;

/// Numeric tolerances of the active-set iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions {
    /// Active constraints whose multiplier falls below this are split.
    pub lagrangian_tolerance: f64,
    /// Inactive constraints with slack below this count as violated.
    pub zero_upper_bound: f64,
    /// `solve` stops once the cost changes by less than this between passes.
    pub cost_tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            lagrangian_tolerance: -1e-4,
            zero_upper_bound: -1e-10,
            cost_tolerance: 1e-4,
        }
    }
}

/// Active-set solver over a fixed set of variables and constraints.
///
/// A solver can be reused across iterations: update the desired positions (and optionally the
/// starting positions) and call [`Solver::solve`] again.
#[derive(Debug, Clone)]
pub struct Solver {
    vars: Vec<Variable>,
    cons: Vec<Constraint>,
    blocks: Blocks,
    inactive: Vec<usize>,
    options: SolverOptions,
}

impl Solver {
    pub fn new(vars: Vec<Variable>, cons: Vec<Constraint>) -> Result<Self> {
        Self::with_options(vars, cons, SolverOptions::default())
    }

    pub fn with_options(
        mut vars: Vec<Variable>,
        mut cons: Vec<Constraint>,
        options: SolverOptions,
    ) -> Result<Self> {
        let len = vars.len();
        for (ci, c) in cons.iter().enumerate() {
            for variable in [c.left, c.right] {
                if variable >= len {
                    return Err(Error::UnknownVariable {
                        constraint: ci,
                        variable,
                        len,
                    });
                }
            }
        }

        for v in &mut vars {
            v.c_in.clear();
            v.c_out.clear();
        }
        for (ci, c) in cons.iter_mut().enumerate() {
            c.active = false;
            vars[c.left].c_out.push(ci);
            vars[c.right].c_in.push(ci);
        }
        let inactive = (0..cons.len()).collect();
        let blocks = Blocks::new(&mut vars);

        Ok(Self {
            vars,
            cons,
            blocks,
            inactive,
            options,
        })
    }

    pub fn variables(&self) -> &[Variable] {
        &self.vars
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.cons
    }

    pub fn position(&self, v: usize) -> f64 {
        self.blocks.position(&self.vars[v])
    }

    pub fn positions(&self) -> Vec<f64> {
        self.vars.iter().map(|v| self.blocks.position(v)).collect()
    }

    /// `right.scale * right - gap - left.scale * left`; infinite for unsatisfiable constraints.
    pub fn slack(&self, ci: usize) -> f64 {
        slack(&self.cons[ci], &self.vars, &self.blocks)
    }

    /// Total weighted squared distance of every variable from its desired position.
    pub fn cost(&self) -> f64 {
        self.blocks.cost(&self.vars)
    }

    /// Cost of each current block.
    pub fn block_costs(&self) -> Vec<f64> {
        self.blocks.iter().map(|b| b.cost(&self.vars)).collect()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Restarts from singleton blocks placed at `positions`, with every constraint inactive.
    pub fn set_starting_positions(&mut self, positions: &[f64]) -> Result<()> {
        self.check_len(positions)?;
        for c in &mut self.cons {
            c.active = false;
        }
        self.inactive = (0..self.cons.len()).collect();
        self.blocks = Blocks::new(&mut self.vars);
        for (i, &p) in positions.iter().enumerate() {
            let id = self.vars[i].block;
            self.blocks[id].posn = p;
        }
        Ok(())
    }

    pub fn set_desired_positions(&mut self, positions: &[f64]) -> Result<()> {
        self.check_len(positions)?;
        for (v, &p) in self.vars.iter_mut().zip(positions) {
            v.desired_position = p;
        }
        Ok(())
    }

    fn check_len(&self, positions: &[f64]) -> Result<()> {
        if positions.len() != self.vars.len() {
            return Err(Error::PositionCount {
                expected: self.vars.len(),
                got: positions.len(),
            });
        }
        Ok(())
    }

    /// Repeats [`Solver::satisfy`] until the cost settles, since merging blocks can make a
    /// constraint processed earlier violated again. Returns the final cost.
    pub fn solve(&mut self) -> f64 {
        self.satisfy();
        let mut last_cost = f64::MAX;
        let mut cost = self.cost();
        let mut passes = 1usize;
        while (last_cost - cost).abs() > self.options.cost_tolerance {
            self.satisfy();
            last_cost = cost;
            cost = self.cost();
            passes += 1;
        }
        tracing::debug!(
            cost,
            passes,
            blocks = self.blocks.len(),
            "vpsc solve converged"
        );
        cost
    }

    /// One pass: split blocks with negative multipliers, then repeatedly satisfy the most
    /// violated constraint until none is left.
    pub fn satisfy(&mut self) {
        let Self {
            vars,
            cons,
            blocks,
            inactive,
            options,
        } = self;

        let splits = blocks.split(inactive, options.lagrangian_tolerance, vars, cons);
        if splits > 0 {
            tracing::trace!(splits, "split blocks on negative multipliers");
        }

        while let Some(ci) = most_violated(inactive, cons, vars, blocks, options.zero_upper_bound)
        {
            let c = &cons[ci];
            if !(c.equality || (slack(c, vars, blocks) < options.zero_upper_bound && !c.active)) {
                break;
            }

            let lb = vars[c.left].block;
            let rb = vars[c.right].block;
            if lb != rb {
                blocks.merge(ci, vars, cons);
                continue;
            }

            if blocks[lb].is_active_directed_path_between(c.right, c.left, vars, cons) {
                mark_unsatisfiable(&mut cons[ci], ci, "would close a cycle of active constraints");
                continue;
            }

            let (vl, vr) = (c.left, c.right);
            let Some((split, left, right)) = blocks[lb].split_between(vl, vr, vars, cons) else {
                mark_unsatisfiable(&mut cons[ci], ci, "no split point between its endpoints");
                continue;
            };
            blocks.insert(left, vars);
            blocks.insert(right, vars);
            blocks.remove(lb);
            inactive.push(split);

            if slack(&cons[ci], vars, blocks) >= 0.0 {
                inactive.push(ci);
            } else {
                blocks.merge(ci, vars, cons);
            }
        }
    }
}

fn slack(c: &Constraint, vars: &[Variable], blocks: &Blocks) -> f64 {
    if c.unsatisfiable {
        return f64::MAX;
    }
    let left = &vars[c.left];
    let right = &vars[c.right];
    right.scale * blocks.position(right) - c.gap - left.scale * blocks.position(left)
}

fn mark_unsatisfiable(c: &mut Constraint, ci: usize, reason: &str) {
    c.unsatisfiable = true;
    tracing::debug!(
        constraint = ci,
        left = c.left,
        right = c.right,
        gap = c.gap,
        reason,
        "dropping unsatisfiable constraint"
    );
}

/// Picks the inactive constraint to satisfy next: the first pending equality, otherwise the one
/// with the smallest slack. It is removed from `inactive` (swap-with-last) when it is about to be
/// processed.
fn most_violated(
    inactive: &mut Vec<usize>,
    cons: &[Constraint],
    vars: &[Variable],
    blocks: &Blocks,
    zero_upper_bound: f64,
) -> Option<usize> {
    let mut min_slack = f64::MAX;
    let mut found: Option<(usize, usize)> = None;
    for (i, &ci) in inactive.iter().enumerate() {
        let c = &cons[ci];
        if c.unsatisfiable {
            continue;
        }
        let s = slack(c, vars, blocks);
        if c.equality || s < min_slack {
            min_slack = s;
            found = Some((i, ci));
            if c.equality {
                break;
            }
        }
    }

    let (i, ci) = found?;
    let c = &cons[ci];
    if (min_slack < zero_upper_bound && !c.active) || c.equality {
        inactive.swap_remove(i);
    }
    Some(ci)
}

#[cfg(test)]
mod tests {
    use super::Solver;
    use crate::constraint::Constraint;
    use crate::variable::Variable;

    #[test]
    fn most_violated_prefers_equalities_over_larger_violations() {
        let vars = vec![
            Variable::new(0.0),
            Variable::new(0.0),
            Variable::new(0.0),
            Variable::new(0.0),
        ];
        let cons = vec![
            Constraint::new(0, 1, 100.0),
            Constraint::equality(2, 3, 1.0),
        ];
        let mut s = Solver::new(vars, cons).unwrap();
        let picked = super::most_violated(
            &mut s.inactive,
            &s.cons,
            &s.vars,
            &s.blocks,
            s.options.zero_upper_bound,
        );
        assert_eq!(picked, Some(1));
        assert_eq!(s.inactive, vec![0]);
    }

    #[test]
    fn most_violated_breaks_slack_ties_by_first_occurrence() {
        let vars = vec![Variable::new(0.0), Variable::new(0.0), Variable::new(0.0)];
        let cons = vec![Constraint::new(0, 1, 2.0), Constraint::new(1, 2, 2.0)];
        let mut s = Solver::new(vars, cons).unwrap();
        let picked = super::most_violated(
            &mut s.inactive,
            &s.cons,
            &s.vars,
            &s.blocks,
            s.options.zero_upper_bound,
        );
        assert_eq!(picked, Some(0));
        assert_eq!(s.inactive, vec![1]);
    }

    #[test]
    fn satisfied_constraints_stay_in_the_inactive_set() {
        let vars = vec![Variable::new(0.0), Variable::new(10.0)];
        let cons = vec![Constraint::new(0, 1, 2.0)];
        let mut s = Solver::new(vars, cons).unwrap();
        s.satisfy();
        assert_eq!(s.inactive, vec![0]);
        assert!(!s.cons[0].is_active());
    }
}
