//! Overlap removal for spans already ordered along a line.

use crate::constraint::Constraint;
use crate::solver::Solver;
use crate::variable::Variable;

/// Weight multiplier for the optional boundary variables, so the bounds barely move.
const BOUNDARY_WEIGHT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub size: f64,
    pub desired_center: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OneDimensionResult {
    pub new_centers: Vec<f64>,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Separates consecutive `spans` (given in order) so that neighbours just touch, keeping each as
/// close to its desired center as possible. Optional bounds become heavy variables the first and
/// last spans must stay inside of.
pub fn remove_overlap_in_one_dimension(
    spans: &[Span],
    lower_bound: Option<f64>,
    upper_bound: Option<f64>,
) -> OneDimensionResult {
    let n = spans.len();
    let (Some(first), Some(last)) = (spans.first(), spans.last()) else {
        return OneDimensionResult {
            new_centers: Vec::new(),
            lower_bound: lower_bound.unwrap_or(0.0),
            upper_bound: upper_bound.unwrap_or(0.0),
        };
    };

    let mut vars: Vec<Variable> = spans
        .iter()
        .map(|s| Variable::new(s.desired_center))
        .collect();
    let mut cons: Vec<Constraint> = spans
        .windows(2)
        .enumerate()
        .map(|(i, w)| Constraint::new(i, i + 1, (w[0].size + w[1].size) / 2.0))
        .collect();

    let left_most_size = first.size / 2.0;
    let right_most_size = last.size / 2.0;

    let first_weight = vars[0].weight;
    let last_weight = vars[n - 1].weight;
    let lower_var = lower_bound.map(|lb| {
        vars.push(Variable::with_weight(lb, first_weight * BOUNDARY_WEIGHT));
        let v = vars.len() - 1;
        cons.push(Constraint::new(v, 0, left_most_size));
        v
    });
    let upper_var = upper_bound.map(|ub| {
        vars.push(Variable::with_weight(ub, last_weight * BOUNDARY_WEIGHT));
        let v = vars.len() - 1;
        cons.push(Constraint::new(n - 1, v, right_most_size));
        v
    });

    let mut solver =
        Solver::new(vars, cons).expect("constraints only reference variables created above");
    solver.solve();

    let new_centers: Vec<f64> = (0..n).map(|i| solver.position(i)).collect();
    OneDimensionResult {
        lower_bound: lower_var
            .map(|v| solver.position(v))
            .unwrap_or(new_centers[0] - left_most_size),
        upper_bound: upper_var
            .map(|v| solver.position(v))
            .unwrap_or(new_centers[n - 1] + right_most_size),
        new_centers,
    }
}

#[cfg(test)]
mod tests {
    use super::{Span, remove_overlap_in_one_dimension};

    #[test]
    fn overlapping_spans_are_pushed_apart_symmetrically() {
        let spans = [
            Span {
                size: 2.0,
                desired_center: 0.0,
            },
            Span {
                size: 2.0,
                desired_center: 1.0,
            },
        ];
        let out = remove_overlap_in_one_dimension(&spans, None, None);
        assert!((out.new_centers[0] + 0.5).abs() < 1e-9);
        assert!((out.new_centers[1] - 1.5).abs() < 1e-9);
        assert!((out.lower_bound + 1.5).abs() < 1e-9);
        assert!((out.upper_bound - 2.5).abs() < 1e-9);
    }

    #[test]
    fn bounds_hold_spans_inside() {
        let spans = [
            Span {
                size: 2.0,
                desired_center: -5.0,
            },
            Span {
                size: 2.0,
                desired_center: 5.0,
            },
        ];
        let out = remove_overlap_in_one_dimension(&spans, Some(0.0), Some(10.0));
        assert!(out.new_centers[0] - 1.0 >= out.lower_bound - 1e-6);
        assert!(out.new_centers[1] + 1.0 <= out.upper_bound + 1e-6);
        assert!(out.lower_bound.abs() < 0.1);
    }

    #[test]
    fn no_spans_yield_the_given_bounds() {
        let out = remove_overlap_in_one_dimension(&[], Some(1.0), None);
        assert!(out.new_centers.is_empty());
        assert_eq!(out.lower_bound, 1.0);
    }
}
