#![forbid(unsafe_code)]

//! Variable Placement with Separation Constraints.
//!
//! Given scalar variables with desired positions and weights, and separation constraints of the
//! form `right >= left + gap` (or `right == left + gap`), the [`Solver`] finds positions that
//! minimize `sum(weight * (position - desired)^2)` subject to every satisfiable constraint.
//!
//! The solver is an active-set method: variables linked by active constraints are grouped into
//! rigid blocks, blocks are merged across violated constraints and split where a Lagrangian
//! multiplier says the constraint is pulling the wrong way. Constraints that would close a cycle
//! of active constraints, or that cannot be made active by any split, are flagged unsatisfiable
//! and skipped from then on.

mod block;
mod blocks;
pub mod constraint;
pub mod error;
pub mod overlap;
pub mod solver;
pub mod variable;

pub use constraint::Constraint;
pub use error::{Error, Result};
pub use overlap::{OneDimensionResult, Span, remove_overlap_in_one_dimension};
pub use solver::{Solver, SolverOptions};
pub use variable::Variable;
