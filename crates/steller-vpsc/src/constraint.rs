/// Separation between two variables: `right.scale * right >= left.scale * left + gap`, or
/// equality when `equality` is set.
///
/// `left` and `right` index into the variable list handed to [`crate::Solver::new`].
#[derive(Debug, Clone)]
pub struct Constraint {
    pub left: usize,
    pub right: usize,
    pub gap: f64,
    pub equality: bool,

    pub(crate) active: bool,
    pub(crate) unsatisfiable: bool,
    pub(crate) lm: f64,
}

impl Constraint {
    pub fn new(left: usize, right: usize, gap: f64) -> Self {
        Self {
            left,
            right,
            gap,
            equality: false,
            active: false,
            unsatisfiable: false,
            lm: 0.0,
        }
    }

    pub fn equality(left: usize, right: usize, gap: f64) -> Self {
        Self {
            equality: true,
            ..Self::new(left, right, gap)
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Set once the solver finds it cannot enforce this constraint; it is never reconsidered.
    pub fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable
    }

    /// Lagrangian multiplier. Only meaningful right after the owning block's derivative pass.
    pub fn lagrangian_multiplier(&self) -> f64 {
        self.lm
    }
}
