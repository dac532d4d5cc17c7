/// A scalar position the solver moves.
///
/// The solved position is available from [`crate::Solver::position`]; it is derived from the
/// owning block's position and this variable's offset within that block:
/// `position = (block.scale * block.posn + offset) / scale`.
#[derive(Debug, Clone)]
pub struct Variable {
    pub desired_position: f64,
    /// Strictly positive.
    pub weight: f64,
    pub scale: f64,

    pub(crate) offset: f64,
    pub(crate) block: usize,
    pub(crate) c_in: Vec<usize>,
    pub(crate) c_out: Vec<usize>,
}

impl Variable {
    pub fn new(desired_position: f64) -> Self {
        Self::with_weight(desired_position, 1.0)
    }

    pub fn with_weight(desired_position: f64, weight: f64) -> Self {
        Self {
            desired_position,
            weight,
            scale: 1.0,
            offset: 0.0,
            block: 0,
            c_in: Vec::new(),
            c_out: Vec::new(),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Offset from the owning block's reference position.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Derivative of this variable's share of the cost at `position`.
    pub(crate) fn dfdv(&self, position: f64) -> f64 {
        2.0 * self.weight * (position - self.desired_position)
    }
}
