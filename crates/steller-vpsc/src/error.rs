#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("constraint {constraint} references variable {variable}, but only {len} variables exist")]
    UnknownVariable {
        constraint: usize,
        variable: usize,
        len: usize,
    },
    #[error("expected {expected} positions, got {got}")]
    PositionCount { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
