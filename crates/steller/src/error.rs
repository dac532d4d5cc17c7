#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("position matrix has no dimensions")]
    EmptyPositions,
    #[error("{what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("constraint {constraint} references node {node}, but only {len} nodes exist")]
    UnknownNode {
        constraint: usize,
        node: usize,
        len: usize,
    },
    #[error("group {group} references leaf {leaf}, but only {len} nodes exist")]
    UnknownLeaf {
        group: usize,
        leaf: usize,
        len: usize,
    },
    #[error("group {group} references missing group {child}")]
    UnknownGroup { group: usize, child: usize },
    #[error("root group {root} does not exist")]
    UnknownRoot { root: usize },
    #[error("group {group} is nested inside itself")]
    GroupCycle { group: usize },
    #[error(transparent)]
    Vpsc(#[from] steller_vpsc::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
