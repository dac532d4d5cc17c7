//! User-facing constraint descriptions.
//!
//! These mirror the JSON shapes diagram tools hand to the layout:
//!
//! ```json
//! { "axis": "x", "left": 0, "right": 1, "gap": 25 }
//! { "axis": "y", "left": 2, "right": 3, "gap": 0, "equality": true }
//! { "type": "alignment", "axis": "x", "offsets": [{ "node": 0, "offset": 0 }, { "node": 4, "offset": 0 }] }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

/// `right >= left + gap` (or `==` with `equality`) along `axis`, between node indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparationConstraint {
    pub axis: Axis,
    pub left: usize,
    pub right: usize,
    pub gap: f64,
    #[serde(default)]
    pub equality: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentOffset {
    pub node: usize,
    pub offset: f64,
}

/// Nodes sharing a coordinate along `axis`, each shifted by its offset relative to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConstraint {
    pub axis: Axis,
    pub offsets: Vec<AlignmentOffset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutConstraint {
    Alignment(AlignmentConstraint),
    Separation(SeparationConstraint),
}

impl LayoutConstraint {
    pub fn separation(axis: Axis, left: usize, right: usize, gap: f64) -> Self {
        Self::Separation(SeparationConstraint {
            axis,
            left,
            right,
            gap,
            equality: false,
        })
    }

    pub fn equality(axis: Axis, left: usize, right: usize, gap: f64) -> Self {
        Self::Separation(SeparationConstraint {
            axis,
            left,
            right,
            gap,
            equality: true,
        })
    }

    /// Aligns `nodes` exactly (all offsets zero).
    pub fn alignment(axis: Axis, nodes: &[usize]) -> Self {
        Self::Alignment(AlignmentConstraint {
            axis,
            offsets: nodes
                .iter()
                .map(|&node| AlignmentOffset { node, offset: 0.0 })
                .collect(),
        })
    }

    pub fn axis(&self) -> Axis {
        match self {
            Self::Alignment(a) => a.axis,
            Self::Separation(s) => s.axis,
        }
    }

    /// Every node index the constraint mentions.
    pub fn nodes(&self) -> Vec<usize> {
        match self {
            Self::Alignment(a) => a.offsets.iter().map(|o| o.node).collect(),
            Self::Separation(s) => vec![s.left, s.right],
        }
    }
}
