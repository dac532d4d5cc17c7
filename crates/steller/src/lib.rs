#![forbid(unsafe_code)]

//! Headless constrained graph layout by stress majorization.
//!
//! [`Descent`] moves a `k x n` position matrix downhill on the stress between actual and ideal
//! pairwise distances. Each step can be pulled back onto the region allowed by linear
//! constraints through a [`Projector`]; [`Projection`] is the standard one, turning separation
//! and alignment constraints, node non-overlap and group containment into one
//! [`vpsc::Solver`] problem per axis.

pub use steller_vpsc as vpsc;

pub mod constraints;
pub mod descent;
pub mod error;
pub mod group;
pub mod projection;
pub mod random;
pub mod rectangle;
pub mod scanline;

pub use constraints::{
    AlignmentConstraint, AlignmentOffset, Axis, LayoutConstraint, SeparationConstraint,
};
pub use descent::{Descent, DescentOptions, GridSnap, Locks, NoProjection};
pub use error::{Error, Result};
pub use group::{
    Group, compute_group_bounds, generate_x_group_constraints, generate_y_group_constraints,
    validate_groups,
};
pub use projection::{GraphNode, Projection, ProjectionOptions, Projector};
pub use random::PseudoRandom;
pub use rectangle::Rectangle;
pub use scanline::{
    generate_constraints, generate_x_constraints, generate_y_constraints, remove_overlaps,
};
