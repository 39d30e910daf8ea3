//! The lambda loop-transformation framework.
//!
//! A loop nest is abstracted into a [`LoopNest`]: per loop a step and
//! lower/upper bounds that are linear in the outer induction variables
//! and the loop invariants. A [`TransformMatrix`] reindexes the iteration
//! space; [`loopnest_transform`] computes the bounds of the transformed
//! nest and [`BodyVector`]s express the old induction variables in terms
//! of the new ones.

pub mod expr;
pub mod fourier_motzkin;
pub mod lattice;
pub mod nest;
pub mod trans;
pub mod transform;

pub use expr::LinearExpression;
pub use fourier_motzkin::{compute_nest_using_fourier_motzkin, Inequality, InequalitySystem, RowBound};
pub use lattice::{compute_lattice_base, Lattice};
pub use nest::{BodyVector, Loop, LoopNest};
pub use trans::TransformMatrix;
pub use transform::{compute_auxiliary_space, compute_step_signs, compute_target_space, loopnest_transform};
