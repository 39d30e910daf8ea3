//! Code generation: turning a transformed loop nest back into loop IR.

pub mod lower;
pub mod materialize;

pub use lower::{Rounding, StatementBuilder};
pub use materialize::materialize;
