//! Utility modules shared by the analysis and transformation code.
//!
//! - Error types
//! - Integer matrix operations
//! - Symbol interning
//! - Text formatting

pub mod errors;
pub mod intern;
pub mod matrix;
pub mod pretty;

pub use errors::*;
pub use intern::{Symbol, SymbolInterner};
pub use matrix::IntMatrix;
