//! # LambdaOpt - Linear Loop Transformation Framework
//!
//! Unimodular and non-unimodular transformation of perfect loop nests,
//! built on two pieces:
//! - chains of recurrences (`chrec`), the symbolic form of the evolution
//!   of a scalar across loop iterations;
//! - the lambda loop nest (`lambda`), an abstract nest with linear bounds
//!   that an integer matrix transforms into a new nest.
//!
//! ## Architecture
//!
//! ```text
//! loop IR → extract → lambda nest ─┐
//!         → data references → dependences → legality / interchange heuristic
//!                                  └→ transform → materialize → loop IR
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use lambdaopt::prelude::*;
//!
//! let mut ctx = CompilationContext::default();
//! let mut region = build_region(&mut ctx);
//! let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
//! for report in &reports {
//!     println!("loop {}: {:?}", report.loop_id, report.outcome);
//! }
//! ```

#![warn(clippy::all)]

pub mod analysis;
pub mod chrec;
pub mod codegen;
pub mod context;
pub mod extract;
pub mod ir;
pub mod kernels;
pub mod lambda;
pub mod transform;
pub mod utils;

pub use context::{CompilationContext, LinearTransformConfig};

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::analysis::{
        collect_data_references, is_legal, DataDependence, DataReference, DependenceKind, DependenceOracle,
        DependenceRelation, UniformDependenceTest,
    };
    pub use crate::chrec::{Chrec, LoopId, Scalar};
    pub use crate::codegen::materialize;
    pub use crate::context::{CompilationContext, LinearTransformConfig};
    pub use crate::extract::{extract_loopnest, nestify, perfect_nest_p, ExtractedNest};
    pub use crate::ir::{
        BinOp, CmpOp, ExitTest, Expr, Interpreter, IrBuilder, LoopNode, Node, Operand, Phi, Region, Stmt, Store,
    };
    pub use crate::lambda::{loopnest_transform, BodyVector, LinearExpression, Loop, LoopNest, TransformMatrix};
    pub use crate::transform::{
        linear_transform_loops, transform_nest_with, Interchange, LoopTransform, NestOutcome, NestReport, Reversal,
        Scaling, Skewing,
    };
    pub use crate::utils::errors::*;
    pub use crate::utils::{Symbol, SymbolInterner};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
