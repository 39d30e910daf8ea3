//! Dependence information consumed by the transformation pass.

pub mod dependence;
pub mod legality;

pub use dependence::{
    collect_data_references, DataDependence, DataReference, DependenceKind, DependenceOracle, DependenceRelation,
    UniformDependenceTest,
};
pub use legality::is_legal;
