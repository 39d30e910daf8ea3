//! Loop transformations as integer matrices over the iteration space.
//!
//! Each transformation produces a [`TransformMatrix`] for a nest of a
//! given depth; transformations compose by matrix product and are checked
//! against the dependences of the nest before they are applied.

pub mod interchange;
pub mod pipeline;
pub mod reversal;
pub mod skewing;

pub use interchange::{gather_interchange_stats, try_interchange_loops, Interchange, InterchangeStats};
pub use pipeline::{linear_transform_loops, transform_nest_with, NestOutcome, NestReport};
pub use reversal::{Reversal, Scaling};
pub use skewing::Skewing;

use crate::analysis::{is_legal, DataDependence};
use crate::lambda::TransformMatrix;
use crate::utils::{LambdaError, LambdaResult, TransformError, TransformErrorKind};

/// A loop transformation that can be written as a matrix.
pub trait LoopTransform {
    /// Get transformation name.
    fn name(&self) -> &str;

    /// The matrix of this transformation for a nest `depth` loops deep.
    fn matrix(&self, depth: usize) -> LambdaResult<TransformMatrix>;

    /// Check if transformation is legal given dependencies.
    fn is_legal(&self, depth: usize, deps: &[DataDependence]) -> bool {
        self.matrix(depth).is_ok_and(|t| is_legal(&t, deps))
    }
}

impl LoopTransform for TransformMatrix {
    fn name(&self) -> &str {
        "matrix"
    }

    fn matrix(&self, depth: usize) -> LambdaResult<TransformMatrix> {
        if self.depth() != depth || self.matrix.ncols() != depth {
            return Err(mismatch(format!("{}x{} matrix for a nest of depth {}", self.depth(), self.matrix.ncols(), depth)));
        }
        Ok(self.clone())
    }
}

/// The product of `transforms`, the first one applied first.
pub fn compose_transforms(depth: usize, transforms: &[&dyn LoopTransform]) -> LambdaResult<TransformMatrix> {
    let mut result = TransformMatrix::identity(depth);
    for t in transforms {
        let m = t.matrix(depth)?;
        result = m
            .compose(&result)
            .ok_or_else(|| mismatch(format!("cannot compose {} at depth {}", t.name(), depth)))?;
    }
    Ok(result)
}

pub(crate) fn mismatch(message: String) -> LambdaError {
    TransformError::new(TransformErrorKind::DimensionMismatch, message).into()
}

/// Check that every loop index is inside a nest of `depth` loops.
pub(crate) fn check_indices(name: &str, depth: usize, indices: &[usize]) -> LambdaResult<()> {
    match indices.iter().find(|&&k| k >= depth) {
        Some(k) => Err(mismatch(format!("{} of loop {} in a nest of depth {}", name, k, depth))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DependenceKind;

    #[test]
    fn test_compose_order() {
        let skew = Skewing::new(1, 0, 1);
        let swap = Interchange::new(0, 1);
        let t = compose_transforms(2, &[&skew, &swap]).unwrap();
        // interchange after skewing: rows (1, 1), (1, 0)
        assert_eq!(t, TransformMatrix::from_rows(vec![vec![1, 1], vec![1, 0]]));
    }

    #[test]
    fn test_matrix_as_transform() {
        let t = TransformMatrix::interchange(2, 0, 1);
        assert!(t.matrix(2).is_ok());
        assert!(matches!(
            t.matrix(3),
            Err(LambdaError::Transform(TransformError { kind: TransformErrorKind::DimensionMismatch, .. }))
        ));
        let deps = [DataDependence::distance(0, 1, DependenceKind::Flow, vec![1, -1])];
        assert!(!LoopTransform::is_legal(&t, 2, &deps));
        assert!(!LoopTransform::is_legal(&t, 3, &[]));
    }
}
