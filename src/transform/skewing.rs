//! Loop skewing transformation.
//!
//! Skewing adds a multiple of an outer induction variable to an inner
//! one. It changes no dependence at the source level but can turn
//! dependences with negative inner distances into ones that a following
//! interchange respects.
//!
//! Example (skew j by i with factor 1):
//! ```text
//! for i = 0 to N:                for i = 0 to N:
//!   for j = 0 to M:       =>       for j' = i to i + M:
//!     S(i, j)                        S(i, j' - i)
//! ```

use super::{check_indices, mismatch, LoopTransform};
use crate::analysis::{DataDependence, DependenceKind, DependenceRelation};
use crate::lambda::TransformMatrix;
use crate::utils::LambdaResult;

/// Loop skewing transformation.
#[derive(Debug, Clone)]
pub struct Skewing {
    /// Loop whose induction variable changes
    pub target: usize,
    /// Loop whose induction variable is added
    pub source: usize,
    pub factor: i64,
}

impl Skewing {
    pub fn new(target: usize, source: usize, factor: i64) -> Self {
        Self { target, source, factor }
    }

    /// The skew that makes every distance at `inner` non-negative once it
    /// is carried by `outer`, so that `outer` and `inner` can be swapped.
    pub fn wavefront(deps: &[DataDependence], outer: usize, inner: usize) -> Self {
        Self::new(inner, outer, Self::compute_optimal_factor(deps, outer, inner))
    }

    /// Smallest factor `f >= 1` with `d_inner + f · d_outer >= 0` for every
    /// distance carried by `outer`.
    pub fn compute_optimal_factor(deps: &[DataDependence], outer: usize, inner: usize) -> i64 {
        let mut factor = 1i64;
        for dep in deps {
            if dep.kind == DependenceKind::Input {
                continue;
            }
            let DependenceRelation::Distance(d) = &dep.relation else { continue };
            let d_outer = d.get(outer).copied().unwrap_or(0);
            let d_inner = d.get(inner).copied().unwrap_or(0);
            if d_outer > 0 && d_inner < 0 {
                factor = factor.max((-d_inner + d_outer - 1) / d_outer);
            }
        }
        factor
    }
}

impl LoopTransform for Skewing {
    fn name(&self) -> &str {
        "skewing"
    }

    fn matrix(&self, depth: usize) -> LambdaResult<TransformMatrix> {
        check_indices(self.name(), depth, &[self.target, self.source])?;
        if self.target <= self.source {
            return Err(mismatch(format!(
                "loop {} can only be skewed by an outer loop, not {}",
                self.target, self.source
            )));
        }
        Ok(TransformMatrix::skew(depth, self.target, self.source, self.factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{compose_transforms, Interchange};

    fn flow(d: Vec<i64>) -> DataDependence {
        DataDependence::distance(0, 1, DependenceKind::Flow, d)
    }

    #[test]
    fn test_skewing_matrix() {
        let t = Skewing::new(1, 0, 2).matrix(2).unwrap();
        assert_eq!(t.apply(&[1, 1]), Some(vec![1, 3]));
        assert!(Skewing::new(0, 1, 1).matrix(2).is_err());
        assert!(Skewing::new(2, 0, 1).matrix(2).is_err());
    }

    #[test]
    fn test_wavefront_enables_interchange() {
        let deps = vec![flow(vec![1, -2]), flow(vec![0, 1])];
        assert!(!Interchange::new(0, 1).is_legal(2, &deps));
        let skew = Skewing::wavefront(&deps, 0, 1);
        assert_eq!(skew.factor, 2);
        assert!(skew.is_legal(2, &deps));
        let t = compose_transforms(2, &[&skew, &Interchange::new(0, 1)]).unwrap();
        assert!(t.is_legal(2, &deps));
    }

    #[test]
    fn test_default_factor() {
        assert_eq!(Skewing::compute_optimal_factor(&[flow(vec![1, 0])], 0, 1), 1);
        let read_read = DataDependence::distance(0, 1, DependenceKind::Input, vec![1, -5]);
        assert_eq!(Skewing::compute_optimal_factor(&[read_read], 0, 1), 1);
    }
}
