//! Loop reversal and scaling.

use super::{check_indices, mismatch, LoopTransform};
use crate::lambda::TransformMatrix;
use crate::utils::LambdaResult;

/// Run one loop of the nest backwards.
#[derive(Debug, Clone)]
pub struct Reversal {
    pub loop_index: usize,
}

impl Reversal {
    pub fn new(loop_index: usize) -> Self {
        Self { loop_index }
    }
}

impl LoopTransform for Reversal {
    fn name(&self) -> &str {
        "reversal"
    }

    fn matrix(&self, depth: usize) -> LambdaResult<TransformMatrix> {
        check_indices(self.name(), depth, &[self.loop_index])?;
        Ok(TransformMatrix::reversal(depth, self.loop_index))
    }
}

/// Multiply one induction variable by a constant.
///
/// The result is not unimodular: the transformed loop steps by `factor`.
#[derive(Debug, Clone)]
pub struct Scaling {
    pub loop_index: usize,
    pub factor: i64,
}

impl Scaling {
    pub fn new(loop_index: usize, factor: i64) -> Self {
        Self { loop_index, factor }
    }
}

impl LoopTransform for Scaling {
    fn name(&self) -> &str {
        "scaling"
    }

    fn matrix(&self, depth: usize) -> LambdaResult<TransformMatrix> {
        check_indices(self.name(), depth, &[self.loop_index])?;
        if self.factor == 0 {
            return Err(mismatch("scaling by zero".to_string()));
        }
        Ok(TransformMatrix::scaling(depth, self.loop_index, self.factor))
    }
}
