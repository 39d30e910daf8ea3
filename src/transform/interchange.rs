//! Loop interchange transformation.
//!
//! Interchange swaps two loops in a loop nest, which can improve
//! memory access patterns or expose parallelism.
//!
//! Example:
//! ```text
//! for i = 0 to N:
//!   for j = 0 to M:
//!     A[j][i] = A[j][i - 1] + 1
//! ```
//! becomes (after interchange(0, 1)):
//! ```text
//! for j = 0 to M:
//!   for i = 0 to N:
//!     A[j][i] = A[j][i - 1] + 1
//! ```
//!
//! [`try_interchange_loops`] decides which loops to swap from the access
//! strides and dependence distances of each loop.

use super::{check_indices, LoopTransform};
use crate::analysis::{is_legal, DataDependence, DataReference, DependenceRelation};
use crate::chrec::eval::evolution_part_in_loop_num;
use crate::extract::ExtractedNest;
use crate::lambda::TransformMatrix;
use crate::utils::LambdaResult;
use log::{debug, trace};
use std::cmp::Reverse;

/// Loop interchange transformation.
#[derive(Debug, Clone)]
pub struct Interchange {
    /// First loop to swap
    pub outer: usize,
    /// Second loop to swap
    pub inner: usize,
}

impl Interchange {
    /// Create a new interchange transformation.
    pub fn new(outer: usize, inner: usize) -> Self {
        Self { outer, inner }
    }
}

impl LoopTransform for Interchange {
    fn name(&self) -> &str {
        "interchange"
    }

    fn matrix(&self, depth: usize) -> LambdaResult<TransformMatrix> {
        check_indices(self.name(), depth, &[self.outer, self.inner])?;
        Ok(TransformMatrix::interchange(depth, self.outer, self.inner))
    }
}

/// What one loop of a nest costs when it runs innermost.
///
/// Statistics order so that the loop that is better placed inside compares
/// smaller: first the strides of the accesses it drives, then the total
/// dependence distance it carries, then (reversed) the number of
/// dependences it does not carry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InterchangeStats {
    /// Per array dimension, most significant first, the sum of the
    /// absolute steps of the subscripts in this loop
    pub access_strides: Vec<i64>,
    /// Sum of the absolute distances at this level
    pub dependence_steps: i64,
    pub deps_not_carried: Reverse<usize>,
}

/// Gather the statistics of the loop at `level` of `nest`.
pub fn gather_interchange_stats(
    nest: &ExtractedNest,
    level: usize,
    deps: &[DataDependence],
    refs: &[DataReference],
) -> InterchangeStats {
    let mut dependence_steps = 0i64;
    let mut not_carried = 0usize;
    for dep in deps {
        let DependenceRelation::Distance(d) = &dep.relation else { continue };
        let Some(&dist) = d.get(level) else { continue };
        dependence_steps = dependence_steps.saturating_add(dist.saturating_abs());
        if dist == 0 {
            not_carried += 1;
        }
    }

    // subscripts are aligned on the fastest varying one
    let rank = refs.iter().map(|r| r.access_fns.len()).max().unwrap_or(0);
    let mut access_strides = vec![0i64; rank];
    if let Some(&loop_id) = nest.loop_ids.get(level) {
        for r in refs {
            let pad = rank - r.access_fns.len();
            for (k, f) in r.access_fns.iter().enumerate() {
                let step = evolution_part_in_loop_num(f, loop_id).and_then(|c| c.as_int()).unwrap_or(0);
                access_strides[pad + k] = access_strides[pad + k].saturating_add(step.saturating_abs());
            }
        }
    }

    InterchangeStats { access_strides, dependence_steps, deps_not_carried: Reverse(not_carried) }
}

/// Improve `trans` by exchanging loops of `nest`.
///
/// For every pair of loops `i` outside `j`, rows `i` and `j` are exchanged
/// when loop `i` is the better inner loop of the two; an exchange that
/// makes the transform illegal is undone.
pub fn try_interchange_loops(
    mut trans: TransformMatrix,
    nest: &ExtractedNest,
    deps: &[DataDependence],
    refs: &[DataReference],
) -> TransformMatrix {
    let depth = nest.depth();
    if trans.depth() != depth {
        return trans;
    }
    let stats: Vec<InterchangeStats> =
        (0..depth).map(|level| gather_interchange_stats(nest, level, deps, refs)).collect();
    for j in 1..depth {
        for i in 0..j {
            trace!("loop {}: {:?}, loop {}: {:?}", i, stats[i], j, stats[j]);
            if stats[i] < stats[j] {
                trans.row_exchange(i, j);
                if is_legal(&trans, deps) {
                    debug!("interchanging loops {} and {}", nest.loop_ids[i], nest.loop_ids[j]);
                } else {
                    trans.row_exchange(i, j);
                }
            }
        }
    }
    trans
}
