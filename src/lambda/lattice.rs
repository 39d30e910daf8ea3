//! Lattice bases of sparse loop nests.
//!
//! A loop with step `s` only visits every `s`-th integer point. The
//! lattice `x = base · y + origin + origin_invariants · P` maps a dense
//! space `y` (every loop unit step, starting at zero) onto those points.

use super::nest::LoopNest;
use crate::utils::{IntMatrix, LambdaError, LambdaResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lattice {
    /// Lower triangular, `base[i][i]` is the step of loop `i`
    pub base: IntMatrix,
    pub origin: Vec<i64>,
    /// `depth × invariants`
    pub origin_invariants: IntMatrix,
}

impl Lattice {
    pub fn depth(&self) -> usize {
        self.base.nrows()
    }

    /// True when every loop is dense.
    pub fn is_trivial(&self) -> bool {
        self.base.is_identity()
            && self.origin.iter().all(|&o| o == 0)
            && self.origin_invariants.rows().all(|r| r.iter().all(|&c| c == 0))
    }
}

/// Compute the lattice base of `nest`.
///
/// Loop `i` with a non-unit step starts at its (single) lower bound
/// `lb(x_0..x_{i-1})`, so `x_i = lb(L·y + o) + step_i · y_i`: the lattice
/// row is `Σ_j c_j · base[j] + step_i · e_i` and the origin picks up the
/// constant and invariant parts of the bound. An anchored loop is laid on
/// its linear offset instead.
pub fn compute_lattice_base(nest: &LoopNest) -> LambdaResult<Lattice> {
    let depth = nest.depth();
    let invariants = nest.invariants;
    let mut base = IntMatrix::zeros(depth, depth);
    let mut origin = vec![0; depth];
    let mut origin_invariants = IntMatrix::zeros(depth, invariants);

    for (i, l) in nest.loops.iter().enumerate() {
        if l.step == 1 {
            base.set(i, i, 1);
            continue;
        }

        let lower = if l.anchored {
            vec![l.linear_offset.clone()]
        } else {
            l.effective_lower_bounds()
        };
        let [expr] = lower.as_slice() else {
            return Err(LambdaError::Internal(format!(
                "loop {} has step {} but {} lower bounds",
                i,
                l.step,
                lower.len()
            )));
        };
        if expr.denominator != 1 {
            return Err(LambdaError::Internal(format!(
                "loop {} has step {} and a fractional lower bound {}",
                i, l.step, expr
            )));
        }

        let mut o = expr.constant;
        let mut inv: Vec<i64> = expr.invariant_coefficients.clone();
        inv.resize(invariants, 0);
        for j in 0..i {
            let c = expr.coefficients[j];
            if c == 0 {
                continue;
            }
            for k in 0..=j {
                let v = base.get(i, k) + c * base.get(j, k);
                base.set(i, k, v);
            }
            o += c * origin[j];
            for (p, slot) in inv.iter_mut().enumerate() {
                *slot += c * origin_invariants.get(j, p);
            }
        }
        base.set(i, i, l.step);
        origin[i] = o;
        for (p, &c) in inv.iter().enumerate() {
            origin_invariants.set(i, p, c);
        }
    }

    Ok(Lattice { base, origin, origin_invariants })
}
