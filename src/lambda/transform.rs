//! Applying a transform matrix to a lambda loopnest.
//!
//! `T · L = H · U` where `L` is the lattice base of the nest, `U` is
//! unimodular and `H` lower triangular. The dense lattice space is first
//! mapped by `U` (the auxiliary space, bounds found by Fourier–Motzkin),
//! then stretched by `H` (the target space, whose loops step by the
//! diagonal of `H`).

use super::expr::LinearExpression;
use super::fourier_motzkin::{compute_nest_using_fourier_motzkin, InequalitySystem};
use super::lattice::{compute_lattice_base, Lattice};
use super::nest::{Loop, LoopNest};
use super::trans::TransformMatrix;
use crate::utils::matrix::{vector_is_zero, IntMatrix};
use crate::utils::{LambdaError, LambdaResult, TransformError, TransformErrorKind};
use log::{debug, trace};

fn check_triangular(nest: &LoopNest) -> LambdaResult<()> {
    for (i, l) in nest.loops.iter().enumerate() {
        let all = l.lower_bounds.iter().chain(&l.upper_bounds).chain(std::iter::once(&l.linear_offset));
        for e in all {
            if e.coefficients.iter().skip(i).any(|&c| c != 0) {
                return Err(LambdaError::Internal(format!("bound {} of loop {} uses an inner loop", e, i)));
            }
        }
    }
    Ok(())
}

/// Bounds of the nest in the space `z = U · y`, where `y` are the dense
/// lattice coordinates of the iteration points.
pub fn compute_auxiliary_space(
    nest: &LoopNest,
    unimodular: &IntMatrix,
    lattice: &Lattice,
) -> LambdaResult<LoopNest> {
    let depth = nest.depth();
    let mut system = InequalitySystem::new(depth, nest.invariants);

    for (i, l) in nest.loops.iter().enumerate() {
        let (lower, upper) = if l.step > 0 {
            (l.effective_lower_bounds(), l.effective_upper_bounds())
        } else {
            (l.effective_upper_bounds(), l.effective_lower_bounds())
        };
        for e in &lower {
            system.push_lower(i, e);
        }
        for e in &upper {
            system.push_upper(i, e);
        }
    }

    // x = L·y + o + O·P
    system.shift(&lattice.origin, &lattice.origin_invariants);
    system.map_variables(&lattice.base)?;

    let (adj, det) = unimodular
        .inverse()
        .ok_or_else(|| LambdaError::Internal("unimodular part is singular".into()))?;
    if det.abs() != 1 {
        return Err(LambdaError::Internal(format!("unimodular part has determinant {}", det)));
    }
    system.map_variables(&adj.scale(det))?;

    compute_nest_using_fourier_motzkin(&system)
}

/// Replay the column exchanges of the Hermite reduction of `trans` on
/// the step signs of the original loops.
pub fn compute_step_signs(trans: &IntMatrix, signs: &[i64]) -> Vec<i64> {
    let n = trans.nrows();
    let mut h = trans.clone();
    let mut new_signs = signs.to_vec();

    for j in 0..n {
        for i in j..n {
            if h.get(j, i) < 0 {
                h.col_negate(i);
            }
        }
        while (j + 1..n).any(|i| h.get(j, i) != 0) {
            let min_col = (j..n)
                .filter(|&i| h.get(j, i) != 0)
                .min_by_key(|&i| h.get(j, i).abs())
                .unwrap_or(j);
            h.col_exchange(j, min_col);
            new_signs.swap(j, min_col);
            for i in (j + 1)..n {
                let factor = h.get(j, i) / h.get(j, j);
                if factor != 0 {
                    h.col_add(j, i, -factor);
                }
            }
        }
    }
    new_signs
}

/// Bounds of the nest in the space `x'' = H · z`.
///
/// Loop `k` steps by `H[k][k]` and carries the linear offset
/// `Σ_{j<k} H[k][j] · z_j` expressed in the new variables. Its bounds are
/// the auxiliary bounds of `z_k` scaled by `H[k][k]`; the loop is anchored
/// so they round in `z` space. Loops whose step sign is negative run from
/// their upper to their lower bound.
pub fn compute_target_space(aux: &LoopNest, h: &IntMatrix, signs: &[i64]) -> LambdaResult<LoopNest> {
    let depth = aux.depth();
    let invariants = aux.invariants;
    let (adj, det) = h
        .inverse()
        .ok_or_else(|| LambdaError::Internal("triangular part is singular".into()))?;

    let mut h1 = h.clone();
    for i in 0..depth {
        h1.set(i, i, 0);
    }
    let offsets = h1
        .mul(&adj)
        .ok_or_else(|| LambdaError::Internal("offset matrix has the wrong shape".into()))?;

    let map_bound = |e: &LinearExpression, factor: i64| -> LambdaResult<LinearExpression> {
        let coefficients = adj
            .vec_mul(&e.coefficients)
            .ok_or_else(|| LambdaError::Internal("bound has the wrong depth".into()))?;
        let mapped = LinearExpression {
            coefficients: coefficients.iter().map(|c| c * factor).collect(),
            invariant_coefficients: e.invariant_coefficients.iter().map(|c| c * factor * det).collect(),
            constant: e.constant * factor * det,
            denominator: e.denominator * det,
        };
        Ok(mapped.normalize())
    };

    let mut loops = Vec::with_capacity(depth);
    for (k, aux_loop) in aux.loops.iter().enumerate() {
        let factor = h.get(k, k);
        let mut l = Loop::new(factor, depth, invariants);
        l.anchored = true;
        l.linear_offset = LinearExpression {
            coefficients: offsets.row(k).to_vec(),
            invariant_coefficients: vec![0; invariants],
            constant: 0,
            denominator: det,
        }
        .normalize();
        for e in &aux_loop.lower_bounds {
            l.lower_bounds.push(map_bound(e, factor)?);
        }
        for e in &aux_loop.upper_bounds {
            l.upper_bounds.push(map_bound(e, factor)?);
        }
        if signs.get(k).copied().unwrap_or(1) < 0 {
            std::mem::swap(&mut l.lower_bounds, &mut l.upper_bounds);
            l.step = -l.step;
        }
        loops.push(l);
    }
    Ok(LoopNest::new(loops, invariants))
}

/// Move the target nest by the image of the lattice origin: the loops
/// iterate `x' = x'' + T·o + T·O·P`.
fn add_origin(target: &mut LoopNest, origin: &[i64], origin_invariants: &IntMatrix) {
    let depth = target.depth();
    let invariants = target.invariants;
    let shift_of = |k: usize| LinearExpression {
        coefficients: vec![0; depth],
        invariant_coefficients: origin_invariants.row(k).to_vec(),
        constant: origin[k],
        denominator: 1,
    };
    // x''_j = x'_j - shift_j
    let subst: Vec<LinearExpression> = (0..depth)
        .map(|j| &LinearExpression::var(j, depth, invariants) - &shift_of(j))
        .collect();

    for (k, l) in target.loops.iter_mut().enumerate() {
        let offset = l.linear_offset.substitute(&subst);
        l.linear_offset = (&offset + &shift_of(k)).normalize();
        for e in l.lower_bounds.iter_mut().chain(l.upper_bounds.iter_mut()) {
            *e = e.substitute(&subst).normalize();
        }
    }
}

/// Transform `nest` by `trans`, giving the nest that visits `T · x` for
/// every iteration point `x` of `nest`.
pub fn loopnest_transform(nest: &LoopNest, trans: &TransformMatrix) -> LambdaResult<LoopNest> {
    let depth = nest.depth();
    if trans.depth() != depth || !trans.matrix.is_square() {
        return Err(TransformError::new(
            TransformErrorKind::DimensionMismatch,
            format!("{}x{} transform for a nest of depth {}", trans.depth(), trans.matrix.ncols(), depth),
        )
        .into());
    }
    if trans.denominator != 1 {
        return Err(TransformError::new(
            TransformErrorKind::Singular,
            format!("transform has denominator {}", trans.denominator),
        )
        .into());
    }
    if trans.determinant().unwrap_or(0) == 0 {
        return Err(TransformError::new(TransformErrorKind::Singular, "transform is singular").into());
    }
    check_triangular(nest)?;

    let lattice = compute_lattice_base(nest)?;
    trace!("lattice base:\n{}origin: {:?}", lattice.base, lattice.origin);

    let trans1 = trans
        .matrix
        .mul(&lattice.base)
        .ok_or_else(|| LambdaError::Internal("lattice has the wrong depth".into()))?;
    let (h, u) = trans1.hermite_decompose();
    trace!("H:\n{}U:\n{}", h, u);

    let aux = compute_auxiliary_space(nest, &u, &lattice)?;
    debug!("auxiliary nest:\n{}", aux);

    let signs: Vec<i64> = nest.loops.iter().map(|l| l.step.signum()).collect();
    let signs = compute_step_signs(&trans1, &signs);
    let mut target = compute_target_space(&aux, &h, &signs)?;

    let origin = trans
        .apply(&lattice.origin)
        .ok_or_else(|| LambdaError::Internal("lattice origin has the wrong depth".into()))?;
    let origin_invariants = trans
        .matrix
        .mul(&lattice.origin_invariants)
        .ok_or_else(|| LambdaError::Internal("lattice origin has the wrong depth".into()))?;
    let has_origin =
        !vector_is_zero(&origin) || origin_invariants.rows().any(|r| !vector_is_zero(r));
    if has_origin {
        add_origin(&mut target, &origin, &origin_invariants);
    }
    debug!("target nest:\n{}", target);
    Ok(target)
}
