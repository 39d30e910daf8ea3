//! Evaluation of chrecs and structural walkers.

use super::fold::{fold_multiply, fold_plus};
use super::{Chrec, LoopId};

/// Binomial coefficient `C(n, k)`, `None` on overflow.
fn binomial(n: i64, k: i64) -> Option<i64> {
    if k < 0 || n < 0 {
        return None;
    }
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut result: i64 = 1;
    for i in 0..k {
        // result * (n - i) is always divisible by (i + 1)
        result = result.checked_mul(n - i)? / (i + 1);
    }
    Some(result)
}

/// Newton interpolation: `Σ_k C(n, k) · coefficient_k`.
fn evaluate_newton(var: LoopId, chrec: &Chrec, n: i64, k: i64) -> Chrec {
    let mut current = chrec;
    while let Chrec::Polynomial { var: v, base, .. } = current {
        if *v <= var {
            break;
        }
        current = base;
    }

    let Some(coeff) = binomial(n, k) else {
        return Chrec::Unknown;
    };
    match current {
        Chrec::Polynomial { var: v, base, step } if *v == var => {
            let rest = evaluate_newton(var, step, n, k + 1);
            fold_plus(&fold_multiply(base, &Chrec::int(coeff)), &rest)
        }
        other => fold_multiply(other, &Chrec::int(coeff)),
    }
}

/// Value of `chrec` at iteration `n` of loop `var`.
///
/// Evolutions in loops other than `var` are kept symbolic. Negative `n`
/// and overflowing binomials give `Unknown`.
pub fn evaluate(var: LoopId, chrec: &Chrec, n: i64) -> Chrec {
    match chrec {
        Chrec::Polynomial { var: v, base, step } => {
            if n < 0 {
                return Chrec::Unknown;
            }
            if *v == var && chrec.is_affine() {
                return fold_plus(base, &fold_multiply(step, &Chrec::int(n)));
            }
            evaluate_newton(var, chrec, n, 0)
        }
        _ => chrec.clone(),
    }
}

/// Apply `chrec` to a possibly symbolic iteration count `x`.
///
/// Affine evolutions in `var` give `base + step·x`; non-polynomial chrecs
/// are returned as they are; higher degrees need a non-negative integer.
pub fn apply(var: LoopId, chrec: &Chrec, x: &Chrec) -> Chrec {
    if chrec.is_sentinel() || x.is_sentinel() {
        return Chrec::Unknown;
    }
    match chrec {
        Chrec::Polynomial { var: v, base, step } if *v == var && chrec.is_affine() => {
            fold_plus(base, &fold_multiply(step, x))
        }
        Chrec::Polynomial { .. } => match x.as_int() {
            Some(n) if n >= 0 => evaluate(var, chrec, n),
            _ => Chrec::Unknown,
        },
        _ => chrec.clone(),
    }
}

/// Value at the first iteration of every loop.
pub fn initial_condition(chrec: &Chrec) -> Chrec {
    match chrec {
        Chrec::Polynomial { base, .. } => initial_condition(base),
        _ => chrec.clone(),
    }
}

fn component_in_loop_num(chrec: &Chrec, loop_num: LoopId, right: bool) -> Option<Chrec> {
    match chrec {
        Chrec::Polynomial { var, base, step } => {
            if *var == loop_num {
                let component = if right { (**step).clone() } else { (**base).clone() };
                match base.variable() {
                    Some(inner) if inner == *var => {
                        let nested = component_in_loop_num(base, loop_num, right)?;
                        Some(Chrec::poly(loop_num, nested, component))
                    }
                    _ => Some(component),
                }
            } else if *var < loop_num {
                // invariant in loop_num
                if right {
                    None
                } else {
                    Some(chrec.clone())
                }
            } else {
                component_in_loop_num(base, loop_num, right)
            }
        }
        _ if chrec.is_sentinel() => Some(chrec.clone()),
        _ => {
            if right {
                None
            } else {
                Some(chrec.clone())
            }
        }
    }
}

/// The evolution of `chrec` in loop `loop_num`, `None` when it does not
/// evolve there. `evolution_part_in_loop_num({{0, +, 1}_1, +, 2}_1, 1)`
/// is `{1, +, 2}_1`.
pub fn evolution_part_in_loop_num(chrec: &Chrec, loop_num: LoopId) -> Option<Chrec> {
    component_in_loop_num(chrec, loop_num, true)
}

/// The value of `chrec` on entry to loop `loop_num`.
pub fn initial_condition_in_loop_num(chrec: &Chrec, loop_num: LoopId) -> Chrec {
    component_in_loop_num(chrec, loop_num, false).unwrap_or_else(|| chrec.clone())
}

/// Keep only the evolution in `loop_num`; outer evolutions collapse to
/// their initial value.
pub fn hide_evolution_in_other_loops_than_loop(chrec: &Chrec, loop_num: LoopId) -> Chrec {
    match chrec {
        Chrec::Polynomial { var, base, step } => {
            if *var == loop_num {
                Chrec::poly(loop_num, hide_evolution_in_other_loops_than_loop(base, loop_num), (**step).clone())
            } else if *var < loop_num {
                initial_condition(chrec)
            } else {
                hide_evolution_in_other_loops_than_loop(base, loop_num)
            }
        }
        _ => chrec.clone(),
    }
}

/// Replace the evolution of `chrec` in `loop_num` by `new_evol`.
pub fn reset_evolution_in_loop(loop_num: LoopId, chrec: &Chrec, new_evol: &Chrec) -> Chrec {
    if let Chrec::Polynomial { var, base, step } = chrec {
        if *var > loop_num {
            return Chrec::poly(
                *var,
                reset_evolution_in_loop(loop_num, base, new_evol),
                reset_evolution_in_loop(loop_num, step, new_evol),
            );
        }
    }
    let mut current = chrec;
    while let Chrec::Polynomial { var, base, .. } = current {
        if *var != loop_num {
            break;
        }
        current = base;
    }
    Chrec::poly(loop_num, current.clone(), new_evol.clone())
}

/// Replace the innermost base of `chrec` by `init`.
pub fn replace_initial_condition(chrec: &Chrec, init: &Chrec) -> Chrec {
    match chrec {
        Chrec::Polynomial { var, base, step } => {
            Chrec::poly(*var, replace_initial_condition(base, init), (**step).clone())
        }
        _ if chrec.is_sentinel() => chrec.clone(),
        _ => init.clone(),
    }
}

/// Meet of the evolutions reaching a value along two paths.
pub fn merge(a: &Chrec, b: &Chrec) -> Chrec {
    use Chrec::*;
    match (a, b) {
        (Unknown, _) | (_, Unknown) => Unknown,
        (Known, _) | (_, Known) => Known,
        (NotYetAnalyzed, _) => b.clone(),
        (_, NotYetAnalyzed) => a.clone(),
        _ if a == b => a.clone(),
        _ => Unknown,
    }
}
