//! Arithmetic on chrecs.
//!
//! The folds never fail: anything that cannot be represented (overflow,
//! sentinels) comes back as a sentinel, `Unknown` winning over `Known`
//! winning over `NotYetAnalyzed`.

use super::{Chrec, LoopId, Scalar};
use std::rc::Rc;

/// Precedence meet of two operands when at least one is a sentinel.
pub(crate) fn sentinel_meet(a: &Chrec, b: &Chrec) -> Option<Chrec> {
    use Chrec::*;
    match (a, b) {
        (Unknown, _) | (_, Unknown) => Some(Unknown),
        (Known, _) | (_, Known) => Some(Known),
        (NotYetAnalyzed, _) | (_, NotYetAnalyzed) => Some(NotYetAnalyzed),
        _ => None,
    }
}

fn scalar_result(value: Option<Scalar>) -> Chrec {
    value.map_or(Chrec::Unknown, Chrec::Value)
}

/// `a + b`
pub fn fold_plus(a: &Chrec, b: &Chrec) -> Chrec {
    if let Some(s) = sentinel_meet(a, b) {
        return s;
    }
    if a.is_zero() {
        return b.clone();
    }
    if b.is_zero() {
        return a.clone();
    }
    add_sub(a, b, false)
}

/// `a - b`
pub fn fold_minus(a: &Chrec, b: &Chrec) -> Chrec {
    if let Some(s) = sentinel_meet(a, b) {
        return s;
    }
    if b.is_zero() {
        return a.clone();
    }
    add_sub(a, b, true)
}

fn combine(a: &Chrec, b: &Chrec, minus: bool) -> Chrec {
    if minus {
        fold_minus(a, b)
    } else {
        fold_plus(a, b)
    }
}

fn negate(c: &Chrec) -> Chrec {
    fold_multiply(c, &Chrec::int(-1))
}

/// Same-variable sums drop a vanishing step.
fn poly_or_base(var: LoopId, base: Chrec, step: Chrec) -> Chrec {
    if step.is_zero() {
        base
    } else {
        Chrec::poly(var, base, step)
    }
}

fn add_sub(a: &Chrec, b: &Chrec, minus: bool) -> Chrec {
    match (a, b) {
        (
            Chrec::Polynomial { var: va, base: ba, step: sa },
            Chrec::Polynomial { var: vb, base: bb, step: sb },
        ) => {
            if va < vb {
                // `a` is invariant in the inner loop `vb`
                let step = if minus { negate(sb) } else { (**sb).clone() };
                Chrec::poly(*vb, combine(a, bb, minus), step)
            } else if va > vb {
                Chrec::poly(*va, combine(ba, b, minus), (**sa).clone())
            } else {
                poly_or_base(*va, combine(ba, bb, minus), combine(sa, sb, minus))
            }
        }
        (Chrec::Polynomial { var, base, step }, Chrec::Value(_)) => {
            Chrec::poly(*var, combine(base, b, minus), (**step).clone())
        }
        (Chrec::Value(_), Chrec::Polynomial { var, base, step }) => {
            let step = if minus { negate(step) } else { (**step).clone() };
            Chrec::poly(*var, combine(a, base, minus), step)
        }
        (Chrec::Value(x), Chrec::Value(y)) => {
            scalar_result(if minus { x.checked_sub(y) } else { x.checked_add(y) })
        }
        _ => Chrec::Unknown,
    }
}

/// `a * b`
pub fn fold_multiply(a: &Chrec, b: &Chrec) -> Chrec {
    if let Some(s) = sentinel_meet(a, b) {
        return s;
    }
    if a.is_one() {
        return b.clone();
    }
    if b.is_one() {
        return a.clone();
    }
    if a.is_zero() || b.is_zero() {
        return Chrec::int(0);
    }

    match (a, b) {
        (
            Chrec::Polynomial { var: va, base: ba, step: sa },
            Chrec::Polynomial { var: vb, base: bb, step: sb },
        ) => {
            if va < vb {
                Chrec::poly(*vb, fold_multiply(a, bb), fold_multiply(a, sb))
            } else if va > vb {
                Chrec::poly(*va, fold_multiply(ba, b), fold_multiply(sa, b))
            } else {
                multiply_same_var(*va, ba, sa, bb, sb)
            }
        }
        (Chrec::Polynomial { var, base, step }, Chrec::Value(_)) => {
            Chrec::poly(*var, fold_multiply(base, b), fold_multiply(step, b))
        }
        (Chrec::Value(_), Chrec::Polynomial { var, base, step }) => {
            Chrec::poly(*var, fold_multiply(a, base), fold_multiply(a, step))
        }
        (Chrec::Value(x), Chrec::Value(y)) => scalar_result(x.checked_mul(y)),
        _ => Chrec::Unknown,
    }
}

/// `{a, +, b}_v * {c, +, d}_v = {ac, +, {ad + bc + bd, +, 2bd}_v}_v`
fn multiply_same_var(var: LoopId, a: &Rc<Chrec>, b: &Rc<Chrec>, c: &Rc<Chrec>, d: &Rc<Chrec>) -> Chrec {
    let ac = fold_multiply(a, c);
    let ad = fold_multiply(a, d);
    let bc = fold_multiply(b, c);
    let bd = fold_multiply(b, d);
    let first = fold_plus(&fold_plus(&ad, &bc), &bd);
    let second = fold_multiply(&Chrec::int(2), &bd);
    Chrec::poly(var, ac, poly_or_base(var, first, second))
}
