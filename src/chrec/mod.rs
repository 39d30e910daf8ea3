//! Chains of recurrences.
//!
//! A chrec describes how a value evolves across the iterations of a loop
//! nest. `{base, +, step}_v` is the value `base` at iteration 0 of loop
//! `v`, incremented by `step` at every iteration. Both parts may be chrecs
//! in other (or the same) loops:
//!
//! ```text
//! for i            // loop 1
//!   for j          // loop 2
//!     x = 3*i + j  // {{0, +, 3}_1, +, 1}_2
//! ```
//!
//! Nodes are immutable and shared through `Rc`; every operation builds a
//! new tree. Evolutions that cannot be represented are the three sentinels
//! [`Chrec::Unknown`], [`Chrec::Known`] and [`Chrec::NotYetAnalyzed`].

pub mod eval;
pub mod fold;

use crate::utils::{Symbol, SymbolInterner};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

pub use eval::{
    evaluate, apply, evolution_part_in_loop_num, hide_evolution_in_other_loops_than_loop,
    initial_condition, initial_condition_in_loop_num, merge, replace_initial_condition,
    reset_evolution_in_loop,
};
pub use fold::{fold_minus, fold_multiply, fold_plus};

/// Loop number. Loops nested deeper carry larger numbers.
pub type LoopId = usize;

/// A loop-invariant value: an integer or a symbolic expression over
/// invariant names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int(i64),
    Sym(Symbol),
    Add(Rc<Scalar>, Rc<Scalar>),
    Mul(Rc<Scalar>, Rc<Scalar>),
    Neg(Rc<Scalar>),
}

impl Scalar {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Scalar::Int(0))
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Scalar::Int(1))
    }

    pub fn contains_symbols(&self) -> bool {
        match self {
            Scalar::Int(_) => false,
            Scalar::Sym(_) => true,
            Scalar::Add(a, b) | Scalar::Mul(a, b) => a.contains_symbols() || b.contains_symbols(),
            Scalar::Neg(a) => a.contains_symbols(),
        }
    }

    /// Addition with constant folding. Linear operands are collected into
    /// the shape of [`Scalar::from_linear_terms`]. `None` on overflow.
    pub fn checked_add(&self, other: &Scalar) -> Option<Scalar> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.checked_add(*b).map(Scalar::Int),
            (a, b) if b.is_zero() => Some(a.clone()),
            (a, b) if a.is_zero() => Some(b.clone()),
            (a, b) => match (a.linear_terms(), b.linear_terms()) {
                (Some((mut terms, ca)), Some((other, cb))) => {
                    for (s, c) in other {
                        let e = terms.entry(s).or_insert(0);
                        *e = e.checked_add(c)?;
                    }
                    Some(Scalar::from_linear_terms(&terms, ca.checked_add(cb)?))
                }
                _ => Some(Scalar::Add(Rc::new(a.clone()), Rc::new(b.clone()))),
            },
        }
    }

    pub fn checked_sub(&self, other: &Scalar) -> Option<Scalar> {
        self.checked_add(&other.checked_neg()?)
    }

    /// Multiplication with constant folding. `None` on overflow.
    pub fn checked_mul(&self, other: &Scalar) -> Option<Scalar> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.checked_mul(*b).map(Scalar::Int),
            (a, b) if a.is_zero() || b.is_zero() => Some(Scalar::Int(0)),
            (a, b) if b.is_one() => Some(a.clone()),
            (a, b) if a.is_one() => Some(b.clone()),
            (a, Scalar::Int(-1)) | (Scalar::Int(-1), a) => a.checked_neg(),
            (a, Scalar::Int(k)) | (Scalar::Int(k), a) if a.linear_terms().is_some() => {
                let (terms, c) = a.linear_terms()?;
                let terms = terms.into_iter().map(|(s, v)| v.checked_mul(*k).map(|v| (s, v))).collect::<Option<_>>()?;
                Some(Scalar::from_linear_terms(&terms, c.checked_mul(*k)?))
            }
            (a, b) => Some(Scalar::Mul(Rc::new(a.clone()), Rc::new(b.clone()))),
        }
    }

    pub fn checked_neg(&self) -> Option<Scalar> {
        match self {
            Scalar::Int(v) => v.checked_neg().map(Scalar::Int),
            Scalar::Neg(inner) => Some((**inner).clone()),
            Scalar::Sym(_) => Some(Scalar::Neg(Rc::new(self.clone()))),
            other => match other.linear_terms() {
                Some((terms, c)) => {
                    let terms = terms.into_iter().map(|(s, v)| v.checked_neg().map(|v| (s, v))).collect::<Option<_>>()?;
                    Some(Scalar::from_linear_terms(&terms, c.checked_neg()?))
                }
                None => Some(Scalar::Neg(Rc::new(other.clone()))),
            },
        }
    }

    /// `Σ c·sym + constant` with the symbols in order and the constant
    /// last. Zero coefficients are dropped.
    pub fn from_linear_terms(terms: &BTreeMap<Symbol, i64>, constant: i64) -> Scalar {
        let mut acc: Option<Scalar> = None;
        for (&s, &c) in terms.iter().filter(|(_, c)| **c != 0) {
            let term = match c {
                1 => Scalar::Sym(s),
                -1 => Scalar::Neg(Rc::new(Scalar::Sym(s))),
                c => Scalar::Mul(Rc::new(Scalar::Int(c)), Rc::new(Scalar::Sym(s))),
            };
            acc = Some(match acc {
                None => term,
                Some(a) => Scalar::Add(Rc::new(a), Rc::new(term)),
            });
        }
        match acc {
            None => Scalar::Int(constant),
            Some(a) if constant == 0 => a,
            Some(a) => Scalar::Add(Rc::new(a), Rc::new(Scalar::Int(constant))),
        }
    }

    /// `(Σ c·sym, constant)` when the value is linear in its symbols.
    pub fn linear_terms(&self) -> Option<(BTreeMap<Symbol, i64>, i64)> {
        match self {
            Scalar::Int(v) => Some((BTreeMap::new(), *v)),
            Scalar::Sym(s) => Some((BTreeMap::from([(*s, 1)]), 0)),
            Scalar::Add(a, b) => {
                let (mut terms, ca) = a.linear_terms()?;
                let (other, cb) = b.linear_terms()?;
                for (s, c) in other {
                    let e = terms.entry(s).or_insert(0);
                    *e = e.checked_add(c)?;
                }
                terms.retain(|_, c| *c != 0);
                Some((terms, ca.checked_add(cb)?))
            }
            Scalar::Neg(a) => {
                let (terms, c) = a.linear_terms()?;
                let terms = terms.into_iter().map(|(s, k)| k.checked_neg().map(|k| (s, k))).collect::<Option<_>>()?;
                Some((terms, c.checked_neg()?))
            }
            Scalar::Mul(a, b) => {
                let (factor, other) = match (a.as_int(), b.as_int()) {
                    (Some(k), _) => (k, b),
                    (_, Some(k)) => (k, a),
                    _ => return None,
                };
                let (terms, c) = other.linear_terms()?;
                let terms = terms.into_iter().map(|(s, k)| k.checked_mul(factor).map(|k| (s, k))).collect::<Option<_>>()?;
                Some((terms, c.checked_mul(factor)?))
            }
        }
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, names: Option<&SymbolInterner>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Sym(s) => match names {
                Some(n) => write!(f, "{}", n.name(*s)),
                None => write!(f, "s{}", s.as_raw()),
            },
            Scalar::Add(a, b) => {
                write!(f, "(")?;
                a.fmt_with(f, names)?;
                write!(f, " + ")?;
                b.fmt_with(f, names)?;
                write!(f, ")")
            }
            Scalar::Mul(a, b) => {
                a.fmt_with(f, names)?;
                write!(f, " * ")?;
                b.fmt_with(f, names)
            }
            Scalar::Neg(a) => {
                write!(f, "-")?;
                a.fmt_with(f, names)
            }
        }
    }
}

/// An evolution function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Chrec {
    /// `{base, +, step}_var`
    Polynomial { var: LoopId, base: Rc<Chrec>, step: Rc<Chrec> },
    /// Loop-invariant value
    Value(Scalar),
    /// The evolution may be anything
    Unknown,
    /// Fully resolved, but not chrec-shaped
    Known,
    /// Placeholder during analysis
    NotYetAnalyzed,
}

impl Chrec {
    pub fn int(v: i64) -> Self {
        Chrec::Value(Scalar::Int(v))
    }

    pub fn symbol(s: Symbol) -> Self {
        Chrec::Value(Scalar::Sym(s))
    }

    /// Build `{base, +, step}_var`. A sentinel in either part absorbs
    /// the whole chrec.
    pub fn poly(var: LoopId, base: Chrec, step: Chrec) -> Self {
        if let Some(s) = fold::sentinel_meet(&base, &step) {
            return s;
        }
        Chrec::Polynomial { var, base: Rc::new(base), step: Rc::new(step) }
    }

    /// `{base, +, step}_var` for integer parts.
    pub fn affine(var: LoopId, base: i64, step: i64) -> Self {
        Chrec::poly(var, Chrec::int(base), Chrec::int(step))
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Chrec::Unknown | Chrec::Known | Chrec::NotYetAnalyzed)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Chrec::Value(s) => s.as_int(),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Chrec::Value(s) if s.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Chrec::Value(s) if s.is_one())
    }

    /// Loop variable of a polynomial chrec.
    pub fn variable(&self) -> Option<LoopId> {
        match self {
            Chrec::Polynomial { var, .. } => Some(*var),
            _ => None,
        }
    }

    /// Plain value: constant or symbolic, no evolution and no sentinel.
    pub fn is_constant(&self) -> bool {
        matches!(self, Chrec::Value(_))
    }

    /// Univariate and linear: `{c0, +, c1}_v` with loop-invariant parts.
    pub fn is_affine(&self) -> bool {
        match self {
            Chrec::Polynomial { base, step, .. } => base.is_constant() && step.is_constant(),
            _ => false,
        }
    }

    /// Linear in every loop it evolves in, e.g. `{{0, +, 3}_1, +, 1}_2`.
    pub fn is_affine_multivariate(&self) -> bool {
        match self {
            Chrec::Polynomial { var, base, step } => {
                let nested_ok = |c: &Chrec| match c {
                    Chrec::Polynomial { var: inner, .. } => inner != var && c.is_affine_multivariate(),
                    _ => false,
                };
                if base.is_constant() {
                    step.is_constant() || nested_ok(step)
                } else {
                    step.is_constant() && nested_ok(base)
                }
            }
            _ => false,
        }
    }

    /// Evolves in at most one loop.
    pub fn is_univariate(&self) -> bool {
        match self {
            Chrec::Polynomial { var, base, step } => [base.as_ref(), step.as_ref()].iter().all(|c| match c {
                Chrec::Polynomial { var: inner, .. } => inner == var && c.is_univariate(),
                _ => true,
            }),
            _ => true,
        }
    }

    /// Evolves in more than one loop.
    pub fn is_multivariate(&self) -> bool {
        match self {
            Chrec::Polynomial { var, base, step } => [base.as_ref(), step.as_ref()].iter().any(|c| match c {
                Chrec::Polynomial { var: inner, .. } => inner != var || c.is_multivariate(),
                _ => false,
            }),
            _ => false,
        }
    }

    /// Number of distinct loops along the initial-condition spine.
    pub fn nb_vars(&self) -> usize {
        match self {
            Chrec::Polynomial { var, .. } => 1 + initial_condition_in_loop_num(self, *var).nb_vars(),
            _ => 0,
        }
    }

    pub fn contains_symbols(&self) -> bool {
        match self {
            Chrec::Polynomial { base, step, .. } => base.contains_symbols() || step.contains_symbols(),
            Chrec::Value(s) => s.contains_symbols(),
            _ => false,
        }
    }

    /// True if some node is `Unknown` or `NotYetAnalyzed`.
    pub fn contains_undetermined(&self) -> bool {
        match self {
            Chrec::Unknown | Chrec::NotYetAnalyzed => true,
            Chrec::Polynomial { base, step, .. } => base.contains_undetermined() || step.contains_undetermined(),
            _ => false,
        }
    }

    /// Display with symbol names resolved through `names`.
    pub fn display<'a>(&'a self, names: &'a SymbolInterner) -> ChrecDisplay<'a> {
        ChrecDisplay { chrec: self, names: Some(names) }
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, names: Option<&SymbolInterner>) -> fmt::Result {
        match self {
            Chrec::Polynomial { var, base, step } => {
                write!(f, "{{")?;
                base.fmt_with(f, names)?;
                write!(f, ", +, ")?;
                step.fmt_with(f, names)?;
                write!(f, "}}_{}", var)
            }
            Chrec::Value(s) => s.fmt_with(f, names),
            Chrec::Unknown => write!(f, "[unknown]"),
            Chrec::Known => write!(f, "[known]"),
            Chrec::NotYetAnalyzed => write!(f, "[not analyzed yet]"),
        }
    }
}

/// An absent chrec (no evolution) counts as undetermined.
pub fn contains_undetermined(chrec: Option<&Chrec>) -> bool {
    chrec.map_or(true, Chrec::contains_undetermined)
}

impl fmt::Display for Chrec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with(f, None)
    }
}

/// Helper returned by [`Chrec::display`].
pub struct ChrecDisplay<'a> {
    chrec: &'a Chrec,
    names: Option<&'a SymbolInterner>,
}

impl fmt::Display for ChrecDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chrec.fmt_with(f, self.names)
    }
}
