//! Lambda loops and loop nests.

use super::expr::LinearExpression;
use super::trans::TransformMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One loop of a lambda loopnest.
///
/// The loop starts at `linear_offset + lower_bounds` and runs while it has
/// not passed `linear_offset + upper_bounds`, moving by `step`. With several
/// lower bounds the start is their maximum (their minimum for a negative
/// step), with several upper bounds the end is their minimum (maximum).
///
/// An anchored loop only visits `linear_offset + t·|step|` for integers
/// `t`; its bounds limit `t·|step|` and are rounded onto that lattice.
/// Loops produced by a transform are anchored, extracted loops are not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loop {
    pub step: i64,
    pub linear_offset: LinearExpression,
    pub lower_bounds: Vec<LinearExpression>,
    pub upper_bounds: Vec<LinearExpression>,
    #[serde(default)]
    pub anchored: bool,
}

impl Loop {
    /// An unbounded loop with a zero offset.
    pub fn new(step: i64, depth: usize, invariants: usize) -> Self {
        debug_assert!(step != 0);
        Self {
            step,
            linear_offset: LinearExpression::zero(depth, invariants),
            lower_bounds: Vec::new(),
            upper_bounds: Vec::new(),
            anchored: false,
        }
    }

    /// True when the start and end must be rounded onto the lattice of the
    /// linear offset rather than taken from the bounds directly.
    pub fn needs_alignment(&self) -> bool {
        self.anchored && self.step.abs() != 1
    }

    pub fn has_offset(&self) -> bool {
        !self.linear_offset.is_constant() || self.linear_offset.constant != 0
    }

    fn with_offset(&self, bounds: &[LinearExpression]) -> Vec<LinearExpression> {
        if !self.has_offset() {
            return bounds.to_vec();
        }
        bounds.iter().map(|b| (b + &self.linear_offset).normalize()).collect()
    }

    /// Start bounds with the linear offset folded in.
    pub fn effective_lower_bounds(&self) -> Vec<LinearExpression> {
        self.with_offset(&self.lower_bounds)
    }

    /// End bounds with the linear offset folded in.
    pub fn effective_upper_bounds(&self) -> Vec<LinearExpression> {
        self.with_offset(&self.upper_bounds)
    }

    /// First and last value of the loop at an outer iteration point.
    pub fn range_at(&self, outer: &[i64], invariants: &[i64]) -> Option<(i64, i64)> {
        if self.needs_alignment() {
            return self.aligned_range_at(outer, invariants);
        }
        let lower = self.effective_lower_bounds();
        let upper = self.effective_upper_bounds();
        if self.step > 0 {
            let start = lower.iter().map(|e| e.ceil_at(outer, invariants)).max()?;
            let end = upper.iter().map(|e| e.floor_at(outer, invariants)).min()?;
            Some((start, end))
        } else {
            let start = lower.iter().map(|e| e.floor_at(outer, invariants)).min()?;
            let end = upper.iter().map(|e| e.ceil_at(outer, invariants)).max()?;
            Some((start, end))
        }
    }

    fn aligned_range_at(&self, outer: &[i64], invariants: &[i64]) -> Option<(i64, i64)> {
        let s = self.step.abs();
        let offset = self.linear_offset.floor_at(outer, invariants);
        let lower = self.lower_bounds.iter().map(|e| e.divide(s));
        let upper = self.upper_bounds.iter().map(|e| e.divide(s));
        let (start, end) = if self.step > 0 {
            (
                lower.map(|e| e.ceil_at(outer, invariants)).max()?,
                upper.map(|e| e.floor_at(outer, invariants)).min()?,
            )
        } else {
            (
                lower.map(|e| e.floor_at(outer, invariants)).min()?,
                upper.map(|e| e.ceil_at(outer, invariants)).max()?,
            )
        };
        Some((offset + s * start, offset + s * end))
    }
}

/// A nest of lambda loops, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopNest {
    pub loops: Vec<Loop>,
    /// Number of recognized invariants
    pub invariants: usize,
}

impl LoopNest {
    pub fn new(loops: Vec<Loop>, invariants: usize) -> Self {
        Self { loops, invariants }
    }

    pub fn depth(&self) -> usize {
        self.loops.len()
    }

    /// Every iteration point in execution order, for concrete invariant
    /// values. Meant for small nests in tests and verification.
    pub fn iteration_points(&self, invariants: &[i64]) -> Vec<Vec<i64>> {
        let mut points = Vec::new();
        let mut current = vec![0; self.depth()];
        self.walk(0, &mut current, invariants, &mut points);
        points
    }

    fn walk(&self, level: usize, current: &mut Vec<i64>, invariants: &[i64], points: &mut Vec<Vec<i64>>) {
        if level == self.depth() {
            points.push(current.clone());
            return;
        }
        let l = &self.loops[level];
        let Some((start, end)) = l.range_at(current, invariants) else {
            return;
        };
        let mut v = start;
        while (l.step > 0 && v <= end) || (l.step < 0 && v >= end) {
            current[level] = v;
            self.walk(level + 1, current, invariants, points);
            v += l.step;
        }
        current[level] = 0;
    }

    /// Render with loop and invariant names.
    pub fn to_string_with_names(&self, iv_names: &[String], invariant_names: &[String]) -> String {
        let list = |bounds: &[LinearExpression]| {
            bounds
                .iter()
                .map(|b| b.to_string_with_names(iv_names, invariant_names))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut out = String::new();
        for (i, l) in self.loops.iter().enumerate() {
            let name = iv_names.get(i).cloned().unwrap_or_else(|| format!("x{}", i));
            let aligned = if l.needs_alignment() { ", on the offset lattice" } else { "" };
            out.push_str(&format!("Loop {} ({}), step {}{}\n", i, name, l.step, aligned));
            if l.has_offset() {
                out.push_str(&format!(
                    "  linear offset: {}\n",
                    l.linear_offset.to_string_with_names(iv_names, invariant_names)
                ));
            }
            out.push_str(&format!("  lower bound: {}\n", list(&l.lower_bounds)));
            out.push_str(&format!("  upper bound: {}\n", list(&l.upper_bounds)));
        }
        out
    }
}

impl fmt::Display for LoopNest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}

/// A linear combination of new induction variables standing for one old
/// induction variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyVector {
    pub coefficients: Vec<i64>,
    pub denominator: i64,
}

impl BodyVector {
    /// The old induction variable `index` itself.
    pub fn unit(index: usize, depth: usize) -> Self {
        let mut coefficients = vec![0; depth];
        coefficients[index] = 1;
        Self { coefficients, denominator: 1 }
    }

    /// Rewrite through a matrix: `coefficients · M / denominator(M)`.
    pub fn transform(&self, matrix: &TransformMatrix) -> Self {
        let coefficients = matrix
            .matrix
            .vec_mul(&self.coefficients)
            .unwrap_or_else(|| vec![0; matrix.depth()]);
        let mut result = Self { coefficients, denominator: self.denominator * matrix.denominator };
        if result.denominator < 0 {
            result.denominator = -result.denominator;
            result.coefficients.iter_mut().for_each(|c| *c = -*c);
        }
        result
    }
}
