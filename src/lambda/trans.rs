//! Transform matrices.
//!
//! Row `k` of a transform gives the new induction variable `k` as a
//! combination of the old ones: `x' = T · x`.

use crate::utils::matrix::IntMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A square integer matrix with a denominator (1 for anything except
/// inverses).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformMatrix {
    pub matrix: IntMatrix,
    pub denominator: i64,
}

impl TransformMatrix {
    pub fn from_matrix(matrix: IntMatrix) -> Self {
        Self { matrix, denominator: 1 }
    }

    pub fn from_rows(rows: Vec<Vec<i64>>) -> Self {
        Self::from_matrix(IntMatrix::from_vec(rows))
    }

    pub fn identity(depth: usize) -> Self {
        Self::from_matrix(IntMatrix::identity(depth))
    }

    /// Swap loops `a` and `b`.
    pub fn interchange(depth: usize, a: usize, b: usize) -> Self {
        let mut t = Self::identity(depth);
        t.matrix.row_exchange(a, b);
        t
    }

    /// `x'_target = x_target + factor · x_source`
    pub fn skew(depth: usize, target: usize, source: usize, factor: i64) -> Self {
        let mut t = Self::identity(depth);
        t.matrix.set(target, source, factor);
        t
    }

    /// Run loop `index` backwards.
    pub fn reversal(depth: usize, index: usize) -> Self {
        let mut t = Self::identity(depth);
        t.matrix.set(index, index, -1);
        t
    }

    /// Stretch loop `index` by `factor` (not unimodular).
    pub fn scaling(depth: usize, index: usize, factor: i64) -> Self {
        let mut t = Self::identity(depth);
        t.matrix.set(index, index, factor);
        t
    }

    pub fn depth(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn get(&self, row: usize, col: usize) -> i64 {
        self.matrix.get(row, col)
    }

    pub fn is_identity(&self) -> bool {
        self.denominator == 1 && self.matrix.is_identity()
    }

    pub fn is_unimodular(&self) -> bool {
        self.denominator == 1 && self.matrix.is_unimodular()
    }

    pub fn determinant(&self) -> Option<i64> {
        self.matrix.determinant()
    }

    /// `self` applied after `first`.
    pub fn compose(&self, first: &TransformMatrix) -> Option<Self> {
        let matrix = self.matrix.mul(&first.matrix)?;
        Some(Self { matrix, denominator: self.denominator * first.denominator })
    }

    pub fn row_exchange(&mut self, a: usize, b: usize) {
        self.matrix.row_exchange(a, b);
    }

    /// Inverse with a positive denominator; `None` if singular.
    pub fn inverse(&self) -> Option<Self> {
        let (mut adj, mut det) = self.matrix.inverse()?;
        if det < 0 {
            adj = adj.scale(-1);
            det = -det;
        }
        // (M / d)^-1 = d · adj / det
        let matrix = adj.scale(self.denominator);
        Some(Self { matrix, denominator: det })
    }

    /// `T · v`
    pub fn apply(&self, v: &[i64]) -> Option<Vec<i64>> {
        self.matrix.mul_vec(v)
    }
}

impl fmt::Display for TransformMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matrix)?;
        if self.denominator != 1 {
            writeln!(f, "/ {}", self.denominator)?;
        }
        Ok(())
    }
}
