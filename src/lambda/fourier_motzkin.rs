//! Fourier–Motzkin elimination over loop bound systems.

use super::expr::LinearExpression;
use super::nest::{Loop, LoopNest};
use crate::utils::matrix::vector_gcd;
use crate::utils::{LambdaError, LambdaResult};
use log::trace;
use num_integer::Integer;

/// One row `Σ a_k·x_k ≤ constant + Σ b_p·P_p`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Inequality {
    pub coefficients: Vec<i64>,
    pub invariant_coefficients: Vec<i64>,
    pub constant: i64,
}

/// What a row says about one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowBound {
    Lower(LinearExpression),
    Upper(LinearExpression),
    /// The variable does not occur in the row
    Free,
}

impl Inequality {
    pub fn new(depth: usize, invariants: usize) -> Self {
        Self { coefficients: vec![0; depth], invariant_coefficients: vec![0; invariants], constant: 0 }
    }

    pub fn is_trivial(&self) -> bool {
        self.coefficients.iter().all(|&c| c == 0)
    }

    /// Read the row as a bound on `var` in terms of the variables before it.
    pub fn classify(&self, var: usize) -> RowBound {
        let a = self.coefficients[var];
        let depth = self.coefficients.len();
        let invariants = self.invariant_coefficients.len();
        let mut e = LinearExpression::zero(depth, invariants);
        if a < 0 {
            // -|a|·x ≤ c + B·P - Σ a_k·x_k
            e.coefficients[..var].copy_from_slice(&self.coefficients[..var]);
            e.invariant_coefficients = self.invariant_coefficients.iter().map(|&b| -b).collect();
            e.constant = -self.constant;
            e.denominator = -a;
            RowBound::Lower(e.normalize())
        } else if a > 0 {
            for k in 0..var {
                e.coefficients[k] = -self.coefficients[k];
            }
            e.invariant_coefficients = self.invariant_coefficients.clone();
            e.constant = self.constant;
            e.denominator = a;
            RowBound::Upper(e.normalize())
        } else {
            RowBound::Free
        }
    }

    /// `f·self + g·other`
    fn combine(&self, f: i64, other: &Inequality, g: i64) -> Inequality {
        let mix = |a: &[i64], b: &[i64]| a.iter().zip(b).map(|(x, y)| f * x + g * y).collect();
        Inequality {
            coefficients: mix(&self.coefficients, &other.coefficients),
            invariant_coefficients: mix(&self.invariant_coefficients, &other.invariant_coefficients),
            constant: f * self.constant + g * other.constant,
        }
    }

    fn reduce(mut self) -> Self {
        let g = vector_gcd(&self.coefficients)
            .gcd(&vector_gcd(&self.invariant_coefficients))
            .gcd(&self.constant);
        if g > 1 {
            self.coefficients.iter_mut().for_each(|c| *c /= g);
            self.invariant_coefficients.iter_mut().for_each(|c| *c /= g);
            self.constant /= g;
        }
        self
    }
}

/// `A·x ≤ a + B·P`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InequalitySystem {
    pub depth: usize,
    pub invariants: usize,
    pub rows: Vec<Inequality>,
}

impl InequalitySystem {
    pub fn new(depth: usize, invariants: usize) -> Self {
        Self { depth, invariants, rows: Vec::new() }
    }

    /// `x_var ≥ bound`, i.e. `Σc·x - den·x_var ≤ -constant - B·P`.
    pub fn push_lower(&mut self, var: usize, bound: &LinearExpression) {
        let mut row = Inequality::new(self.depth, self.invariants);
        row.coefficients[..var].copy_from_slice(&bound.coefficients[..var]);
        row.coefficients[var] = -bound.denominator;
        row.invariant_coefficients = bound.invariant_coefficients.iter().map(|&b| -b).collect();
        row.constant = -bound.constant;
        self.rows.push(row);
    }

    /// `x_var ≤ bound`, i.e. `den·x_var - Σc·x ≤ constant + B·P`.
    pub fn push_upper(&mut self, var: usize, bound: &LinearExpression) {
        let mut row = Inequality::new(self.depth, self.invariants);
        for k in 0..var {
            row.coefficients[k] = -bound.coefficients[k];
        }
        row.coefficients[var] = bound.denominator;
        row.invariant_coefficients = bound.invariant_coefficients.clone();
        row.constant = bound.constant;
        self.rows.push(row);
    }

    /// Substitute `x = M · y`: `A := A · M`.
    pub fn map_variables(&mut self, m: &crate::utils::IntMatrix) -> LambdaResult<()> {
        for row in &mut self.rows {
            row.coefficients = m
                .vec_mul(&row.coefficients)
                .ok_or_else(|| LambdaError::Internal("inequality width does not match matrix".into()))?;
        }
        Ok(())
    }

    /// Substitute `x = y + origin + O·P`: the constant and invariant parts
    /// move to the right hand side.
    pub fn shift(&mut self, origin: &[i64], origin_invariants: &crate::utils::IntMatrix) {
        for row in &mut self.rows {
            let mut delta = 0;
            for (k, &a) in row.coefficients.iter().enumerate() {
                if a == 0 {
                    continue;
                }
                delta += a * origin[k];
                for (p, b) in row.invariant_coefficients.iter_mut().enumerate() {
                    *b -= a * origin_invariants.get(k, p);
                }
            }
            row.constant -= delta;
        }
    }
}

fn push_unique(bounds: &mut Vec<LinearExpression>, e: LinearExpression) {
    if !bounds.contains(&e) {
        bounds.push(e);
    }
}

/// Eliminate the variables of `system` from the innermost outwards and
/// read the bounds of each off the rows that mention it.
///
/// The result is a dense nest (every step 1) whose bounds of loop `i`
/// only involve loops `0..i`.
pub fn compute_nest_using_fourier_motzkin(system: &InequalitySystem) -> LambdaResult<LoopNest> {
    let depth = system.depth;
    let invariants = system.invariants;
    let mut rows = system.rows.clone();
    let mut loops: Vec<Loop> = (0..depth).map(|_| Loop::new(1, depth, invariants)).collect();

    for i in (0..depth).rev() {
        let l = &mut loops[i];
        let mut positive = Vec::new();
        let mut negative = Vec::new();
        let mut rest = Vec::new();
        for row in rows {
            match row.classify(i) {
                RowBound::Lower(e) => {
                    push_unique(&mut l.lower_bounds, e);
                    negative.push(row);
                }
                RowBound::Upper(e) => {
                    push_unique(&mut l.upper_bounds, e);
                    positive.push(row);
                }
                RowBound::Free => rest.push(row),
            }
        }
        if l.lower_bounds.is_empty() || l.upper_bounds.is_empty() {
            return Err(LambdaError::Internal(format!("variable {} is unbounded", i)));
        }

        for p in &positive {
            for n in &negative {
                let a = p.coefficients[i];
                let b = -n.coefficients[i];
                let lcm = a.lcm(&b);
                let combined = p.combine(lcm / a, n, lcm / b).reduce();
                debug_assert_eq!(combined.coefficients[i], 0);
                if !combined.is_trivial() && !rest.contains(&combined) {
                    rest.push(combined);
                }
            }
        }
        trace!("eliminated x{}: {} rows left", i, rest.len());
        rows = rest;
    }

    Ok(LoopNest::new(loops, invariants))
}
