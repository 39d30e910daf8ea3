//! Linear expressions for loop bounds.
//!
//! A bound of loop `k` is
//! `(Σ coefficients[j]·x_j + Σ invariant_coefficients[p]·P_p + constant) / denominator`
//! where `x_j` are the induction variables of the outer loops and `P_p`
//! the recognized loop invariants.

use num_integer::Integer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// A linear combination of induction variables and invariants over a
/// positive integer denominator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinearExpression {
    /// One coefficient per loop of the nest
    pub coefficients: Vec<i64>,
    /// One coefficient per recognized invariant
    pub invariant_coefficients: Vec<i64>,
    /// Constant term
    pub constant: i64,
    /// Denominator of the whole expression
    pub denominator: i64,
}

impl LinearExpression {
    /// Create a zero expression.
    pub fn zero(depth: usize, invariants: usize) -> Self {
        Self {
            coefficients: vec![0; depth],
            invariant_coefficients: vec![0; invariants],
            constant: 0,
            denominator: 1,
        }
    }

    pub fn constant(value: i64, depth: usize, invariants: usize) -> Self {
        Self { constant: value, ..Self::zero(depth, invariants) }
    }

    /// The induction variable of loop `index`.
    pub fn var(index: usize, depth: usize, invariants: usize) -> Self {
        let mut e = Self::zero(depth, invariants);
        e.coefficients[index] = 1;
        e
    }

    /// The invariant `index`.
    pub fn invariant(index: usize, depth: usize, invariants: usize) -> Self {
        let mut e = Self::zero(depth, invariants);
        e.invariant_coefficients[index] = 1;
        e
    }

    pub fn depth(&self) -> usize {
        self.coefficients.len()
    }

    pub fn invariant_count(&self) -> usize {
        self.invariant_coefficients.len()
    }

    pub fn coefficients_are_zero(&self) -> bool {
        self.coefficients.iter().all(|&c| c == 0)
    }

    /// No induction variable and no invariant.
    pub fn is_constant(&self) -> bool {
        self.coefficients_are_zero() && self.invariant_coefficients.iter().all(|&c| c == 0)
    }

    /// Grow or shrink the coefficient vectors, zero filling.
    pub fn resize(&mut self, depth: usize, invariants: usize) {
        self.coefficients.resize(depth, 0);
        self.invariant_coefficients.resize(invariants, 0);
    }

    /// Multiply the numerator by `factor`.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            coefficients: self.coefficients.iter().map(|&c| c * factor).collect(),
            invariant_coefficients: self.invariant_coefficients.iter().map(|&c| c * factor).collect(),
            constant: self.constant * factor,
            denominator: self.denominator,
        }
    }

    /// Multiply the denominator by `factor`.
    pub fn divide(&self, factor: i64) -> Self {
        Self { denominator: self.denominator * factor, ..self.clone() }
    }

    /// GCD of every coefficient, the constant and the denominator.
    pub fn gcd(&self) -> i64 {
        let g = self
            .coefficients
            .iter()
            .chain(&self.invariant_coefficients)
            .fold(self.constant.gcd(&self.denominator), |acc, c| acc.gcd(c));
        if g == 0 {
            1
        } else {
            g
        }
    }

    /// Divide through by the combined GCD and make the denominator positive.
    pub fn normalize(&self) -> Self {
        let mut g = self.gcd();
        if self.denominator < 0 {
            g = -g;
        }
        Self {
            coefficients: self.coefficients.iter().map(|&c| c / g).collect(),
            invariant_coefficients: self.invariant_coefficients.iter().map(|&c| c / g).collect(),
            constant: self.constant / g,
            denominator: self.denominator / g,
        }
    }

    /// Numerator value at a point.
    pub fn numerator_at(&self, ivs: &[i64], invariants: &[i64]) -> i64 {
        let vars: i64 = self.coefficients.iter().zip(ivs).map(|(c, v)| c * v).sum();
        let invs: i64 = self.invariant_coefficients.iter().zip(invariants).map(|(c, v)| c * v).sum();
        vars + invs + self.constant
    }

    /// `⌊numerator / denominator⌋`
    pub fn floor_at(&self, ivs: &[i64], invariants: &[i64]) -> i64 {
        Integer::div_floor(&self.numerator_at(ivs, invariants), &self.denominator)
    }

    /// `⌈numerator / denominator⌉`
    pub fn ceil_at(&self, ivs: &[i64], invariants: &[i64]) -> i64 {
        Integer::div_ceil(&self.numerator_at(ivs, invariants), &self.denominator)
    }

    /// Substitute every induction variable: `x_j := subst[j]`.
    ///
    /// All substitutes must share one denominator `d`; the result keeps
    /// `self.denominator · d` as its denominator.
    pub fn substitute(&self, subst: &[LinearExpression]) -> Self {
        let d = subst.first().map_or(1, |s| s.denominator);
        let depth = subst.first().map_or(self.depth(), |s| s.depth());
        let mut result = Self::constant(self.constant * d, depth, self.invariant_count());
        result.invariant_coefficients = self.invariant_coefficients.iter().map(|&c| c * d).collect();
        for (&c, s) in self.coefficients.iter().zip(subst) {
            if c == 0 {
                continue;
            }
            debug_assert_eq!(s.denominator, d);
            for (r, sc) in result.coefficients.iter_mut().zip(&s.coefficients) {
                *r += c * sc;
            }
            for (r, sc) in result.invariant_coefficients.iter_mut().zip(&s.invariant_coefficients) {
                *r += c * sc;
            }
            result.constant += c * s.constant;
        }
        result.denominator = self.denominator * d;
        result
    }

    /// Render with the given loop and invariant names.
    pub fn to_string_with_names(&self, iv_names: &[String], invariant_names: &[String]) -> String {
        let mut parts = Vec::new();
        let term = |c: i64, name: &str| match c {
            1 => name.to_string(),
            -1 => format!("-{}", name),
            _ => format!("{}*{}", c, name),
        };
        for (i, &c) in self.coefficients.iter().enumerate() {
            if c != 0 {
                let default = format!("x{}", i);
                parts.push(term(c, iv_names.get(i).map_or(default.as_str(), |s| s.as_str())));
            }
        }
        for (i, &c) in self.invariant_coefficients.iter().enumerate() {
            if c != 0 {
                let default = format!("p{}", i);
                parts.push(term(c, invariant_names.get(i).map_or(default.as_str(), |s| s.as_str())));
            }
        }
        if self.constant != 0 || parts.is_empty() {
            parts.push(self.constant.to_string());
        }
        let numerator = parts.join(" + ").replace("+ -", "- ");
        if self.denominator == 1 {
            numerator
        } else {
            format!("({}) / {}", numerator, self.denominator)
        }
    }
}

/// Sum of two expressions, brought to a common denominator.
impl Add for &LinearExpression {
    type Output = LinearExpression;

    fn add(self, other: &LinearExpression) -> LinearExpression {
        let lcm = self.denominator.lcm(&other.denominator);
        let a = self.scale(lcm / self.denominator);
        let b = other.scale(lcm / other.denominator);
        LinearExpression {
            coefficients: a.coefficients.iter().zip(&b.coefficients).map(|(x, y)| x + y).collect(),
            invariant_coefficients: a
                .invariant_coefficients
                .iter()
                .zip(&b.invariant_coefficients)
                .map(|(x, y)| x + y)
                .collect(),
            constant: a.constant + b.constant,
            denominator: lcm,
        }
    }
}

impl Sub for &LinearExpression {
    type Output = LinearExpression;

    fn sub(self, other: &LinearExpression) -> LinearExpression {
        self + &(-other)
    }
}

impl Neg for &LinearExpression {
    type Output = LinearExpression;

    fn neg(self) -> LinearExpression {
        self.scale(-1)
    }
}

impl fmt::Display for LinearExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}
