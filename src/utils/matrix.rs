//! Integer matrix operations for loop transformations.
//!
//! Transform matrices, lattice bases and inequality systems are all dense
//! integer matrices. Anything that needs division (determinant, inverse)
//! goes through exact rational elimination and is brought back to
//! integers with an explicit denominator.

use num_integer::Integer;
use num_rational::Rational64;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dense matrix of `i64` entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntMatrix {
    data: Vec<Vec<i64>>,
    rows: usize,
    cols: usize,
}

impl IntMatrix {
    /// Create a new matrix with the given dimensions, initialized to zero.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { data: vec![vec![0; cols]; rows], rows, cols }
    }

    /// Create an identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut mat = Self::zeros(n, n);
        for i in 0..n {
            mat.data[i][i] = 1;
        }
        mat
    }

    /// Create a matrix from a 2D vector. Rows must have equal length.
    pub fn from_vec(data: Vec<Vec<i64>>) -> Self {
        let rows = data.len();
        let cols = if rows > 0 { data[0].len() } else { 0 };
        debug_assert!(data.iter().all(|r| r.len() == cols));
        Self { data, rows, cols }
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Get an element. Panics when out of range, like slice indexing.
    pub fn get(&self, row: usize, col: usize) -> i64 {
        self.data[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: i64) {
        self.data[row][col] = value;
    }

    pub fn row(&self, row: usize) -> &[i64] {
        &self.data[row]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [i64] {
        &mut self.data[row]
    }

    pub fn column(&self, col: usize) -> Vec<i64> {
        self.data.iter().map(|row| row[col]).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i64]> {
        self.data.iter().map(|r| r.as_slice())
    }

    pub fn transpose(&self) -> Self {
        let mut result = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                result.data[j][i] = self.data[i][j];
            }
        }
        result
    }

    /// Matrix multiplication, `None` on a dimension mismatch.
    pub fn mul(&self, other: &Self) -> Option<Self> {
        if self.cols != other.rows {
            return None;
        }
        let mut result = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                result.data[i][j] = (0..self.cols).map(|k| self.data[i][k] * other.data[k][j]).sum();
            }
        }
        Some(result)
    }

    /// Matrix-vector product `M·v`.
    pub fn mul_vec(&self, vec: &[i64]) -> Option<Vec<i64>> {
        if self.cols != vec.len() {
            return None;
        }
        Some(self.data.iter().map(|row| row.iter().zip(vec).map(|(a, b)| a * b).sum()).collect())
    }

    /// Row-vector product `v·M`.
    pub fn vec_mul(&self, vec: &[i64]) -> Option<Vec<i64>> {
        if self.rows != vec.len() {
            return None;
        }
        Some((0..self.cols).map(|j| (0..self.rows).map(|i| vec[i] * self.data[i][j]).sum()).collect())
    }

    /// Multiply every entry by `factor`.
    pub fn scale(&self, factor: i64) -> Self {
        let data = self.data.iter().map(|r| r.iter().map(|x| x * factor).collect()).collect();
        Self { data, rows: self.rows, cols: self.cols }
    }

    pub fn is_identity(&self) -> bool {
        self.is_square()
            && self
                .data
                .iter()
                .enumerate()
                .all(|(i, row)| row.iter().enumerate().all(|(j, &x)| x == if i == j { 1 } else { 0 }))
    }

    pub fn is_lower_triangular(&self) -> bool {
        self.data.iter().enumerate().all(|(i, row)| row.iter().skip(i + 1).all(|&x| x == 0))
    }

    pub fn row_exchange(&mut self, r1: usize, r2: usize) {
        self.data.swap(r1, r2);
    }

    pub fn col_exchange(&mut self, c1: usize, c2: usize) {
        for row in &mut self.data {
            row.swap(c1, c2);
        }
    }

    pub fn col_negate(&mut self, c: usize) {
        for row in &mut self.data {
            row[c] = -row[c];
        }
    }

    pub fn row_negate(&mut self, r: usize) {
        for x in &mut self.data[r] {
            *x = -*x;
        }
    }

    /// `col[c2] += factor * col[c1]`
    pub fn col_add(&mut self, c1: usize, c2: usize, factor: i64) {
        for row in &mut self.data {
            row[c2] += factor * row[c1];
        }
    }

    /// `row[r2] += factor * row[r1]`
    pub fn row_add(&mut self, r1: usize, r2: usize, factor: i64) {
        for j in 0..self.cols {
            let v = self.data[r1][j];
            self.data[r2][j] += factor * v;
        }
    }

    fn to_rational(&self) -> Vec<Vec<Rational64>> {
        self.data.iter().map(|row| row.iter().map(|&x| Rational64::from_integer(x)).collect()).collect()
    }

    /// Compute the determinant of a square matrix.
    pub fn determinant(&self) -> Option<i64> {
        if !self.is_square() {
            return None;
        }
        match self.rows {
            0 => return Some(1),
            1 => return Some(self.data[0][0]),
            2 => return Some(self.data[0][0] * self.data[1][1] - self.data[0][1] * self.data[1][0]),
            _ => {}
        }

        let n = self.rows;
        let mut lu = self.to_rational();
        let mut det = Rational64::from_integer(1);
        for k in 0..n {
            let mut max_row = k;
            for i in (k + 1)..n {
                if lu[i][k].abs() > lu[max_row][k].abs() {
                    max_row = i;
                }
            }
            if max_row != k {
                lu.swap(k, max_row);
                det = -det;
            }
            if lu[k][k].is_zero() {
                return Some(0);
            }
            det *= lu[k][k];
            for i in (k + 1)..n {
                let factor = lu[i][k] / lu[k][k];
                let pivot_row = lu[k].clone();
                for j in k..n {
                    lu[i][j] -= factor * pivot_row[j];
                }
            }
        }
        Some(det.to_integer())
    }

    /// Check if the matrix is unimodular (determinant is ±1).
    pub fn is_unimodular(&self) -> bool {
        matches!(self.determinant(), Some(1) | Some(-1))
    }

    /// Invert a square matrix.
    ///
    /// Returns `(adj, det)` with `self · adj == det · I`, so that the real
    /// inverse is `adj / det`. `None` for singular or non-square input.
    pub fn inverse(&self) -> Option<(Self, i64)> {
        let det = self.determinant()?;
        if det == 0 {
            return None;
        }
        let n = self.rows;

        let mut aug: Vec<Vec<Rational64>> = self
            .to_rational()
            .into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                row.extend((0..n).map(|j| Rational64::from_integer(if i == j { 1 } else { 0 })));
                row
            })
            .collect();

        for k in 0..n {
            let mut max_row = k;
            for i in (k + 1)..n {
                if aug[i][k].abs() > aug[max_row][k].abs() {
                    max_row = i;
                }
            }
            aug.swap(k, max_row);
            if aug[k][k].is_zero() {
                return None;
            }
            let pivot = aug[k][k];
            for x in aug[k].iter_mut() {
                *x /= pivot;
            }
            for i in 0..n {
                if i != k {
                    let factor = aug[i][k];
                    let pivot_row = aug[k].clone();
                    for (x, p) in aug[i].iter_mut().zip(pivot_row) {
                        *x -= factor * p;
                    }
                }
            }
        }

        let scale = Rational64::from_integer(det);
        let mut adj = Self::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let v = aug[i][n + j] * scale;
                if !v.is_integer() {
                    return None;
                }
                adj.data[i][j] = v.to_integer();
            }
        }
        Some((adj, det))
    }

    /// Hermite decomposition `self = H · U`.
    ///
    /// `H` is lower triangular with a non-negative diagonal and `U` is
    /// unimodular. Column operations on `H` are mirrored as inverse row
    /// operations on `U`, which keeps `H · U` invariant.
    pub fn hermite_decompose(&self) -> (Self, Self) {
        let n = self.rows;
        let mut h = self.clone();
        let mut u = Self::identity(n);

        for j in 0..n {
            for i in j..n {
                if h.data[j][i] < 0 {
                    h.col_negate(i);
                    u.row_negate(i);
                }
            }

            while first_nonzero(&h.data[j], j + 1).is_some() {
                let min_col = min_nonzero(&h.data[j], j);
                h.col_exchange(j, min_col);
                u.row_exchange(j, min_col);

                for i in (j + 1)..n {
                    let factor = h.data[j][i] / h.data[j][j];
                    if factor != 0 {
                        h.col_add(j, i, -factor);
                        u.row_add(i, j, factor);
                    }
                }
            }
        }
        (h, u)
    }
}

fn first_nonzero(row: &[i64], start: usize) -> Option<usize> {
    (start..row.len()).find(|&i| row[i] != 0)
}

/// Index of the smallest non-zero magnitude at or after `start`.
fn min_nonzero(row: &[i64], start: usize) -> usize {
    (start..row.len())
        .filter(|&i| row[i] != 0)
        .min_by_key(|&i| row[i].abs())
        .unwrap_or(start)
}

impl fmt::Display for IntMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.data {
            let cells: Vec<String> = row.iter().map(|x| format!("{:3}", x)).collect();
            writeln!(f, "[{} ]", cells.join(""))?;
        }
        Ok(())
    }
}

/// Compute the GCD of a vector of integers (0 for an all-zero vector).
pub fn vector_gcd(v: &[i64]) -> i64 {
    v.iter().fold(0, |acc, &x| acc.gcd(&x))
}

/// Compute the LCM of a vector of integers.
pub fn vector_lcm(v: &[i64]) -> i64 {
    v.iter().fold(1, |acc, &x| acc.lcm(&x))
}

pub fn vector_is_zero(v: &[i64]) -> bool {
    v.iter().all(|&x| x == 0)
}

/// Lexicographic positivity: the first non-zero entry is positive.
/// The zero vector is not positive.
pub fn lexicographically_positive(v: &[i64]) -> bool {
    match v.iter().find(|&&x| x != 0) {
        Some(&x) => x > 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_multiply() {
        let a = IntMatrix::from_vec(vec![vec![1, 2], vec![3, 4]]);
        let b = IntMatrix::from_vec(vec![vec![5, 6], vec![7, 8]]);
        let c = a.mul(&b).unwrap();
        assert_eq!(c, IntMatrix::from_vec(vec![vec![19, 22], vec![43, 50]]));
        assert!(a.mul(&IntMatrix::zeros(3, 1)).is_none());
    }

    #[test]
    fn test_vector_products() {
        let a = IntMatrix::from_vec(vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(a.mul_vec(&[1, 1]), Some(vec![3, 7]));
        assert_eq!(a.vec_mul(&[1, 1]), Some(vec![4, 6]));
    }

    #[test]
    fn test_determinant() {
        let m = IntMatrix::from_vec(vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(m.determinant(), Some(-2));
        let m3 = IntMatrix::from_vec(vec![vec![2, 0, 1], vec![1, 3, 2], vec![1, 1, 1]]);
        assert_eq!(m3.determinant(), Some(1));
        let singular = IntMatrix::from_vec(vec![vec![1, 2, 3], vec![2, 4, 6], vec![0, 1, 1]]);
        assert_eq!(singular.determinant(), Some(0));
    }

    #[test]
    fn test_inverse_scaled_by_determinant() {
        let m = IntMatrix::from_vec(vec![vec![2, 1], vec![1, 3]]);
        let (adj, det) = m.inverse().unwrap();
        assert_eq!(det, 5);
        assert_eq!(m.mul(&adj).unwrap(), IntMatrix::identity(2).scale(5));
    }

    #[test]
    fn test_inverse_of_interchange() {
        let m = IntMatrix::from_vec(vec![vec![0, 1], vec![1, 0]]);
        let (adj, det) = m.inverse().unwrap();
        assert_eq!(det, -1);
        assert_eq!(adj, IntMatrix::from_vec(vec![vec![0, -1], vec![-1, 0]]));
        assert!(IntMatrix::from_vec(vec![vec![1, 2], vec![2, 4]]).inverse().is_none());
    }

    #[test]
    fn test_hermite_interchange() {
        let m = IntMatrix::from_vec(vec![vec![0, 1], vec![1, 0]]);
        let (h, u) = m.hermite_decompose();
        assert_eq!(h, IntMatrix::identity(2));
        assert_eq!(u, m);
    }

    #[test]
    fn test_hermite_general() {
        let m = IntMatrix::from_vec(vec![vec![2, 3, 1], vec![-1, 4, 0], vec![5, -2, 7]]);
        let (h, u) = m.hermite_decompose();
        assert_eq!(h.mul(&u).unwrap(), m);
        assert!(h.is_lower_triangular());
        assert!(u.is_unimodular());
        for i in 0..3 {
            assert!(h.get(i, i) >= 0);
        }
    }

    #[test]
    fn test_hermite_skew_is_already_triangular() {
        let m = IntMatrix::from_vec(vec![vec![1, 0], vec![1, 1]]);
        let (h, u) = m.hermite_decompose();
        assert_eq!(h, m);
        assert!(u.is_identity());
    }

    #[test]
    fn test_lexicographic_positive() {
        assert!(lexicographically_positive(&[0, 1]));
        assert!(!lexicographically_positive(&[0, 0]));
        assert!(!lexicographically_positive(&[-1, 5]));
    }

    #[test]
    fn test_gcd_lcm() {
        assert_eq!(vector_gcd(&[12, -8, 4]), 4);
        assert_eq!(vector_gcd(&[0, 0]), 0);
        assert_eq!(vector_lcm(&[4, 6]), 12);
    }
}
