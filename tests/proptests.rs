//! Property-based tests for the matrix kernels, chrec folding and the
//! lambda nest transformation.

use lambdaopt::chrec::{evaluate, fold_minus, fold_multiply, fold_plus, merge, Chrec};
use lambdaopt::lambda::{loopnest_transform, LinearExpression, Loop, LoopNest, TransformMatrix};
use lambdaopt::utils::IntMatrix;
use proptest::prelude::*;
use std::collections::BTreeSet;

// ===== Strategies =====

fn small_matrix(n: usize) -> impl Strategy<Value = IntMatrix> {
    prop::collection::vec(prop::collection::vec(-4i64..=4, n), n).prop_map(IntMatrix::from_vec)
}

fn affine_chrec() -> impl Strategy<Value = Chrec> {
    (-50i64..=50, -10i64..=10).prop_map(|(base, step)| Chrec::affine(1, base, step))
}

fn sentinel() -> impl Strategy<Value = Chrec> {
    prop_oneof![Just(Chrec::Unknown), Just(Chrec::Known), Just(Chrec::NotYetAnalyzed)]
}

#[derive(Debug, Clone)]
enum Elementary {
    Interchange,
    Reverse(usize),
    Skew(usize, i64),
}

fn elementary() -> impl Strategy<Value = Elementary> {
    prop_oneof![
        Just(Elementary::Interchange),
        (0usize..2).prop_map(Elementary::Reverse),
        (0usize..2, -2i64..=2).prop_map(|(t, f)| Elementary::Skew(t, f)),
    ]
}

/// A unimodular 2x2 transform as a product of elementary ones.
fn unimodular() -> impl Strategy<Value = TransformMatrix> {
    prop::collection::vec(elementary(), 1..5).prop_map(|steps| {
        steps.into_iter().fold(TransformMatrix::identity(2), |acc, e| {
            let next = match e {
                Elementary::Interchange => TransformMatrix::interchange(2, 0, 1),
                Elementary::Reverse(k) => TransformMatrix::reversal(2, k),
                Elementary::Skew(t, f) => TransformMatrix::skew(2, t, 1 - t, f),
            };
            next.compose(&acc).unwrap_or(acc)
        })
    })
}

fn expr(coefficients: Vec<i64>, invariants: Vec<i64>, constant: i64) -> LinearExpression {
    LinearExpression { coefficients, invariant_coefficients: invariants, constant, denominator: 1 }
}

fn counted(step: i64, start: LinearExpression, end: LinearExpression) -> Loop {
    let mut l = Loop::new(step, start.depth(), start.invariant_count());
    l.lower_bounds.push(start);
    l.upper_bounds.push(end);
    l
}

/// `0 ≤ i ≤ N - 1`, `0 ≤ j ≤ M - 1`
fn box_nest() -> LoopNest {
    LoopNest::new(
        vec![
            counted(1, expr(vec![0, 0], vec![0, 0], 0), expr(vec![0, 0], vec![1, 0], -1)),
            counted(1, expr(vec![0, 0], vec![0, 0], 0), expr(vec![0, 0], vec![0, 1], -1)),
        ],
        2,
    )
}

/// `0 ≤ i ≤ N - 1`, `i ≤ j ≤ M - 1`
fn triangle_nest() -> LoopNest {
    LoopNest::new(
        vec![
            counted(1, expr(vec![0, 0], vec![0, 0], 0), expr(vec![0, 0], vec![1, 0], -1)),
            counted(1, expr(vec![1, 0], vec![0, 0], 0), expr(vec![0, 0], vec![0, 1], -1)),
        ],
        2,
    )
}

/// Any non-singular 2x2 transform with small entries.
fn nonsingular() -> impl Strategy<Value = TransformMatrix> {
    prop::collection::vec(-3i64..=3, 4)
        .prop_filter("singular transform", |v| v[0] * v[3] - v[1] * v[2] != 0)
        .prop_map(|v| TransformMatrix::from_rows(vec![vec![v[0], v[1]], vec![v[2], v[3]]]))
}

fn step() -> impl Strategy<Value = i64> {
    (1i64..=3, any::<bool>()).prop_map(|(s, down)| if down { -s } else { s })
}

/// Loop over `low..=high`, walked downwards for a negative step.
fn bounded(step: i64, low: LinearExpression, high: LinearExpression) -> Loop {
    if step > 0 {
        counted(step, low, high)
    } else {
        counted(step, high, low)
    }
}

/// `lo0 ≤ i ≤ N + 3`, `follow·i + lo1 ≤ j ≤ M + 4`, either loop strided
/// and either direction.
fn strided_nest() -> impl Strategy<Value = LoopNest> {
    (step(), step(), 0i64..3, -2i64..=2, 0i64..=1).prop_map(|(s0, s1, lo0, lo1, follow)| {
        LoopNest::new(
            vec![
                bounded(s0, expr(vec![0, 0], vec![0, 0], lo0), expr(vec![0, 0], vec![1, 0], 3)),
                bounded(s1, expr(vec![follow, 0], vec![0, 0], lo1), expr(vec![0, 0], vec![0, 1], 4)),
            ],
            2,
        )
    })
}

fn image(trans: &TransformMatrix, points: &[Vec<i64>]) -> BTreeSet<Vec<i64>> {
    points.iter().filter_map(|p| trans.apply(p)).collect()
}

/// The transformed nest visits every image point exactly once.
fn check_image(nest: &LoopNest, trans: &TransformMatrix, invariants: &[i64]) -> Result<(), TestCaseError> {
    let target = loopnest_transform(nest, trans).map_err(|e| TestCaseError::fail(e.to_string()))?;
    let points = target.iteration_points(invariants);
    let set: BTreeSet<Vec<i64>> = points.iter().cloned().collect();
    prop_assert_eq!(set.len(), points.len(), "point visited twice");
    prop_assert_eq!(set, image(trans, &nest.iteration_points(invariants)));
    Ok(())
}

// ===== Matrix properties =====

proptest! {
    #[test]
    fn prop_hermite_reconstructs(m in small_matrix(3)) {
        let (h, u) = m.hermite_decompose();
        prop_assert!(h.is_lower_triangular());
        prop_assert!((0..3).all(|k| h.get(k, k) >= 0));
        prop_assert!(u.is_unimodular());
        prop_assert_eq!(h.mul(&u), Some(m));
    }

    #[test]
    fn prop_inverse_scales_identity(m in small_matrix(3)) {
        if let Some((adj, det)) = m.inverse() {
            prop_assert_eq!(m.mul(&adj), Some(IntMatrix::identity(3).scale(det)));
        } else {
            prop_assert_eq!(m.determinant(), Some(0));
        }
    }

    #[test]
    fn prop_determinant_of_product(a in small_matrix(2), b in small_matrix(2)) {
        let ab = a.mul(&b).unwrap();
        prop_assert_eq!(
            ab.determinant(),
            Some(a.determinant().unwrap() * b.determinant().unwrap())
        );
    }
}

// ===== Chrec properties =====

proptest! {
    #[test]
    fn prop_fold_plus_evaluates_pointwise(a in affine_chrec(), b in affine_chrec(), n in 0i64..100) {
        let sum = fold_plus(&a, &b);
        let expected = evaluate(1, &a, n).as_int().unwrap() + evaluate(1, &b, n).as_int().unwrap();
        prop_assert_eq!(evaluate(1, &sum, n).as_int(), Some(expected));
    }

    #[test]
    fn prop_fold_minus_cancels(a in affine_chrec()) {
        prop_assert_eq!(fold_minus(&a, &a), Chrec::int(0));
    }

    #[test]
    fn prop_product_is_quadratic(a in affine_chrec(), b in affine_chrec(), n in 0i64..60) {
        let product = fold_multiply(&a, &b);
        let expected = evaluate(1, &a, n).as_int().unwrap() * evaluate(1, &b, n).as_int().unwrap();
        prop_assert_eq!(evaluate(1, &product, n).as_int(), Some(expected));
    }

    #[test]
    fn prop_sentinels_absorb(s in sentinel(), a in affine_chrec()) {
        prop_assert_eq!(fold_plus(&s, &a), s.clone());
        prop_assert_eq!(fold_plus(&a, &s), s.clone());
        prop_assert_eq!(fold_multiply(&a, &s), s);
    }

    #[test]
    fn prop_merge_meets(a in affine_chrec()) {
        prop_assert_eq!(merge(&Chrec::NotYetAnalyzed, &a), a.clone());
        prop_assert_eq!(merge(&a, &a), a.clone());
        prop_assert_eq!(merge(&Chrec::Unknown, &a), Chrec::Unknown);
    }

    #[test]
    fn prop_unknown_wins(a in sentinel(), b in sentinel()) {
        let expected = if a == Chrec::Unknown || b == Chrec::Unknown {
            Chrec::Unknown
        } else if a == Chrec::Known || b == Chrec::Known {
            Chrec::Known
        } else {
            Chrec::NotYetAnalyzed
        };
        prop_assert_eq!(fold_plus(&a, &b), expected);
    }
}

// ===== Transform properties =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_unimodular_image_of_box(trans in unimodular(), n in 0i64..5, m in 0i64..5) {
        let nest = box_nest();
        let target = loopnest_transform(&nest, &trans).unwrap();
        let points = target.iteration_points(&[n, m]);
        let set: BTreeSet<Vec<i64>> = points.iter().cloned().collect();
        prop_assert_eq!(set.len(), points.len());
        prop_assert_eq!(set, image(&trans, &nest.iteration_points(&[n, m])));
    }

    #[test]
    fn prop_unimodular_image_of_triangle(trans in unimodular(), n in 0i64..5, m in 0i64..6) {
        let nest = triangle_nest();
        let target = loopnest_transform(&nest, &trans).unwrap();
        let points = target.iteration_points(&[n, m]);
        let set: BTreeSet<Vec<i64>> = points.iter().cloned().collect();
        prop_assert_eq!(set.len(), points.len());
        prop_assert_eq!(set, image(&trans, &nest.iteration_points(&[n, m])));
    }

    #[test]
    fn prop_unimodular_image_of_strided(nest in strided_nest(), trans in unimodular(), n in 0i64..4, m in 0i64..5) {
        check_image(&nest, &trans, &[n, m])?;
    }

    #[test]
    fn prop_nonsingular_image_of_strided(nest in strided_nest(), trans in nonsingular(), n in 0i64..4, m in 0i64..5) {
        check_image(&nest, &trans, &[n, m])?;
    }

    #[test]
    fn prop_nonsingular_image_of_triangle(trans in nonsingular(), n in 0i64..5, m in 0i64..6) {
        check_image(&triangle_nest(), &trans, &[n, m])?;
    }

    #[test]
    fn prop_scaling_image(factor in 2i64..4, k in 0usize..2, n in 0i64..5, m in 0i64..5) {
        let nest = box_nest();
        let trans = TransformMatrix::scaling(2, k, factor);
        let target = loopnest_transform(&nest, &trans).unwrap();
        let points: BTreeSet<Vec<i64>> = target.iteration_points(&[n, m]).into_iter().collect();
        prop_assert_eq!(points, image(&trans, &nest.iteration_points(&[n, m])));
    }
}
