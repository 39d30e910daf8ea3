//! Benchmarks for the linear loop transformation pass.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lambdaopt::analysis::UniformDependenceTest;
use lambdaopt::extract::extract_loopnest;
use lambdaopt::ir::Node;
use lambdaopt::kernels::Kernel;
use lambdaopt::lambda::{loopnest_transform, LinearExpression, Loop, LoopNest, TransformMatrix};
use lambdaopt::transform::linear_transform_loops;
use lambdaopt::utils::IntMatrix;
use lambdaopt::CompilationContext;

/// `0 ≤ x_k ≤ N_k - 1` for every level.
fn box_nest(depth: usize) -> LoopNest {
    let loops = (0..depth)
        .map(|k| {
            let mut l = Loop::new(1, depth, depth);
            l.lower_bounds.push(LinearExpression::zero(depth, depth));
            let mut upper = LinearExpression::invariant(k, depth, depth);
            upper.constant = -1;
            l.upper_bounds.push(upper);
            l
        })
        .collect();
    LoopNest::new(loops, depth)
}

/// Benchmark the Hermite decomposition.
fn bench_hermite(c: &mut Criterion) {
    let m = IntMatrix::from_vec(vec![
        vec![2, 1, 0, 3],
        vec![1, 3, 1, 0],
        vec![0, 1, 4, 1],
        vec![5, 0, 1, 2],
    ]);
    c.bench_function("hermite_4x4", |b| b.iter(|| black_box(&m).hermite_decompose()));
    c.bench_function("inverse_4x4", |b| b.iter(|| black_box(&m).inverse()));
}

/// Benchmark the nest transformation for growing depths.
fn bench_loopnest_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("loopnest_transform");
    for depth in [2usize, 3, 4] {
        let nest = box_nest(depth);
        let mut trans = TransformMatrix::identity(depth);
        for k in 1..depth {
            trans = TransformMatrix::skew(depth, k, k - 1, 1).compose(&trans).unwrap_or(trans);
        }
        trans.row_exchange(0, depth - 1);
        group.bench_with_input(BenchmarkId::new("skew_interchange", depth), &depth, |b, _| {
            b.iter(|| loopnest_transform(black_box(&nest), black_box(&trans)).unwrap())
        });
    }
    group.finish();
}

/// Benchmark extraction from the loop IR.
fn bench_extraction(c: &mut Criterion) {
    let mut ctx = CompilationContext::default();
    let region = Kernel::Skew.build(&mut ctx.interner);
    let Some(Node::Loop(root)) = region.nodes.last() else {
        return;
    };
    c.bench_function("extract_skew_kernel", |b| b.iter(|| extract_loopnest(black_box(root)).unwrap()));
}

/// Benchmark the whole pass on every kernel.
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_transform_loops");
    for kernel in Kernel::ALL {
        let mut ctx = CompilationContext::default();
        let region = kernel.build(&mut ctx.interner);
        group.bench_function(kernel.name(), |b| {
            b.iter(|| {
                let mut region = region.clone();
                let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
                ctx.take_diagnostics();
                reports
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_hermite, bench_loopnest_transform, bench_extraction, bench_pipeline);
criterion_main!(benches);
