//! Integration tests for the linear loop transformation pass.
//!
//! Every rewritten region is run through the interpreter next to the
//! original one and must leave the same memory behind.

use lambdaopt::analysis::{collect_data_references, DependenceOracle, UniformDependenceTest};
use lambdaopt::extract::extract_loopnest;
use lambdaopt::ir::print_region;
use lambdaopt::kernels::Kernel;
use lambdaopt::prelude::*;

fn run(ctx: &CompilationContext, region: &Region, n: i64, m: i64) -> Store {
    let mut store = Store::new();
    if let Some(s) = ctx.interner.get("n") {
        store.set(s, n);
    }
    if let Some(s) = ctx.interner.get("m") {
        store.set(s, m);
    }
    Interpreter::new(&ctx.interner).run_region(region, &mut store).expect("region failed to run");
    store
}

fn assert_equivalent(ctx: &CompilationContext, original: &Region, rewritten: &Region) {
    for (n, m) in [(0, 3), (1, 1), (4, 3), (3, 7), (6, 5)] {
        assert_eq!(
            run(ctx, rewritten, n, m).arrays,
            run(ctx, original, n, m).arrays,
            "different memory with n = {}, m = {}",
            n,
            m
        );
    }
}

fn root_loop(region: &Region) -> &LoopNode {
    region
        .nodes
        .iter()
        .find_map(|n| match n {
            Node::Loop(l) => Some(l),
            Node::Stmt(_) => None,
        })
        .expect("region has no loop")
}

fn kernel_region(ctx: &mut CompilationContext, kernel: Kernel) -> Region {
    kernel.build(&mut ctx.interner)
}

#[test]
fn test_interchange_kernel_pipeline() {
    let mut ctx = CompilationContext::default();
    let original = kernel_region(&mut ctx, Kernel::Interchange);
    let mut region = original.clone();

    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_transformed());
    assert_eq!(reports[0].matrix, Some(TransformMatrix::interchange(2, 0, 1)));
    assert_ne!(region, original);
    assert_equivalent(&ctx, &original, &region);

    let text = print_region(&region, &ctx.interner);
    assert!(text.contains("lniv"), "{}", text);
}

#[test]
fn test_reuse_carried_innermost_is_kept() {
    // A[i][j] = A[i][j - 1] + 1
    let mut ctx = CompilationContext::default();
    let original = kernel_region(&mut ctx, Kernel::Carried);
    let root = root_loop(&original);
    let extracted = extract_loopnest(root).unwrap();
    let refs = collect_data_references(root);
    let deps = UniformDependenceTest.dependences(&extracted, &refs);
    assert!(deps.iter().any(|d| d.relation == DependenceRelation::Distance(vec![0, 1])));

    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(!reports[0].is_transformed());
    assert_eq!(region, original);
    assert_eq!(ctx.diagnostics()[0].severity, DiagnosticSeverity::Note);
}

#[test]
fn test_column_recurrence_is_interchanged() {
    // for i in 1..n { for j in 0..m { A[j][i] = A[j][i - 1] + 1 } }
    let mut ctx = CompilationContext::default();
    let mut b = IrBuilder::new(&mut ctx.interner);
    let n = b.var("n");
    let m = b.var("m");
    let one = Operand::Const(1);
    let nest = b.counted_loop("i", one, CmpOp::Lt, n, 1, move |b, i| {
        let inner = b.counted_loop("j", Operand::Const(0), CmpOp::Lt, m, 1, |b, j| {
            let (im, t, u) = (b.var("im"), b.var("t"), b.var("u"));
            vec![
                b.binary("im", BinOp::Sub, i, one),
                b.load("t", "A", vec![j, im]),
                b.binary("u", BinOp::Add, t, one),
                b.store("A", vec![j, i], u),
            ]
        });
        vec![Node::Loop(inner)]
    });
    let original = Region::new(vec![Node::Loop(nest)]);

    let root = root_loop(&original);
    let extracted = extract_loopnest(root).unwrap();
    let deps = UniformDependenceTest.dependences(&extracted, &collect_data_references(root));
    assert!(deps.iter().any(|d| d.relation == DependenceRelation::Distance(vec![1, 0])));

    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(reports[0].is_transformed());
    assert_eq!(reports[0].matrix, Some(TransformMatrix::interchange(2, 0, 1)));
    assert_equivalent(&ctx, &original, &region);
}

#[test]
fn test_wavefront_on_skew_kernel() {
    let mut ctx = CompilationContext::default();
    let original = kernel_region(&mut ctx, Kernel::Skew);

    // the heuristic keeps the nest, plain interchange is illegal
    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(!reports[0].is_transformed());
    let err = transform_nest_with(
        &mut ctx,
        &mut region,
        1,
        &UniformDependenceTest,
        &TransformMatrix::interchange(2, 0, 1),
    )
    .unwrap_err();
    assert!(matches!(err, LambdaError::Transform(e) if e.kind == TransformErrorKind::Illegal));
    assert_eq!(region, original);

    let (skew, swap) = (Skewing::new(1, 0, 1), Interchange::new(0, 1));
    let steps: [&dyn LoopTransform; 2] = [&skew, &swap];
    let wavefront = compose(&steps);
    let report = transform_nest_with(&mut ctx, &mut region, 1, &UniformDependenceTest, &wavefront).unwrap();
    assert!(report.is_transformed());
    assert_equivalent(&ctx, &original, &region);
}

fn compose(transforms: &[&dyn LoopTransform]) -> TransformMatrix {
    lambdaopt::transform::compose_transforms(2, transforms).unwrap()
}

#[test]
fn test_downward_loop_interchange() {
    let mut ctx = CompilationContext::default();
    let original = kernel_region(&mut ctx, Kernel::Reverse);
    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(reports[0].is_transformed());
    let transformed = reports[0].transformed.as_ref().unwrap();
    assert_eq!(transformed.loops[1].step, -1);
    assert_equivalent(&ctx, &original, &region);
}

#[test]
fn test_imperfect_nest_is_split() {
    let mut ctx = CompilationContext::default();
    let original = kernel_region(&mut ctx, Kernel::Imperfect);
    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(reports[0].is_transformed());
    assert_eq!(reports[0].split_loop, Some(3));
    let loops: Vec<&LoopNode> = region
        .nodes
        .iter()
        .filter_map(|n| match n {
            Node::Loop(l) => Some(l),
            Node::Stmt(_) => None,
        })
        .collect();
    assert_eq!(loops.len(), 2);
    assert!(perfect_nest_p(loops[0]));
    assert_equivalent(&ctx, &original, &region);
}

#[test]
fn test_imperfect_nest_rejected_on_request() {
    let mut ctx = CompilationContext::new(LinearTransformConfig { need_perfect_nest: false, ..Default::default() });
    let original = kernel_region(&mut ctx, Kernel::Imperfect);
    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(!reports[0].is_transformed());
    assert_eq!(region, original);
    let diagnostic = &ctx.diagnostics()[0];
    assert_eq!(diagnostic.severity, DiagnosticSeverity::Warning);
    assert_eq!(diagnostic.loop_id, Some(1));
}

#[test]
fn test_triangular_interchange() {
    // for i in 0..n { for j in 0..=i { A[j][i] = i * j } }
    let mut ctx = CompilationContext::default();
    let mut b = IrBuilder::new(&mut ctx.interner);
    let n = b.var("n");
    let zero = Operand::Const(0);
    let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, move |b, i| {
        let inner = b.counted_loop("j", zero, CmpOp::Le, i, 1, |b, j| {
            let t = b.var("t");
            vec![b.binary("t", BinOp::Mul, i, j), b.store("A", vec![j, i], t)]
        });
        vec![Node::Loop(inner)]
    });
    let original = Region::new(vec![Node::Loop(nest)]);
    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(reports[0].is_transformed());
    assert_equivalent(&ctx, &original, &region);
}

#[test]
fn test_strided_outer_loop() {
    // for i = 1; i < n; i += 2 { for j in 0..m { A[j][i] = i + j } }
    let mut ctx = CompilationContext::default();
    let mut b = IrBuilder::new(&mut ctx.interner);
    let n = b.var("n");
    let m = b.var("m");
    let nest = b.counted_loop("i", Operand::Const(1), CmpOp::Lt, n, 2, move |b, i| {
        let inner = b.counted_loop("j", Operand::Const(0), CmpOp::Lt, m, 1, |b, j| {
            let t = b.var("t");
            vec![b.binary("t", BinOp::Add, i, j), b.store("A", vec![j, i], t)]
        });
        vec![Node::Loop(inner)]
    });
    let original = Region::new(vec![Node::Loop(nest)]);
    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert!(reports[0].is_transformed());
    assert_eq!(reports[0].transformed.as_ref().unwrap().loops[1].step, 2);
    assert_equivalent(&ctx, &original, &region);
}

/// for i in 0..n { for j = lower(i); j <= upper; j += 3 { A[i][j] = i + j } }
fn strided_inner(ctx: &mut CompilationContext, from_i: bool) -> Region {
    let mut b = IrBuilder::new(&mut ctx.interner);
    let n = b.var("n");
    let m = b.var("m");
    let zero = Operand::Const(0);
    let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, move |b, i| {
        let (start, end) = if from_i { (i, m) } else { (zero, Operand::Const(10)) };
        let inner = b.counted_loop("j", start, CmpOp::Le, end, 3, |b, j| {
            let t = b.var("t");
            vec![b.binary("t", BinOp::Add, i, j), b.store("A", vec![i, j], t)]
        });
        vec![Node::Loop(inner)]
    });
    Region::new(vec![Node::Loop(nest)])
}

#[test]
fn test_strided_inner_loop_under_reversal_and_skew() {
    let transforms = [
        TransformMatrix::reversal(2, 1),
        TransformMatrix::reversal(2, 0),
        TransformMatrix::skew(2, 1, 0, 1),
        TransformMatrix::interchange(2, 0, 1),
        TransformMatrix::from_rows(vec![vec![1, 1], vec![0, -1]]),
        TransformMatrix::scaling(2, 1, 2),
    ];
    for from_i in [false, true] {
        let mut ctx = CompilationContext::default();
        let original = strided_inner(&mut ctx, from_i);
        for t in &transforms {
            let mut region = original.clone();
            let report = transform_nest_with(&mut ctx, &mut region, 1, &UniformDependenceTest, t).unwrap();
            assert!(report.is_transformed(), "{}", t);
            assert_equivalent(&ctx, &original, &region);
        }
    }
}

#[test]
fn test_scaling_transform() {
    let mut ctx = CompilationContext::default();
    let original = kernel_region(&mut ctx, Kernel::Interchange);
    let mut region = original.clone();
    let scale = Scaling::new(0, 2).matrix(2).unwrap();
    let report = transform_nest_with(&mut ctx, &mut region, 1, &UniformDependenceTest, &scale).unwrap();
    assert_eq!(report.transformed.as_ref().unwrap().loops[0].step, 2);
    assert_equivalent(&ctx, &original, &region);
}

#[test]
fn test_reversal_without_dependences() {
    let mut ctx = CompilationContext::default();
    let original = kernel_region(&mut ctx, Kernel::Interchange);
    for k in 0..2 {
        let mut region = original.clone();
        let rev = Reversal::new(k).matrix(2).unwrap();
        transform_nest_with(&mut ctx, &mut region, 1, &UniformDependenceTest, &rev).unwrap();
        assert_equivalent(&ctx, &original, &region);
    }
}

#[test]
fn test_several_nests_in_one_region() {
    let mut ctx = CompilationContext::default();
    let mut b = IrBuilder::new(&mut ctx.interner);
    let n = b.var("n");
    let m = b.var("m");
    let zero = Operand::Const(0);
    let one = Operand::Const(1);
    let first = b.counted_loop("i", zero, CmpOp::Lt, n, 1, move |b, i| {
        let inner = b.counted_loop("j", zero, CmpOp::Lt, m, 1, |b, j| {
            let t = b.var("t");
            vec![b.binary("t", BinOp::Add, i, j), b.store("A", vec![j, i], t)]
        });
        vec![Node::Loop(inner)]
    });
    let second = b.counted_loop("k", zero, CmpOp::Lt, n, 1, move |b, k| {
        let inner = b.counted_loop("l", one, CmpOp::Lt, m, 1, |b, l| {
            let (lm, u, w) = (b.var("lm"), b.var("u"), b.var("w"));
            vec![
                b.binary("lm", BinOp::Sub, l, one),
                b.load("u", "C", vec![k, lm]),
                b.binary("w", BinOp::Add, u, k),
                b.store("C", vec![k, l], w),
            ]
        });
        vec![Node::Loop(inner)]
    });
    let x = b.sym("x");
    let original = Region::new(vec![
        Node::Stmt(Stmt::assign(x, Expr::Use(Operand::Const(7)))),
        Node::Loop(first),
        Node::Loop(second),
    ]);
    assert_eq!(original.max_loop_id(), 4);

    let mut region = original.clone();
    let reports = linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].loop_id, 1);
    assert!(reports[0].is_transformed());
    assert_eq!(reports[1].loop_id, 3);
    assert!(!reports[1].is_transformed());
    assert_eq!(region.nodes[0], original.nodes[0]);
    assert_eq!(region.nodes.last(), original.nodes.last());
    assert_equivalent(&ctx, &original, &region);
}

#[test]
fn test_rewritten_nest_extracts_again() {
    let mut ctx = CompilationContext::default();
    let mut region = kernel_region(&mut ctx, Kernel::Interchange);
    linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest);
    let again = extract_loopnest(root_loop(&region)).unwrap();
    assert_eq!(again.depth(), 2);
    assert!(again.nest.loops.iter().all(|l| l.step == 1));
}

#[test]
fn test_disabled_pass_keeps_everything() {
    let mut ctx = CompilationContext::new(LinearTransformConfig { enabled: false, ..Default::default() });
    let original = kernel_region(&mut ctx, Kernel::Interchange);
    let mut region = original.clone();
    assert!(linear_transform_loops(&mut ctx, &mut region, &UniformDependenceTest).is_empty());
    assert_eq!(region, original);
}
