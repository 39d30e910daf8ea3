//! Data references and dependences of an extracted nest.
//!
//! Dependence analysis proper is a collaborator: the pass only consumes
//! [`DataDependence`] records through a [`DependenceOracle`]. A uniform
//! dependence test for separable affine subscripts is provided so that
//! simple kernels can be handled without an external analyzer.
//!
//! Distances count iterations: component `k` is how many iterations of
//! loop `k` the sink runs after the source.

use crate::chrec::{evolution_part_in_loop_num, fold_minus, initial_condition, Chrec, LoopId};
use crate::extract::ExtractedNest;
use crate::ir::{Expr, LoopNode, Node, Scev, Stmt};
use crate::utils::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One memory access of the innermost body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataReference {
    pub array: Symbol,
    pub is_read: bool,
    /// Innermost loop the access sits in
    pub loop_id: LoopId,
    /// One chrec per subscript, most significant first
    pub access_fns: Vec<Chrec>,
}

/// Kind of data dependence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependenceKind {
    /// Read-after-write
    Flow,
    /// Write-after-read
    Anti,
    /// Write-after-write
    Output,
    /// Read-after-read, never constrains a transform
    Input,
}

impl DependenceKind {
    fn between(source_reads: bool, sink_reads: bool) -> Self {
        match (source_reads, sink_reads) {
            (false, true) => DependenceKind::Flow,
            (true, false) => DependenceKind::Anti,
            (false, false) => DependenceKind::Output,
            (true, true) => DependenceKind::Input,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            DependenceKind::Flow => "RAW",
            DependenceKind::Anti => "WAR",
            DependenceKind::Output => "WAW",
            DependenceKind::Input => "RAR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependenceRelation {
    /// The accesses never touch the same element
    Known,
    /// Nothing is known; poisons legality
    Unknown,
    Distance(Vec<i64>),
}

impl fmt::Display for DependenceRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependenceRelation::Known => write!(f, "independent"),
            DependenceRelation::Unknown => write!(f, "unknown"),
            DependenceRelation::Distance(d) => {
                let parts: Vec<String> = d.iter().map(|x| x.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

/// A dependence between two data references, by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDependence {
    pub source: usize,
    pub sink: usize,
    pub kind: DependenceKind,
    pub relation: DependenceRelation,
}

impl DataDependence {
    pub fn distance(source: usize, sink: usize, kind: DependenceKind, d: Vec<i64>) -> Self {
        Self { source, sink, kind, relation: DependenceRelation::Distance(d) }
    }

    pub fn unknown(source: usize, sink: usize) -> Self {
        Self { source, sink, kind: DependenceKind::Flow, relation: DependenceRelation::Unknown }
    }
}

/// Collect the memory accesses of the innermost body of `root`, in
/// program order.
pub fn collect_data_references(root: &LoopNode) -> Vec<DataReference> {
    let scev = Scev::new(root);
    let mut innermost = root;
    while let Some(inner) = innermost.only_inner_loop() {
        innermost = inner;
    }
    let mut refs = Vec::new();
    for n in &innermost.body {
        let Node::Stmt(s) = n else { continue };
        let (array, index, is_read) = match s {
            Stmt::Assign { expr: Expr::Load { array, index }, .. } => (*array, index, true),
            Stmt::Store { array, index, .. } => (*array, index, false),
            Stmt::Assign { .. } => continue,
        };
        refs.push(DataReference {
            array,
            is_read,
            loop_id: innermost.id,
            access_fns: index.iter().map(|&o| scev.analyze(o)).collect(),
        });
    }
    refs
}

/// Source of dependences for a nest.
pub trait DependenceOracle {
    fn dependences(&self, nest: &ExtractedNest, refs: &[DataReference]) -> Vec<DataDependence>;
}

impl<F> DependenceOracle for F
where
    F: Fn(&ExtractedNest, &[DataReference]) -> Vec<DataDependence>,
{
    fn dependences(&self, nest: &ExtractedNest, refs: &[DataReference]) -> Vec<DataDependence> {
        self(nest, refs)
    }
}

/// Uniform dependence test.
///
/// Handles subscripts that are affine in at most one loop each, with the
/// same coefficient in both references and a constant difference. Every
/// other pair is reported as `Unknown`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformDependenceTest;

/// Per-subscript affine shape: `(loop level, per-iteration coefficient)`
/// if the subscript moves, and its initial value.
fn subscript_shape(f: &Chrec, loop_ids: &[LoopId]) -> Option<(Option<(usize, i64)>, Chrec)> {
    if f.contains_undetermined() {
        return None;
    }
    let mut moving = None;
    for (level, &id) in loop_ids.iter().enumerate() {
        let Some(step) = evolution_part_in_loop_num(f, id) else { continue };
        let c = step.as_int()?;
        if c == 0 {
            continue;
        }
        if moving.is_some() {
            return None;
        }
        moving = Some((level, c));
    }
    Some((moving, initial_condition(f)))
}

/// `a - b` when it is an integer, also for symbolic `a` and `b`.
fn constant_difference(a: &Chrec, b: &Chrec) -> Option<i64> {
    if let Some(d) = fold_minus(a, b).as_int() {
        return Some(d);
    }
    let (Chrec::Value(a), Chrec::Value(b)) = (a, b) else { return None };
    let (ta, ca) = a.linear_terms()?;
    let (tb, cb) = b.linear_terms()?;
    (ta == tb).then(|| ca.checked_sub(cb)).flatten()
}

impl UniformDependenceTest {
    /// Iteration distance from `a` to `b` touching the same element, or
    /// `Known` if they never do.
    fn test_pair(&self, a: &DataReference, b: &DataReference, loop_ids: &[LoopId]) -> DependenceRelation {
        if a.access_fns.len() != b.access_fns.len() {
            return DependenceRelation::Unknown;
        }
        let depth = loop_ids.len();
        let mut distance: Vec<Option<i64>> = vec![None; depth];
        for (fa, fb) in a.access_fns.iter().zip(&b.access_fns) {
            let (Some((ma, ia)), Some((mb, ib))) = (subscript_shape(fa, loop_ids), subscript_shape(fb, loop_ids)) else {
                return DependenceRelation::Unknown;
            };
            if ma != mb {
                return DependenceRelation::Unknown;
            }
            let Some(delta) = constant_difference(&ia, &ib) else {
                return DependenceRelation::Unknown;
            };
            match ma {
                None if delta != 0 => return DependenceRelation::Known,
                None => {}
                Some((level, c)) => {
                    // c·(y - x) = init_a - init_b
                    if delta % c != 0 {
                        return DependenceRelation::Known;
                    }
                    let d = delta / c;
                    match distance[level] {
                        Some(prev) if prev != d => return DependenceRelation::Known,
                        _ => distance[level] = Some(d),
                    }
                }
            }
        }
        // a loop no subscript depends on repeats the access on every one
        // of its iterations
        match distance.into_iter().collect::<Option<Vec<i64>>>() {
            Some(d) => DependenceRelation::Distance(d),
            None => DependenceRelation::Unknown,
        }
    }
}

fn lexicographic_sign(d: &[i64]) -> i64 {
    d.iter().find(|&&x| x != 0).map_or(0, |x| x.signum())
}

impl DependenceOracle for UniformDependenceTest {
    fn dependences(&self, nest: &ExtractedNest, refs: &[DataReference]) -> Vec<DataDependence> {
        let mut deps = Vec::new();
        for (i, a) in refs.iter().enumerate() {
            for (j, b) in refs.iter().enumerate().skip(i) {
                if a.array != b.array || (a.is_read && b.is_read) || (i == j && a.is_read) {
                    continue;
                }
                let relation = self.test_pair(a, b, &nest.loop_ids);
                let dep = match relation {
                    DependenceRelation::Known => continue,
                    DependenceRelation::Unknown => DataDependence {
                        source: i,
                        sink: j,
                        kind: DependenceKind::between(a.is_read, b.is_read),
                        relation,
                    },
                    DependenceRelation::Distance(d) => {
                        let sign = lexicographic_sign(&d);
                        if sign == 0 && i == j {
                            continue;
                        }
                        if sign < 0 {
                            let d = d.iter().map(|x| -x).collect();
                            DataDependence::distance(j, i, DependenceKind::between(b.is_read, a.is_read), d)
                        } else {
                            DataDependence::distance(i, j, DependenceKind::between(a.is_read, b.is_read), d)
                        }
                    }
                };
                deps.push(dep);
            }
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_loopnest;
    use crate::ir::{BinOp, CmpOp, IrBuilder, Operand};
    use crate::utils::SymbolInterner;

    /// for i, j: A[i][j] = A[i][j - 1] + 1
    fn stencil(names: &mut SymbolInterner) -> LoopNode {
        let mut b = IrBuilder::new(names);
        let n = b.var("n");
        let one = Operand::Const(1);
        b.counted_loop("i", Operand::Const(0), CmpOp::Lt, n, 1, |b, i| {
            let inner = b.counted_loop("j", one, CmpOp::Lt, n, 1, |b, j| {
                let (jm, x, y) = (b.var("jm"), b.var("x"), b.var("y"));
                vec![
                    b.binary("jm", BinOp::Sub, j, one),
                    b.load("x", "A", vec![i, jm]),
                    b.binary("y", BinOp::Add, x, one),
                    b.store("A", vec![i, j], y),
                ]
            });
            vec![Node::Loop(inner)]
        })
    }

    #[test]
    fn test_collect_references() {
        let mut names = SymbolInterner::new();
        let nest = stencil(&mut names);
        let refs = collect_data_references(&nest);
        assert_eq!(refs.len(), 2);
        assert!(refs[0].is_read && !refs[1].is_read);
        assert_eq!(refs[0].loop_id, 2);
        assert_eq!(refs[0].access_fns[0], Chrec::affine(1, 0, 1));
        assert_eq!(refs[0].access_fns[1], Chrec::affine(2, 0, 1));
        assert_eq!(refs[1].access_fns[1], Chrec::affine(2, 1, 1));
    }

    #[test]
    fn test_uniform_distance() {
        let mut names = SymbolInterner::new();
        let nest = stencil(&mut names);
        let ex = extract_loopnest(&nest).unwrap();
        let refs = collect_data_references(&nest);
        let deps = UniformDependenceTest.dependences(&ex, &refs);
        assert_eq!(deps, vec![DataDependence::distance(1, 0, DependenceKind::Flow, vec![0, 1])]);
    }

    #[test]
    fn test_pair_shapes() {
        let mut names = SymbolInterner::new();
        let a = names.intern("A");
        let n = names.intern("n");
        let r = |access_fns: Vec<Chrec>, is_read| DataReference { array: a, is_read, loop_id: 2, access_fns };
        let t = UniformDependenceTest;

        // A[2i] vs A[2i + 1]
        let rel = t.test_pair(&r(vec![Chrec::affine(1, 0, 2)], true), &r(vec![Chrec::affine(1, 1, 2)], false), &[1, 2]);
        assert_eq!(rel, DependenceRelation::Known);

        // A[i] in a two-deep nest repeats over j
        let rel = t.test_pair(&r(vec![Chrec::affine(1, 0, 1)], false), &r(vec![Chrec::affine(1, 0, 1)], false), &[1, 2]);
        assert_eq!(rel, DependenceRelation::Unknown);

        // A[i + n][j] vs A[i + n - 2][j]
        let base = |c| crate::chrec::fold_plus(&Chrec::symbol(n), &Chrec::int(c));
        let f = |c| vec![Chrec::poly(1, base(c), Chrec::int(1)), Chrec::affine(2, 0, 1)];
        let rel = t.test_pair(&r(f(0), false), &r(f(-2), true), &[1, 2]);
        assert_eq!(rel, DependenceRelation::Distance(vec![2, 0]));
    }

    #[test]
    fn test_closure_oracle() {
        let oracle = |_: &ExtractedNest, _: &[DataReference]| vec![DataDependence::unknown(0, 1)];
        let mut names = SymbolInterner::new();
        let nest = stencil(&mut names);
        let ex = extract_loopnest(&nest).unwrap();
        assert_eq!(oracle.dependences(&ex, &[]).len(), 1);
        assert_eq!(DependenceRelation::Distance(vec![1, -1]).to_string(), "(1, -1)");
    }
}
