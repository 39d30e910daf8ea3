//! Loopnest extraction: from IR loops to a lambda [`LoopNest`].
//!
//! Each loop of the nest, outermost first, contributes its induction
//! variable, its constant step, its start value (the entry argument of the
//! induction PHI) and its inclusive end value (derived from the exit test).
//! Both bounds must be affine in the outer induction variables and in
//! values that are invariant in the whole nest.

pub mod perfect;

use crate::chrec::LoopId;
use crate::ir::{BinOp, CmpOp, Expr, LoopNode, Operand, Phi, Scev};
use crate::lambda::{LinearExpression, Loop, LoopNest};
use crate::utils::{ExtractError, ExtractErrorKind, LambdaResult, Symbol};
use log::debug;

pub use perfect::{check_perfect_nest, nestify, perfect_nest_p};

/// A loopnest together with the IR names it was extracted from.
#[derive(Debug, Clone)]
pub struct ExtractedNest {
    pub nest: LoopNest,
    /// Loop ids, outermost first
    pub loop_ids: Vec<LoopId>,
    /// Induction variable of each loop
    pub induction_vars: Vec<Symbol>,
    /// Latch value of each induction variable
    pub bumpers: Vec<Symbol>,
    /// Values the bounds refer to as invariants, in column order
    pub invariants: Vec<Symbol>,
    /// Outer-body statements that only compute bounds of inner loops
    pub setup: Vec<Symbol>,
}

impl ExtractedNest {
    pub fn depth(&self) -> usize {
        self.loop_ids.len()
    }

    /// Position of loop `id` in the nest.
    pub fn level_of(&self, id: LoopId) -> Option<usize> {
        self.loop_ids.iter().position(|&l| l == id)
    }
}

/// The induction variable a loop tests, with the test normalized so that
/// the variable is on the left.
#[derive(Debug, Clone, Copy)]
pub struct InductionVariable<'a> {
    pub phi: &'a Phi,
    pub op: CmpOp,
    pub bound: Operand,
    pub bumper: Symbol,
}

pub fn induction_variable(l: &LoopNode) -> Result<InductionVariable<'_>, ExtractError> {
    let test = l
        .test
        .as_ref()
        .ok_or_else(|| ExtractError::new(ExtractErrorKind::NoExitTest, "cannot determine exit condition").in_loop(l.id))?;
    let lhs = test.lhs.as_var().and_then(|s| l.header_phi(s));
    let rhs = test.rhs.as_var().and_then(|s| l.header_phi(s));
    let (phi, op, bound) = match (lhs, rhs) {
        (Some(phi), _) => (phi, test.op, test.rhs),
        (None, Some(phi)) => (phi, test.op.mirror(), test.lhs),
        (None, None) => {
            return Err(ExtractError::new(
                ExtractErrorKind::NoInductionVariable,
                "cannot find PHI node for induction variable",
            )
            .in_loop(l.id))
        }
    };
    let arity = || ExtractError::new(ExtractErrorKind::PhiArity, "induction PHI needs one entry and one latch argument").in_loop(l.id);
    if phi.args.len() != 2 || phi.entry().is_none() {
        return Err(arity());
    }
    let bumper = phi.latch().and_then(|o| o.as_var()).ok_or_else(arity)?;
    Ok(InductionVariable { phi, op, bound, bumper })
}

/// Affine form collected while walking definitions; invariant columns are
/// added as they are discovered.
#[derive(Debug, Clone, Default)]
struct Affine {
    ivs: Vec<i64>,
    invariants: Vec<i64>,
    constant: i64,
}

impl Affine {
    fn constant(c: i64) -> Self {
        Self { constant: c, ..Default::default() }
    }

    fn unit(slot: usize, len: usize) -> Vec<i64> {
        let mut v = vec![0; len];
        v[slot] = 1;
        v
    }

    fn combine(&self, other: &Affine, f: i64) -> Option<Affine> {
        let mix = |a: &[i64], b: &[i64]| -> Option<Vec<i64>> {
            (0..a.len().max(b.len()))
                .map(|k| {
                    let x = a.get(k).copied().unwrap_or(0);
                    let y = b.get(k).copied().unwrap_or(0);
                    x.checked_add(y.checked_mul(f)?)
                })
                .collect()
        };
        Some(Affine {
            ivs: mix(&self.ivs, &other.ivs)?,
            invariants: mix(&self.invariants, &other.invariants)?,
            constant: self.constant.checked_add(other.constant.checked_mul(f)?)?,
        })
    }

    fn scale(&self, f: i64) -> Option<Affine> {
        Affine::default().combine(self, f)
    }

    fn as_constant(&self) -> Option<i64> {
        (self.ivs.iter().all(|&c| c == 0) && self.invariants.iter().all(|&c| c == 0)).then_some(self.constant)
    }

    fn into_linear(self, depth: usize, invariants: usize) -> LinearExpression {
        let mut e = LinearExpression::constant(self.constant, depth, invariants);
        for (k, c) in self.ivs.into_iter().enumerate() {
            e.coefficients[k] = c;
        }
        for (k, c) in self.invariants.into_iter().enumerate() {
            e.invariant_coefficients[k] = c;
        }
        e
    }
}

const MAX_CHAIN: usize = 32;

struct Extractor<'a> {
    scev: Scev<'a>,
    loop_ids: Vec<LoopId>,
    induction_vars: Vec<Symbol>,
    invariants: Vec<Symbol>,
}

impl<'a> Extractor<'a> {
    /// Express `op` at level `level` as an affine form over the
    /// induction variables of levels `0..level` and nest invariants.
    fn affine(&mut self, op: Operand, level: usize, chain: usize) -> Option<Affine> {
        if chain > MAX_CHAIN {
            return None;
        }
        let sym = match op {
            Operand::Const(c) => return Some(Affine::constant(c)),
            Operand::Var(s) => s,
        };
        if let Some(j) = self.induction_vars.iter().position(|&iv| iv == sym) {
            return (j < level).then(|| Affine { ivs: Affine::unit(j, j + 1), ..Default::default() });
        }
        if !self.scev.is_defined(sym) {
            let slot = match self.invariants.iter().position(|&p| p == sym) {
                Some(slot) => slot,
                None => {
                    self.invariants.push(sym);
                    self.invariants.len() - 1
                }
            };
            return Some(Affine { invariants: Affine::unit(slot, slot + 1), ..Default::default() });
        }
        // defined in the nest: must be a plain computation in an outer body
        if self.scev.is_header_phi(sym) || self.loop_ids[level..].iter().any(|&id| self.scev.defined_in(sym, id)) {
            return None;
        }
        match self.scev.assignment(sym)? {
            Expr::Use(a) => self.affine(*a, level, chain + 1),
            Expr::Binary(op, a, b) => {
                let a = self.affine(*a, level, chain + 1)?;
                let b = self.affine(*b, level, chain + 1)?;
                match op {
                    BinOp::Add => a.combine(&b, 1),
                    BinOp::Sub => a.combine(&b, -1),
                    BinOp::Mul => match (a.as_constant(), b.as_constant()) {
                        (Some(c), _) => b.scale(c),
                        (_, Some(c)) => a.scale(c),
                        _ => None,
                    },
                    _ => None,
                }
            }
            Expr::Load { .. } => None,
        }
    }

    fn step(&self, l: &LoopNode, iv: Symbol) -> Result<i64, ExtractError> {
        let err = |kind, msg: &str| ExtractError::new(kind, msg).in_loop(l.id);
        let chrec = self.scev.analyze(Operand::Var(iv));
        if chrec.contains_undetermined() {
            return Err(err(ExtractErrorKind::UnknownEvolution, "access function for induction variable PHI is unknown"));
        }
        match crate::chrec::evolution_part_in_loop_num(&chrec, l.id) {
            None => Err(err(ExtractErrorKind::ZeroStep, "induction variable does not evolve")),
            Some(step) => match step.as_int() {
                Some(0) => Err(err(ExtractErrorKind::ZeroStep, "step of loop is zero")),
                Some(s) => Ok(s),
                None if step.contains_undetermined() => {
                    Err(err(ExtractErrorKind::UnknownEvolution, "cannot determine step of loop"))
                }
                None => Err(err(ExtractErrorKind::NonConstantStep, "step of loop is not integer")),
            },
        }
    }
}

/// Inclusive end value of a loop running while `iv op bound` holds.
///
/// `==` has none: such a loop runs once or not at all.
fn end_adjustment(op: CmpOp, step: i64) -> Option<i64> {
    match op {
        CmpOp::Lt if step > 0 => Some(-1),
        CmpOp::Gt if step < 0 => Some(1),
        CmpOp::Le if step > 0 => Some(0),
        CmpOp::Ge if step < 0 => Some(0),
        CmpOp::Ne => Some(-step),
        _ => None,
    }
}

/// Convert the perfect nest rooted at `root` into a lambda loopnest.
pub fn extract_loopnest(root: &LoopNode) -> LambdaResult<ExtractedNest> {
    let setup = check_perfect_nest(root)?;

    let mut chain = vec![root];
    while let Some(inner) = chain[chain.len() - 1].only_inner_loop() {
        chain.push(inner);
    }
    let depth = chain.len();

    let mut ex = Extractor {
        scev: Scev::new(root),
        loop_ids: chain.iter().map(|l| l.id).collect(),
        induction_vars: Vec::with_capacity(depth),
        invariants: Vec::new(),
    };
    let mut bumpers = Vec::with_capacity(depth);
    let mut parts = Vec::with_capacity(depth);

    for (level, l) in chain.iter().enumerate() {
        let iv = induction_variable(l)?;
        if let Some(extra) = l.phis.iter().find(|p| p.result != iv.phi.result) {
            return Err(ExtractError::new(
                ExtractErrorKind::UnknownEvolution,
                format!("scalar {:?} is carried across iterations", extra.result),
            )
            .in_loop(l.id)
            .into());
        }
        if !l.exit_phis.is_empty() {
            return Err(ExtractError::new(ExtractErrorKind::ComplexExitPhi, "values are live after the loop")
                .in_loop(l.id)
                .into());
        }
        let step = ex.step(l, iv.phi.result)?;

        let adjust = end_adjustment(iv.op, step).ok_or_else(|| {
            let message = if iv.op == CmpOp::Eq {
                "exit test `==` does not bound a counted loop".to_string()
            } else {
                format!("exit test `{}` never ends a loop with step {}", iv.op.symbol(), step)
            };
            ExtractError::new(ExtractErrorKind::InconsistentExitTest, message).in_loop(l.id)
        })?;
        let non_affine = |what: &str| {
            ExtractError::new(ExtractErrorKind::NonAffineBound, format!("cannot convert {} bound to linear expression", what))
                .in_loop(l.id)
        };
        let entry = iv.phi.entry().ok_or_else(|| non_affine("lower"))?;
        let lower = ex.affine(entry, level, 0).ok_or_else(|| non_affine("lower"))?;
        let upper = ex
            .affine(iv.bound, level, 0)
            .and_then(|u| u.combine(&Affine::constant(adjust), 1))
            .ok_or_else(|| non_affine("upper"))?;

        ex.induction_vars.push(iv.phi.result);
        bumpers.push(iv.bumper);
        parts.push((step, lower, upper));
    }

    let invariants = ex.invariants.len();
    let loops = parts
        .into_iter()
        .map(|(step, lower, upper)| {
            let mut l = Loop::new(step, depth, invariants);
            l.lower_bounds.push(lower.into_linear(depth, invariants));
            l.upper_bounds.push(upper.into_linear(depth, invariants));
            l
        })
        .collect();
    let nest = LoopNest::new(loops, invariants);
    debug!("extracted nest of depth {} at loop {}:\n{}", depth, root.id, nest);

    Ok(ExtractedNest {
        nest,
        loop_ids: ex.loop_ids,
        induction_vars: ex.induction_vars,
        bumpers,
        invariants: ex.invariants,
        setup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{IrBuilder, Node};
    use crate::utils::{LambdaError, SymbolInterner};

    fn kind(err: LambdaError) -> ExtractErrorKind {
        match err {
            LambdaError::Extract(e) => e.kind,
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_rectangular_nest() {
        let mut names = SymbolInterner::new();
        let mut b = IrBuilder::new(&mut names);
        let n = b.var("n");
        let m = b.var("m");
        let zero = Operand::Const(0);
        let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, |b, _| {
            vec![Node::Loop(b.counted_loop("j", zero, CmpOp::Lt, m, 1, |b, j| vec![b.store("A", vec![j], j)]))]
        });
        let ex = extract_loopnest(&nest).unwrap();
        assert_eq!(ex.depth(), 2);
        assert_eq!(ex.loop_ids, vec![1, 2]);
        assert_eq!(ex.invariants, vec![names.intern("n"), names.intern("m")]);
        assert_eq!(ex.nest.iteration_points(&[3, 4]).len(), 12);
        assert_eq!(ex.nest.loops[1].upper_bounds[0], {
            let mut e = LinearExpression::invariant(1, 2, 2);
            e.constant = -1;
            e
        });
    }

    #[test]
    fn test_triangular_and_mirrored() {
        let mut names = SymbolInterner::new();
        let mut b = IrBuilder::new(&mut names);
        let n = b.var("n");
        let nest = b.counted_loop("i", Operand::Const(0), CmpOp::Le, n, 2, |b, i| {
            let t = b.var("t");
            let setup = b.binary("t", BinOp::Add, i, Operand::Const(1));
            let mut inner = b.counted_loop("j", t, CmpOp::Lt, Operand::Const(20), 1, |b, j| vec![b.store("A", vec![i, j], j)]);
            // 20 > j
            if let Some(test) = inner.test.as_mut() {
                std::mem::swap(&mut test.lhs, &mut test.rhs);
                test.op = CmpOp::Gt;
            }
            vec![setup, Node::Loop(inner)]
        });
        let ex = extract_loopnest(&nest).unwrap();
        assert_eq!(ex.setup, vec![names.intern("t")]);
        assert_eq!(ex.nest.loops[0].step, 2);
        assert_eq!(ex.nest.loops[1].lower_bounds[0].coefficients, vec![1, 0]);
        assert_eq!(ex.nest.loops[1].lower_bounds[0].constant, 1);
        assert_eq!(ex.nest.loops[1].upper_bounds[0].constant, 19);
        // i in {0, 2, 4}, j in i+1..19
        assert_eq!(ex.nest.iteration_points(&[4]).len(), 19 + 17 + 15);
    }

    #[test]
    fn test_downward_loop() {
        let mut names = SymbolInterner::new();
        let mut b = IrBuilder::new(&mut names);
        let n = b.var("n");
        let nest = b.counted_loop("i", n, CmpOp::Ge, Operand::Const(1), -1, |b, i| vec![b.store("A", vec![i], i)]);
        let ex = extract_loopnest(&nest).unwrap();
        assert_eq!(ex.nest.loops[0].step, -1);
        assert_eq!(ex.nest.iteration_points(&[5]).len(), 5);
    }

    #[test]
    fn test_rejections() {
        let mut names = SymbolInterner::new();
        let mut b = IrBuilder::new(&mut names);
        let n = b.var("n");
        let zero = Operand::Const(0);

        // inner bound depends on a loaded value
        let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, |b, i| {
            let k = b.var("k");
            let load = b.load("k", "K", vec![i]);
            vec![load, Node::Loop(b.counted_loop("j", zero, CmpOp::Lt, k, 1, |b, j| vec![b.store("A", vec![j], j)]))]
        });
        assert_eq!(kind(extract_loopnest(&nest).unwrap_err()), ExtractErrorKind::ImperfectNest);

        // inner bound uses its own induction variable
        let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, |b, _| {
            let j = b.var("j");
            vec![Node::Loop(b.counted_loop("j", zero, CmpOp::Lt, j, 1, |_, _| vec![]))]
        });
        assert!(extract_loopnest(&nest).is_err());

        // i < n with a negative step
        let nest = b.counted_loop("i", zero, CmpOp::Lt, n, -1, |_, _| vec![]);
        assert_eq!(kind(extract_loopnest(&nest).unwrap_err()), ExtractErrorKind::InconsistentExitTest);

        // symbolic step
        let mut nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, |_, _| vec![]);
        if let Some(Node::Stmt(s)) = nest.body.last_mut() {
            let i = s.operands()[0];
            *s = crate::ir::Stmt::binary(s.dest().unwrap(), BinOp::Add, i, n);
        }
        assert_eq!(kind(extract_loopnest(&nest).unwrap_err()), ExtractErrorKind::NonConstantStep);

        // j == 3 runs once at most
        let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, |b, i| {
            let three = Operand::Const(3);
            vec![Node::Loop(b.counted_loop("j", zero, CmpOp::Eq, three, 1, |b, j| vec![b.store("A", vec![j, i], j)]))]
        });
        let err = extract_loopnest(&nest).unwrap_err();
        assert_eq!(kind(err), ExtractErrorKind::InconsistentExitTest);

        let mut nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, |_, _| vec![]);
        nest.test = None;
        assert_eq!(kind(extract_loopnest(&nest).unwrap_err()), ExtractErrorKind::NoExitTest);
    }

    #[test]
    fn test_end_adjustment() {
        assert_eq!(end_adjustment(CmpOp::Lt, 1), Some(-1));
        assert_eq!(end_adjustment(CmpOp::Gt, -2), Some(1));
        assert_eq!(end_adjustment(CmpOp::Ne, 3), Some(-3));
        assert_eq!(end_adjustment(CmpOp::Ge, 1), None);
        assert_eq!(end_adjustment(CmpOp::Eq, 1), None);
    }
}
