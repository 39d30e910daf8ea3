//! Rewriting a loop nest in place so that it runs a transformed
//! [`LoopNest`].
//!
//! Every level gets a fresh induction variable `lniv.N` with a header PHI,
//! an inclusive exit test against the computed end and an increment at the
//! end of its body. The bounds of a level are computed in the body of the
//! enclosing level right before the inner loop, those of the outermost
//! level before the nest. The old induction variables are recomputed from
//! the new ones at the top of the innermost body.

use super::lower::{Rounding, StatementBuilder};
use crate::context::CompilationContext;
use crate::extract::ExtractedNest;
use crate::ir::{BinOp, CmpOp, ExitTest, LoopNode, Node, Operand, Phi, Stmt};
use crate::lambda::{BodyVector, LinearExpression, Loop, LoopNest, TransformMatrix};
use crate::utils::{CodegenError, CodegenErrorKind, LambdaResult, Symbol, TransformError, TransformErrorKind};
use log::{debug, trace};
use std::collections::HashSet;

/// One level of the rewritten nest.
#[derive(Debug)]
struct Level {
    iv: Symbol,
    bumper: Symbol,
    step: i64,
    start: Operand,
    end: Operand,
    /// Statements computing `start` and `end`
    setup: Vec<Stmt>,
}

fn mismatch(message: impl Into<String>) -> CodegenError {
    CodegenError::new(CodegenErrorKind::NestMismatch, message)
}

/// Start and end of `l`, inclusive.
fn emit_bounds(
    b: &mut StatementBuilder<'_>,
    k: usize,
    l: &Loop,
    ivs: &[Operand],
    invariants: &[Operand],
) -> LambdaResult<(Operand, Operand)> {
    let (start_round, start_op, end_round, end_op) = if l.step > 0 {
        (Rounding::Ceil, BinOp::Max, Rounding::Floor, BinOp::Min)
    } else {
        (Rounding::Floor, BinOp::Min, Rounding::Ceil, BinOp::Max)
    };
    let missing = |side: &str| CodegenError::new(CodegenErrorKind::BoundGeneration, format!("loop {} has no {} bound", k, side));

    if l.needs_alignment() {
        // offset + s·round(bound / s)
        let s = l.step.abs();
        let mut lower = Vec::new();
        for e in &l.lower_bounds {
            lower.push(b.linear(&e.divide(s), ivs, invariants, start_round)?);
        }
        let mut upper = Vec::new();
        for e in &l.upper_bounds {
            upper.push(b.linear(&e.divide(s), ivs, invariants, end_round)?);
        }
        let start = b.reduce(start_op, lower).ok_or_else(|| missing("lower"))?;
        let end = b.reduce(end_op, upper).ok_or_else(|| missing("upper"))?;
        let offset = b.linear(&l.linear_offset, ivs, invariants, Rounding::Floor)?;
        let start = b.binary(BinOp::Mul, start, Operand::Const(s));
        let start = b.binary(BinOp::Add, offset, start);
        let end = b.binary(BinOp::Mul, end, Operand::Const(s));
        let end = b.binary(BinOp::Add, offset, end);
        return Ok((start, end));
    }

    let mut lower = Vec::new();
    for e in l.effective_lower_bounds() {
        lower.push(b.linear(&e, ivs, invariants, start_round)?);
    }
    let mut upper = Vec::new();
    for e in l.effective_upper_bounds() {
        upper.push(b.linear(&e, ivs, invariants, end_round)?);
    }
    let start = b.reduce(start_op, lower).ok_or_else(|| missing("lower"))?;
    let end = b.reduce(end_op, upper).ok_or_else(|| missing("upper"))?;
    Ok((start, end))
}

fn innermost(root: &LoopNode, depth: usize) -> Option<&LoopNode> {
    let mut l = root;
    for _ in 1..depth {
        l = l.only_inner_loop()?;
    }
    Some(l)
}

/// Rewrite `root`, extracted as `extracted`, into the loops of `target`,
/// the image of the extracted nest under `trans`.
///
/// Returns the statements computing the bounds of the outermost loop; they
/// must be placed right before `root`. On error `root` is left unchanged.
pub fn materialize(
    ctx: &mut CompilationContext,
    root: &mut LoopNode,
    extracted: &ExtractedNest,
    target: &LoopNest,
    trans: &TransformMatrix,
) -> LambdaResult<Vec<Stmt>> {
    let depth = extracted.depth();
    if target.depth() != depth || trans.depth() != depth {
        return Err(mismatch(format!(
            "nest of depth {}, target of depth {}, {}x{} transform",
            depth,
            target.depth(),
            trans.depth(),
            trans.depth()
        ))
        .into());
    }
    if root.id != extracted.loop_ids.first().copied().unwrap_or(root.id) || root.depth() < depth {
        return Err(mismatch(format!("loop {} is not the extracted nest", root.id)).into());
    }
    let inverse = trans
        .inverse()
        .ok_or_else(|| TransformError::new(TransformErrorKind::Singular, "transform has no inverse"))?;

    let ivs: Vec<Symbol> = (0..depth).map(|_| ctx.fresh_symbol("lniv")).collect();
    let bumpers: Vec<Symbol> = (0..depth).map(|_| ctx.fresh_symbol("lnivnext")).collect();
    let iv_ops: Vec<Operand> = ivs.iter().map(|&s| Operand::Var(s)).collect();
    let invariant_ops: Vec<Operand> = extracted.invariants.iter().map(|&s| Operand::Var(s)).collect();

    let mut levels = Vec::with_capacity(depth);
    for (k, l) in target.loops.iter().enumerate() {
        let mut b = StatementBuilder::new(ctx);
        let (start, end) = emit_bounds(&mut b, k, l, &iv_ops, &invariant_ops)?;
        levels.push(Level { iv: ivs[k], bumper: bumpers[k], step: l.step, start, end, setup: b.finish() });
    }

    let removed: HashSet<Symbol> = extracted.bumpers.iter().chain(&extracted.setup).copied().collect();
    let body_vectors = {
        let inner = innermost(root, depth).ok_or_else(|| mismatch("nest is shallower than extracted"))?;
        let used = |sym: Symbol| {
            inner.body.iter().any(|n| match n {
                Node::Stmt(s) => !s.dest().is_some_and(|d| removed.contains(&d)) && s.uses(sym),
                Node::Loop(l) => l.uses(sym),
            })
        };
        let mut b = StatementBuilder::new(ctx);
        for j in 0..depth {
            let (old_iv, old_bumper) = (extracted.induction_vars[j], extracted.bumpers[j]);
            let bumper_used = used(old_bumper);
            if !used(old_iv) && !bumper_used {
                continue;
            }
            // x = T^-1 · x'
            let v = BodyVector::unit(j, depth).transform(&inverse);
            let e = LinearExpression {
                coefficients: v.coefficients,
                invariant_coefficients: Vec::new(),
                constant: 0,
                denominator: v.denominator,
            }
            .normalize();
            let value = b.linear(&e, &iv_ops, &invariant_ops, Rounding::Ceil)?;
            b.assign(old_iv, value);
            if bumper_used {
                let step = extracted.nest.loops[j].step;
                b.push(Stmt::binary(old_bumper, BinOp::Add, Operand::Var(old_iv), Operand::Const(step)));
            }
        }
        b.finish()
    };

    let mut rewritten = root.clone();
    rewrite_level(&mut rewritten, 0, &levels, &removed, &body_vectors)?;
    *root = rewritten;

    let preheader = levels.into_iter().next().map(|l| l.setup).unwrap_or_default();
    debug!("materialized nest {} with {} preheader statements", root.id, preheader.len());
    Ok(preheader)
}

fn rewrite_level(
    l: &mut LoopNode,
    level: usize,
    levels: &[Level],
    removed: &HashSet<Symbol>,
    body_vectors: &[Stmt],
) -> LambdaResult<()> {
    let lv = &levels[level];
    trace!("loop {} becomes level {} with step {}", l.id, level, lv.step);
    l.phis = vec![Phi::header(lv.iv, lv.start, Operand::Var(lv.bumper))];
    let op = if lv.step > 0 { CmpOp::Le } else { CmpOp::Ge };
    l.test = Some(ExitTest { op, lhs: Operand::Var(lv.iv), rhs: lv.end });
    l.body.retain(|n| !matches!(n, Node::Stmt(s) if s.dest().is_some_and(|d| removed.contains(&d))));

    if level + 1 < levels.len() {
        let pos = l
            .body
            .iter()
            .position(|n| matches!(n, Node::Loop(_)))
            .ok_or_else(|| mismatch(format!("loop {} has no inner loop", l.id)))?;
        let setup = levels[level + 1].setup.iter().cloned().map(Node::Stmt);
        l.body.splice(pos..pos, setup);
        let inner = l
            .only_inner_loop_mut()
            .ok_or_else(|| mismatch("inner loop is not unique"))?;
        rewrite_level(inner, level + 1, levels, removed, body_vectors)?;
    } else {
        l.body.splice(0..0, body_vectors.iter().cloned().map(Node::Stmt));
    }
    l.body.push(Node::Stmt(Stmt::binary(lv.bumper, BinOp::Add, Operand::Var(lv.iv), Operand::Const(lv.step))));
    Ok(())
}
