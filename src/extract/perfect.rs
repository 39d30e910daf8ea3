//! Perfect loop nests and perfect-nestification.
//!
//! In a perfect nest every statement lives in the innermost body. Outer
//! bodies may still hold the increment of their induction variable and
//! statements that only compute the bounds of the loop inside them.

use super::induction_variable;
use crate::chrec::LoopId;
use crate::context::CompilationContext;
use crate::ir::{Expr, ExitTest, LoopNode, Node, Operand, Phi, Stmt};
use crate::utils::{ExtractError, ExtractErrorKind, LambdaResult, Symbol};
use log::debug;

/// How the body of a loop with one inner loop splits up.
#[derive(Debug, Default)]
struct Split {
    inner: usize,
    setup: Vec<usize>,
    displaced: Vec<usize>,
}

fn inner_index(l: &LoopNode) -> Result<Option<usize>, ExtractError> {
    let mut loops = l.body.iter().enumerate().filter(|(_, n)| matches!(n, Node::Loop(_)));
    let first = loops.next().map(|(k, _)| k);
    if loops.next().is_some() {
        return Err(ExtractError::new(ExtractErrorKind::MultipleInnerLoops, "more than one loop in the body").in_loop(l.id));
    }
    Ok(first)
}

/// Uses of `sym` in `l` other than the entry arguments of `inner`'s PHIs,
/// `inner`'s exit test and the statements at `allowed`.
fn used_outside_setup(l: &LoopNode, inner: &LoopNode, allowed: &[usize], sym: Symbol) -> bool {
    if l.phis.iter().any(|p| p.uses(sym))
        || l.test.as_ref().is_some_and(|t| t.uses(sym))
        || l.exit_phis.iter().any(|p| p.uses(sym))
    {
        return true;
    }
    let inner_uses = inner.phis.iter().any(|p| p.latch().is_some_and(|o| o.uses(sym)))
        || inner.body.iter().any(|n| n.uses(sym))
        || inner.exit_phis.iter().any(|p| p.uses(sym));
    inner_uses
        || l.body.iter().enumerate().any(|(k, n)| match n {
            Node::Stmt(s) => !allowed.contains(&k) && s.uses(sym),
            Node::Loop(_) => false,
        })
}

fn split_body(l: &LoopNode, inner: usize) -> Result<Split, ExtractError> {
    let iv = induction_variable(l)?;
    let Node::Loop(inner_loop) = &l.body[inner] else {
        return Err(ExtractError::new(ExtractErrorKind::ImperfectNest, "inner loop not found").in_loop(l.id));
    };

    let mut setup: Vec<usize> = l.body[..inner]
        .iter()
        .enumerate()
        .filter(|(_, n)| matches!(n, Node::Stmt(Stmt::Assign { dest, expr }) if *dest != iv.bumper && !matches!(expr, Expr::Load { .. })))
        .map(|(k, _)| k)
        .collect();
    loop {
        let before = setup.len();
        let snapshot = setup.clone();
        setup.retain(|&k| match &l.body[k] {
            Node::Stmt(s) => s.dest().is_some_and(|d| !used_outside_setup(l, inner_loop, &snapshot, d)),
            Node::Loop(_) => false,
        });
        if setup.len() == before {
            break;
        }
    }

    let mut displaced = Vec::new();
    for (k, n) in l.body.iter().enumerate() {
        let Node::Stmt(s) = n else { continue };
        if s.dest() == Some(iv.bumper) || setup.contains(&k) {
            continue;
        }
        if k < inner {
            return Err(ExtractError::new(ExtractErrorKind::ImperfectNest, "statement before the inner loop").in_loop(l.id));
        }
        displaced.push(k);
    }
    Ok(Split { inner, setup, displaced })
}

/// Check that the nest rooted at `root` is perfect and return the bound
/// set-up statements of its outer bodies.
pub fn check_perfect_nest(root: &LoopNode) -> Result<Vec<Symbol>, ExtractError> {
    let mut setup = Vec::new();
    let mut l = root;
    while let Some(k) = inner_index(l)? {
        let split = split_body(l, k)?;
        if !split.displaced.is_empty() {
            return Err(ExtractError::new(ExtractErrorKind::ImperfectNest, "statements after the inner loop").in_loop(l.id));
        }
        setup.extend(split.setup.iter().filter_map(|&k| match &l.body[k] {
            Node::Stmt(s) => s.dest(),
            Node::Loop(_) => None,
        }));
        let Node::Loop(inner) = &l.body[split.inner] else { break };
        l = inner;
    }
    Ok(setup)
}

pub fn perfect_nest_p(root: &LoopNode) -> bool {
    check_perfect_nest(root).is_ok()
}

fn imperfect(id: LoopId, message: &str) -> ExtractError {
    ExtractError::new(ExtractErrorKind::ImperfectNest, message).in_loop(id)
}

/// Split a two-deep nest whose outer body has statements after the inner
/// loop into the perfect nest and a sibling loop with the same bounds that
/// runs the displaced statements.
///
/// `outer` is left perfect; the returned sibling, numbered `new_id`, goes
/// right after it. Fails when the displaced statements interact with the
/// inner loop through scalars or memory.
pub fn nestify(ctx: &mut CompilationContext, outer: &mut LoopNode, new_id: LoopId) -> LambdaResult<LoopNode> {
    let id = outer.id;
    let k = inner_index(outer)?.ok_or_else(|| imperfect(id, "no inner loop"))?;
    let split = split_body(outer, k)?;
    let Node::Loop(inner) = &outer.body[k] else {
        return Err(imperfect(id, "inner loop not found").into());
    };
    if inner.inner_loops().next().is_some() {
        return Err(imperfect(id, "only two-deep nests can be made perfect").into());
    }
    if split.displaced.is_empty() {
        return Err(imperfect(id, "nothing to move").into());
    }
    if outer.phis.len() != 1 {
        return Err(imperfect(id, "outer loop carries scalars").into());
    }
    if inner.exit_phis.iter().chain(&outer.exit_phis).any(|p| p.args.len() != 1) {
        return Err(ExtractError::new(ExtractErrorKind::ComplexExitPhi, "exit block merges several values")
            .in_loop(id)
            .into());
    }

    let iv = induction_variable(outer)?;
    let (iv_sym, bumper) = (iv.phi.result, iv.bumper);
    let entry = iv.phi.entry().ok_or_else(|| imperfect(id, "induction PHI without entry"))?;
    let test = ExitTest { op: iv.op, lhs: Operand::Var(iv_sym), rhs: iv.bound };

    let displaced: Vec<&Stmt> = split
        .displaced
        .iter()
        .filter_map(|&k| match &outer.body[k] {
            Node::Stmt(s) => Some(s),
            Node::Loop(_) => None,
        })
        .collect();

    let mut inner_defs = inner.definitions();
    inner_defs.extend(split.setup.iter().filter_map(|&k| match &outer.body[k] {
        Node::Stmt(s) => s.dest(),
        Node::Loop(_) => None,
    }));
    if displaced.iter().any(|s| inner_defs.iter().any(|&d| s.uses(d))) {
        return Err(imperfect(id, "moved statements use values of the inner loop").into());
    }
    if displaced.iter().filter_map(|s| s.dest()).any(|d| inner.uses(d)) {
        return Err(imperfect(id, "inner loop uses values of the moved statements").into());
    }
    let inner_accesses = inner.memory_accesses();
    for (array, write) in displaced.iter().flat_map(|s| s.memory_accesses()) {
        if inner_accesses.iter().any(|&(a, w)| a == array && (w || write)) {
            return Err(imperfect(id, "moved statements share memory with the inner loop").into());
        }
    }

    let increment = outer
        .statements()
        .find(|s| s.dest() == Some(bumper))
        .cloned()
        .ok_or_else(|| imperfect(id, "increment of the induction variable not found"))?;
    let Stmt::Assign { expr: increment, .. } = increment else {
        return Err(imperfect(id, "increment of the induction variable not found").into());
    };

    let iv_name = ctx.name(iv_sym);
    let bumper_name = ctx.name(bumper);
    let new_iv = ctx.fresh_symbol(&iv_name);
    let new_bumper = ctx.fresh_symbol(&bumper_name);

    let mut body: Vec<Node> = displaced.into_iter().cloned().map(Node::Stmt).collect();
    body.push(Node::Stmt(Stmt::assign(bumper, increment)));
    let mut sibling = LoopNode {
        id: new_id,
        phis: vec![Phi::header(iv_sym, entry, Operand::Var(bumper))],
        test: Some(test),
        body,
        exit_phis: std::mem::take(&mut outer.exit_phis),
    };
    // rename the induction variable after copying so that everything
    // moved over refers to the sibling's own counter
    sibling.replace_uses(iv_sym, Operand::Var(new_iv));
    sibling.replace_uses(bumper, Operand::Var(new_bumper));
    sibling.phis[0].result = new_iv;
    if let Some(Node::Stmt(Stmt::Assign { dest, .. })) = sibling.body.last_mut() {
        *dest = new_bumper;
    }

    for &k in split.displaced.iter().rev() {
        outer.body.remove(k);
    }
    debug!("split loop {} into a perfect nest and loop {}", id, new_id);
    Ok(sibling)
}
