//! Scalar evolution over the loop IR.
//!
//! Answers "how does this value evolve" with a chrec. Only the shapes the
//! loop pass needs are recognized; everything else is `Unknown`.

use super::{BinOp, Expr, LoopNode, Node, Operand, Phi};
use crate::chrec::{evolution_part_in_loop_num, fold_minus, fold_multiply, fold_plus, Chrec, LoopId};
use crate::utils::Symbol;
use std::collections::HashMap;

/// Recursion limit; malformed IR may define values in terms of
/// themselves outside of a PHI.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Definition<'a> {
    Header(LoopId, &'a Phi),
    Assign(&'a Expr),
    Exit,
}

#[derive(Debug, Clone)]
struct Def<'a> {
    kind: Definition<'a>,
    /// Enclosing loops, outermost first
    loops: Vec<LoopId>,
}

/// Scalar evolution analyzer for one loop nest.
#[derive(Debug, Clone)]
pub struct Scev<'a> {
    defs: HashMap<Symbol, Def<'a>>,
}

impl<'a> Scev<'a> {
    pub fn new(root: &'a LoopNode) -> Self {
        let mut defs = HashMap::new();
        collect(root, &mut Vec::new(), &mut defs);
        Self { defs }
    }

    /// Whether `sym` is defined anywhere in the nest.
    pub fn is_defined(&self, sym: Symbol) -> bool {
        self.defs.contains_key(&sym)
    }

    /// Loops enclosing the definition of `sym`, outermost first. Exit
    /// PHIs count as defined outside their loop.
    pub fn enclosing_loops(&self, sym: Symbol) -> Option<&[LoopId]> {
        self.defs.get(&sym).map(|d| d.loops.as_slice())
    }

    /// Whether `sym` is defined in loop `id` or in a loop inside it.
    pub fn defined_in(&self, sym: Symbol, id: LoopId) -> bool {
        self.enclosing_loops(sym).is_some_and(|l| l.contains(&id))
    }

    /// The right hand side of `sym` if an assignment defines it.
    pub fn assignment(&self, sym: Symbol) -> Option<&'a Expr> {
        match self.defs.get(&sym)?.kind {
            Definition::Assign(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn is_header_phi(&self, sym: Symbol) -> bool {
        matches!(self.defs.get(&sym), Some(Def { kind: Definition::Header(..), .. }))
    }

    pub fn analyze(&self, op: Operand) -> Chrec {
        self.analyze_at(op, 0)
    }

    /// The evolution of `op` in loop `id`, `None` if it does not evolve.
    pub fn evolution_in(&self, id: LoopId, op: Operand) -> Option<Chrec> {
        evolution_part_in_loop_num(&self.analyze(op), id)
    }

    fn analyze_at(&self, op: Operand, depth: usize) -> Chrec {
        if depth > MAX_DEPTH {
            return Chrec::Unknown;
        }
        let sym = match op {
            Operand::Const(c) => return Chrec::int(c),
            Operand::Var(s) => s,
        };
        let Some(def) = self.defs.get(&sym) else {
            return Chrec::symbol(sym);
        };
        match def.kind {
            Definition::Header(id, phi) => self.analyze_phi(id, phi, depth + 1),
            Definition::Assign(expr) => match expr {
                Expr::Use(a) => self.analyze_at(*a, depth + 1),
                Expr::Binary(op, a, b) => {
                    let a = self.analyze_at(*a, depth + 1);
                    let b = self.analyze_at(*b, depth + 1);
                    match op {
                        BinOp::Add => fold_plus(&a, &b),
                        BinOp::Sub => fold_minus(&a, &b),
                        BinOp::Mul => fold_multiply(&a, &b),
                        _ => Chrec::Unknown,
                    }
                }
                Expr::Load { .. } => Chrec::Unknown,
            },
            Definition::Exit => Chrec::Unknown,
        }
    }

    /// `x = phi(init, x + c)` with `c` invariant in the loop is
    /// `{init, +, c}_loop`.
    fn analyze_phi(&self, id: LoopId, phi: &Phi, depth: usize) -> Chrec {
        if phi.args.len() != 2 {
            return Chrec::Unknown;
        }
        let (Some(entry), Some(Operand::Var(latch))) = (phi.entry(), phi.latch()) else {
            return Chrec::Unknown;
        };
        let Some(Def { kind: Definition::Assign(Expr::Binary(op, a, b)), .. }) = self.defs.get(&latch) else {
            return Chrec::Unknown;
        };
        let me = Operand::Var(phi.result);
        let (increment, negate) = match op {
            BinOp::Add if *a == me => (*b, false),
            BinOp::Add if *b == me => (*a, false),
            BinOp::Sub if *a == me => (*b, true),
            _ => return Chrec::Unknown,
        };
        if let Operand::Var(s) = increment {
            if self.defined_in(s, id) {
                return Chrec::Unknown;
            }
        }
        let mut step = self.analyze_at(increment, depth);
        if negate {
            step = fold_minus(&Chrec::int(0), &step);
        }
        let init = self.analyze_at(entry, depth);
        Chrec::poly(id, init, step)
    }
}

fn collect<'a>(l: &'a LoopNode, path: &mut Vec<LoopId>, defs: &mut HashMap<Symbol, Def<'a>>) {
    path.push(l.id);
    for phi in &l.phis {
        defs.insert(phi.result, Def { kind: Definition::Header(l.id, phi), loops: path.clone() });
    }
    for n in &l.body {
        match n {
            Node::Stmt(s) => {
                if let super::Stmt::Assign { dest, expr } = s {
                    defs.insert(*dest, Def { kind: Definition::Assign(expr), loops: path.clone() });
                }
            }
            Node::Loop(inner) => collect(inner, path, defs),
        }
    }
    path.pop();
    for phi in &l.exit_phis {
        defs.insert(phi.result, Def { kind: Definition::Exit, loops: path.clone() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, IrBuilder};
    use crate::utils::SymbolInterner;

    #[test]
    fn test_induction_variables() {
        let mut names = SymbolInterner::new();
        let mut b = IrBuilder::new(&mut names);
        let n = b.var("n");
        let nest = b.counted_loop("i", Operand::Const(2), CmpOp::Lt, n, 3, |b, i| {
            let inner = b.counted_loop("j", i, CmpOp::Gt, Operand::Const(0), -1, |b, j| {
                let t = b.var("t");
                vec![b.binary("t", BinOp::Add, i, j), b.binary("u", BinOp::Mul, t, Operand::Const(2))]
            });
            vec![Node::Loop(inner)]
        });
        let i = names.intern("i");
        let j = names.intern("j");
        let t = names.intern("t");
        let u = names.intern("u");
        let scev = Scev::new(&nest);

        assert_eq!(scev.analyze(Operand::Var(i)), Chrec::affine(1, 2, 3));
        // j starts at the current i and counts down
        assert_eq!(scev.analyze(Operand::Var(j)), Chrec::poly(2, Chrec::affine(1, 2, 3), Chrec::int(-1)));
        assert_eq!(scev.evolution_in(2, Operand::Var(t)), Some(Chrec::int(-1)));
        assert_eq!(scev.evolution_in(1, Operand::Var(u)), Some(Chrec::int(12)));
        assert!(scev.defined_in(t, 2) && scev.defined_in(t, 1));
        assert!(!scev.defined_in(i, 2));
    }

    #[test]
    fn test_invariants_and_unknowns() {
        let mut names = SymbolInterner::new();
        let mut b = IrBuilder::new(&mut names);
        let n = b.var("n");
        let nest = b.counted_loop("i", Operand::Const(0), CmpOp::Lt, n, 1, |b, i| {
            vec![b.load("x", "A", vec![i]), b.binary("q", BinOp::FloorDiv, i, Operand::Const(2))]
        });
        let scev = Scev::new(&nest);
        let n_sym = names.intern("n");
        assert_eq!(scev.analyze(Operand::Var(n_sym)), Chrec::symbol(n_sym));
        assert_eq!(scev.analyze(Operand::Var(names.intern("x"))), Chrec::Unknown);
        assert_eq!(scev.analyze(Operand::Var(names.intern("q"))), Chrec::Unknown);
        assert!(!scev.is_defined(n_sym));
    }
}
