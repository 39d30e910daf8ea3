//! Lowering of linear bound expressions to three-address statements.

use crate::context::CompilationContext;
use crate::ir::{BinOp, Expr, Operand, Stmt};
use crate::lambda::LinearExpression;
use crate::utils::{CodegenError, CodegenErrorKind, LambdaResult, Symbol};

/// How a division by the denominator rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Floor,
    Ceil,
}

impl Rounding {
    fn op(self) -> BinOp {
        match self {
            Rounding::Floor => BinOp::FloorDiv,
            Rounding::Ceil => BinOp::CeilDiv,
        }
    }
}

/// Accumulates the statements that compute a set of values, naming every
/// intermediate with a fresh temporary.
pub struct StatementBuilder<'c> {
    ctx: &'c mut CompilationContext,
    stmts: Vec<Stmt>,
}

impl<'c> StatementBuilder<'c> {
    pub fn new(ctx: &'c mut CompilationContext) -> Self {
        Self { ctx, stmts: Vec::new() }
    }

    pub fn finish(self) -> Vec<Stmt> {
        self.stmts
    }

    /// `a op b`, folded when the result is known without a statement.
    pub fn binary(&mut self, op: BinOp, a: Operand, b: Operand) -> Operand {
        if let (Operand::Const(x), Operand::Const(y)) = (a, b) {
            if let Some(v) = op.fold(x, y) {
                return Operand::Const(v);
            }
        }
        match (op, a, b) {
            (BinOp::Add, Operand::Const(0), x)
            | (BinOp::Add | BinOp::Sub, x, Operand::Const(0))
            | (BinOp::Mul, Operand::Const(1), x)
            | (BinOp::Mul | BinOp::FloorDiv | BinOp::CeilDiv, x, Operand::Const(1)) => return x,
            (BinOp::Min | BinOp::Max, x, y) if x == y => return x,
            _ => {}
        }
        let dest = self.ctx.fresh_symbol("lnt");
        self.stmts.push(Stmt::binary(dest, op, a, b));
        Operand::Var(dest)
    }

    /// `dest = value`
    pub fn assign(&mut self, dest: Symbol, value: Operand) {
        self.stmts.push(Stmt::assign(dest, Expr::Use(value)));
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    /// Combine `values` with `op` (`Min` or `Max`).
    pub fn reduce(&mut self, op: BinOp, values: Vec<Operand>) -> Option<Operand> {
        values.into_iter().reduce(|acc, v| self.binary(op, acc, v))
    }

    /// Compute `e` with `ivs` and `invariants` standing for its variables.
    pub fn linear(
        &mut self,
        e: &LinearExpression,
        ivs: &[Operand],
        invariants: &[Operand],
        rounding: Rounding,
    ) -> LambdaResult<Operand> {
        if e.depth() > ivs.len() || e.invariant_count() > invariants.len() {
            return Err(CodegenError::new(
                CodegenErrorKind::NestMismatch,
                format!("expression over {} loops and {} invariants", e.depth(), e.invariant_count()),
            )
            .into());
        }
        if e.denominator <= 0 {
            return Err(CodegenError::new(
                CodegenErrorKind::BoundGeneration,
                format!("denominator {} is not positive", e.denominator),
            )
            .into());
        }

        let terms = e
            .coefficients
            .iter()
            .zip(ivs)
            .chain(e.invariant_coefficients.iter().zip(invariants))
            .filter(|(&c, _)| c != 0);
        let mut acc: Option<Operand> = None;
        for (&c, &v) in terms {
            acc = Some(match acc {
                None => self.binary(BinOp::Mul, v, Operand::Const(c)),
                Some(a) if c < 0 && c != i64::MIN => {
                    let term = self.binary(BinOp::Mul, v, Operand::Const(-c));
                    self.binary(BinOp::Sub, a, term)
                }
                Some(a) => {
                    let term = self.binary(BinOp::Mul, v, Operand::Const(c));
                    self.binary(BinOp::Add, a, term)
                }
            });
        }
        let sum = match acc {
            None => Operand::Const(e.constant),
            Some(a) if e.constant < 0 && e.constant != i64::MIN => self.binary(BinOp::Sub, a, Operand::Const(-e.constant)),
            Some(a) => self.binary(BinOp::Add, a, Operand::Const(e.constant)),
        };
        Ok(self.binary(rounding.op(), sum, Operand::Const(e.denominator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Interpreter, Node, Region, Store};

    #[test]
    fn test_constants_fold() {
        let mut ctx = CompilationContext::default();
        let x = Operand::Var(ctx.intern("x"));
        let mut b = StatementBuilder::new(&mut ctx);
        let e = LinearExpression { constant: 7, denominator: 2, ..LinearExpression::zero(1, 0) };
        assert_eq!(b.linear(&e, &[x], &[], Rounding::Floor).unwrap(), Operand::Const(3));
        assert_eq!(b.linear(&e, &[x], &[], Rounding::Ceil).unwrap(), Operand::Const(4));
        assert_eq!(b.reduce(BinOp::Max, vec![Operand::Const(1), Operand::Const(5)]), Some(Operand::Const(5)));
        assert!(b.finish().is_empty());
    }

    #[test]
    fn test_linear_values() {
        let mut ctx = CompilationContext::default();
        let i = ctx.intern("i");
        let n = ctx.intern("n");
        let r = ctx.intern("r");
        // (2i - n + 1) / 3
        let e = LinearExpression {
            coefficients: vec![2],
            invariant_coefficients: vec![-1],
            constant: 1,
            denominator: 3,
        };
        let mut b = StatementBuilder::new(&mut ctx);
        let v = b.linear(&e, &[Operand::Var(i)], &[Operand::Var(n)], Rounding::Floor).unwrap();
        b.assign(r, v);
        let stmts = b.finish();
        assert_eq!(stmts.len(), 5);

        let region = Region::new(stmts.into_iter().map(Node::Stmt).collect());
        for (iv, nv) in [(4, 1), (0, 5), (-3, 2)] {
            let mut store = Store::with_scalars([(i, iv), (n, nv)]);
            Interpreter::new(&ctx.interner).run_region(&region, &mut store).unwrap();
            assert_eq!(store.get(r), Some(e.floor_at(&[iv], &[nv])));
        }
    }

    #[test]
    fn test_rejects_short_operands() {
        let mut ctx = CompilationContext::default();
        let mut b = StatementBuilder::new(&mut ctx);
        assert!(b.linear(&LinearExpression::var(1, 2, 0), &[Operand::Const(0)], &[], Rounding::Floor).is_err());
    }
}
