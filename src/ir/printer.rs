//! Textual dump of the loop IR.
//!
//! ```text
//! loop 1 {
//!   i = phi(0, latch i.next)
//!   while i < n
//!   A[i] = t
//!   i.next = i + 1
//! }
//! ```

use super::{BinOp, Expr, LoopNode, Node, Operand, Phi, Region, Stmt};
use crate::utils::pretty::{format_list, CodeFormatter};
use crate::utils::SymbolInterner;

struct Printer<'a> {
    names: &'a SymbolInterner,
    out: CodeFormatter,
}

impl<'a> Printer<'a> {
    fn operand(&self, op: &Operand) -> String {
        match op {
            Operand::Const(c) => c.to_string(),
            Operand::Var(s) => self.names.name(*s),
        }
    }

    fn index(&self, index: &[Operand]) -> String {
        index.iter().map(|o| format!("[{}]", self.operand(o))).collect()
    }

    fn phi(&self, phi: &Phi) -> String {
        let args: Vec<String> = phi
            .args
            .iter()
            .map(|a| {
                let v = self.operand(&a.value);
                if a.from_latch {
                    format!("latch {}", v)
                } else {
                    v
                }
            })
            .collect();
        format!("{} = phi({})", self.names.name(phi.result), format_list(&args, ", "))
    }

    fn stmt(&mut self, s: &Stmt) {
        let line = match s {
            Stmt::Assign { dest, expr } => {
                let rhs = match expr {
                    Expr::Use(a) => self.operand(a),
                    Expr::Binary(op @ (BinOp::Min | BinOp::Max), a, b) => {
                        format!("{}({}, {})", op.symbol(), self.operand(a), self.operand(b))
                    }
                    Expr::Binary(op, a, b) => format!("{} {} {}", self.operand(a), op.symbol(), self.operand(b)),
                    Expr::Load { array, index } => format!("{}{}", self.names.name(*array), self.index(index)),
                };
                format!("{} = {}", self.names.name(*dest), rhs)
            }
            Stmt::Store { array, index, value } => {
                format!("{}{} = {}", self.names.name(*array), self.index(index), self.operand(value))
            }
        };
        self.out.line(line);
    }

    fn nodes(&mut self, nodes: &[Node]) {
        for n in nodes {
            match n {
                Node::Stmt(s) => self.stmt(s),
                Node::Loop(l) => self.loop_node(l),
            }
        }
    }

    fn loop_node(&mut self, l: &LoopNode) {
        self.out.open(format_args!("loop {}", l.id));
        for phi in &l.phis {
            let line = self.phi(phi);
            self.out.line(line);
        }
        let test = match &l.test {
            Some(t) => format!("while {} {} {}", self.operand(&t.lhs), t.op.symbol(), self.operand(&t.rhs)),
            None => "while ?".to_string(),
        };
        self.out.line(test);
        self.nodes(&l.body);
        self.out.close();
        for phi in &l.exit_phis {
            let line = self.phi(phi);
            self.out.line(line);
        }
    }
}

pub fn print_loop(l: &LoopNode, names: &SymbolInterner) -> String {
    let mut p = Printer { names, out: CodeFormatter::default() };
    p.loop_node(l);
    p.out.finish()
}

pub fn print_region(region: &Region, names: &SymbolInterner) -> String {
    let mut p = Printer { names, out: CodeFormatter::default() };
    p.nodes(&region.nodes);
    p.out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CmpOp, IrBuilder};

    #[test]
    fn test_print_loop() {
        let mut names = SymbolInterner::new();
        let mut b = IrBuilder::new(&mut names);
        let n = b.var("n");
        let nest = b.counted_loop("i", Operand::Const(0), CmpOp::Lt, n, 1, |b, i| {
            vec![b.load("t", "B", vec![i]), b.binary("u", BinOp::Max, i, Operand::Const(2))]
        });
        let text = print_loop(&nest, &names);
        let expected = "loop 1 {\n  i = phi(0, latch i.next)\n  while i < n\n  t = B[i]\n  u = max(i, 2)\n  i.next = i + 1\n}\n";
        assert_eq!(text, expected);
    }
}
