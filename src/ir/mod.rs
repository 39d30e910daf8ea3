//! Loop-control intermediate representation.
//!
//! A small SSA-flavoured IR that is just rich enough to carry loop nests
//! through the pass:
//!
//! - a loop has header PHIs (entry value, latch value), an exit test
//!   evaluated at the header before every iteration, a body and exit PHIs
//!   copied once the loop is left;
//! - statements are three-address assignments and array stores.
//!
//! ```text
//! i = phi(0, i.next)        // header
//! while i < n {             // exit test
//!   A[i] = ...              // body
//!   i.next = i + 1          // increment
//! }
//! ```

pub mod interp;
pub mod printer;
pub mod scev;

use crate::chrec::LoopId;
use crate::utils::{Symbol, SymbolInterner};
use num_integer::Integer;
use serde::{Deserialize, Serialize};

pub use interp::{Interpreter, Store};
pub use printer::{print_loop, print_region};
pub use scev::Scev;

/// A constant or a named value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Const(i64),
    Var(Symbol),
}

impl Operand {
    pub fn as_var(&self) -> Option<Symbol> {
        match self {
            Operand::Var(s) => Some(*s),
            Operand::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<i64> {
        match self {
            Operand::Const(c) => Some(*c),
            Operand::Var(_) => None,
        }
    }

    pub fn uses(&self, sym: Symbol) -> bool {
        self.as_var() == Some(sym)
    }

    fn replace(&mut self, from: Symbol, to: Operand) {
        if self.uses(from) {
            *self = to;
        }
    }
}

impl From<Symbol> for Operand {
    fn from(s: Symbol) -> Self {
        Operand::Var(s)
    }
}

impl From<i64> for Operand {
    fn from(c: i64) -> Self {
        Operand::Const(c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Division rounding towards negative infinity
    FloorDiv,
    /// Division rounding towards positive infinity
    CeilDiv,
    Min,
    Max,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "/[floor]",
            BinOp::CeilDiv => "/[ceil]",
            BinOp::Min => "min",
            BinOp::Max => "max",
        }
    }

    /// `a op b`, or `None` on overflow or division by zero.
    pub fn fold(self, a: i64, b: i64) -> Option<i64> {
        match self {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::FloorDiv | BinOp::CeilDiv if b == 0 => None,
            BinOp::FloorDiv => Some(Integer::div_floor(&a, &b)),
            BinOp::CeilDiv => Some(Integer::div_ceil(&a, &b)),
            BinOp::Min => Some(a.min(b)),
            BinOp::Max => Some(a.max(b)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    Use(Operand),
    Binary(BinOp, Operand, Operand),
    Load { array: Symbol, index: Vec<Operand> },
}

impl Expr {
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Expr::Use(a) => vec![*a],
            Expr::Binary(_, a, b) => vec![*a, *b],
            Expr::Load { index, .. } => index.clone(),
        }
    }

    fn replace(&mut self, from: Symbol, to: Operand) {
        match self {
            Expr::Use(a) => a.replace(from, to),
            Expr::Binary(_, a, b) => {
                a.replace(from, to);
                b.replace(from, to);
            }
            Expr::Load { index, .. } => index.iter_mut().for_each(|o| o.replace(from, to)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stmt {
    Assign { dest: Symbol, expr: Expr },
    Store { array: Symbol, index: Vec<Operand>, value: Operand },
}

impl Stmt {
    pub fn assign(dest: Symbol, expr: Expr) -> Self {
        Stmt::Assign { dest, expr }
    }

    pub fn binary(dest: Symbol, op: BinOp, a: impl Into<Operand>, b: impl Into<Operand>) -> Self {
        Stmt::Assign { dest, expr: Expr::Binary(op, a.into(), b.into()) }
    }

    pub fn dest(&self) -> Option<Symbol> {
        match self {
            Stmt::Assign { dest, .. } => Some(*dest),
            Stmt::Store { .. } => None,
        }
    }

    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Stmt::Assign { expr, .. } => expr.operands(),
            Stmt::Store { index, value, .. } => {
                let mut ops = index.clone();
                ops.push(*value);
                ops
            }
        }
    }

    pub fn uses(&self, sym: Symbol) -> bool {
        self.operands().iter().any(|o| o.uses(sym))
    }

    /// Arrays read or written, with `true` for a write.
    pub fn memory_accesses(&self) -> Vec<(Symbol, bool)> {
        match self {
            Stmt::Assign { expr: Expr::Load { array, .. }, .. } => vec![(*array, false)],
            Stmt::Assign { .. } => Vec::new(),
            Stmt::Store { array, .. } => vec![(*array, true)],
        }
    }

    pub fn replace_uses(&mut self, from: Symbol, to: Operand) {
        match self {
            Stmt::Assign { expr, .. } => expr.replace(from, to),
            Stmt::Store { index, value, .. } => {
                index.iter_mut().for_each(|o| o.replace(from, to));
                value.replace(from, to);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhiArg {
    pub value: Operand,
    /// Whether the value flows in over the back edge
    pub from_latch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phi {
    pub result: Symbol,
    pub args: Vec<PhiArg>,
}

impl Phi {
    /// A header PHI with one entry and one latch argument.
    pub fn header(result: Symbol, entry: impl Into<Operand>, latch: impl Into<Operand>) -> Self {
        Self {
            result,
            args: vec![
                PhiArg { value: entry.into(), from_latch: false },
                PhiArg { value: latch.into(), from_latch: true },
            ],
        }
    }

    /// An exit PHI copying `value` out of the loop.
    pub fn copy(result: Symbol, value: impl Into<Operand>) -> Self {
        Self { result, args: vec![PhiArg { value: value.into(), from_latch: false }] }
    }

    pub fn entry(&self) -> Option<Operand> {
        self.args.iter().find(|a| !a.from_latch).map(|a| a.value)
    }

    pub fn latch(&self) -> Option<Operand> {
        self.args.iter().find(|a| a.from_latch).map(|a| a.value)
    }

    pub fn uses(&self, sym: Symbol) -> bool {
        self.args.iter().any(|a| a.value.uses(sym))
    }

    fn replace_uses(&mut self, from: Symbol, to: Operand) {
        self.args.iter_mut().for_each(|a| a.value.replace(from, to));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    Eq,
}

impl CmpOp {
    /// The comparison with its operands exchanged: `a < b` is `b > a`.
    pub fn mirror(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Eq => CmpOp::Eq,
        }
    }

    pub fn holds(self, a: i64, b: i64) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Ne => a != b,
            CmpOp::Eq => a == b,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Ne => "!=",
            CmpOp::Eq => "==",
        }
    }
}

/// Loop continuation condition, checked at the header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExitTest {
    pub op: CmpOp,
    pub lhs: Operand,
    pub rhs: Operand,
}

impl ExitTest {
    pub fn uses(&self, sym: Symbol) -> bool {
        self.lhs.uses(sym) || self.rhs.uses(sym)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoopNode {
    pub id: LoopId,
    pub phis: Vec<Phi>,
    pub test: Option<ExitTest>,
    pub body: Vec<Node>,
    pub exit_phis: Vec<Phi>,
}

impl LoopNode {
    /// Loops directly inside the body.
    pub fn inner_loops(&self) -> impl Iterator<Item = &LoopNode> {
        self.body.iter().filter_map(|n| match n {
            Node::Loop(l) => Some(l),
            Node::Stmt(_) => None,
        })
    }

    /// The single loop directly inside the body, if there is exactly one.
    pub fn only_inner_loop(&self) -> Option<&LoopNode> {
        let mut inner = self.inner_loops();
        let first = inner.next()?;
        inner.next().is_none().then_some(first)
    }

    pub fn only_inner_loop_mut(&mut self) -> Option<&mut LoopNode> {
        if self.inner_loops().count() != 1 {
            return None;
        }
        self.body.iter_mut().find_map(|n| match n {
            Node::Loop(l) => Some(l),
            Node::Stmt(_) => None,
        })
    }

    pub fn statements(&self) -> impl Iterator<Item = &Stmt> {
        self.body.iter().filter_map(|n| match n {
            Node::Stmt(s) => Some(s),
            Node::Loop(_) => None,
        })
    }

    pub fn header_phi(&self, sym: Symbol) -> Option<&Phi> {
        self.phis.iter().find(|p| p.result == sym)
    }

    /// Depth of the loop tree rooted here, following the first inner loop.
    pub fn depth(&self) -> usize {
        1 + self.inner_loops().next().map_or(0, |l| l.depth())
    }

    /// Whether any phi, statement, test or exit phi in this loop (or its
    /// inner loops) reads `sym`.
    pub fn uses(&self, sym: Symbol) -> bool {
        self.phis.iter().any(|p| p.uses(sym))
            || self.test.as_ref().is_some_and(|t| t.uses(sym))
            || self.exit_phis.iter().any(|p| p.uses(sym))
            || self.body.iter().any(|n| n.uses(sym))
    }

    /// Every symbol defined in this loop and its inner loops.
    pub fn definitions(&self) -> Vec<Symbol> {
        let mut defs: Vec<Symbol> = self.phis.iter().map(|p| p.result).collect();
        for n in &self.body {
            match n {
                Node::Stmt(s) => defs.extend(s.dest()),
                Node::Loop(l) => defs.extend(l.definitions()),
            }
        }
        defs.extend(self.exit_phis.iter().map(|p| p.result));
        defs
    }

    /// Arrays accessed in this loop and its inner loops, `true` for writes.
    pub fn memory_accesses(&self) -> Vec<(Symbol, bool)> {
        self.body.iter().flat_map(|n| n.memory_accesses()).collect()
    }

    pub fn replace_uses(&mut self, from: Symbol, to: Operand) {
        self.phis.iter_mut().for_each(|p| p.replace_uses(from, to));
        if let Some(t) = &mut self.test {
            t.lhs.replace(from, to);
            t.rhs.replace(from, to);
        }
        self.body.iter_mut().for_each(|n| n.replace_uses(from, to));
        self.exit_phis.iter_mut().for_each(|p| p.replace_uses(from, to));
    }

    pub fn max_loop_id(&self) -> LoopId {
        self.inner_loops().map(|l| l.max_loop_id()).fold(self.id, LoopId::max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    Stmt(Stmt),
    Loop(LoopNode),
}

impl Node {
    pub fn uses(&self, sym: Symbol) -> bool {
        match self {
            Node::Stmt(s) => s.uses(sym),
            Node::Loop(l) => l.uses(sym),
        }
    }

    fn memory_accesses(&self) -> Vec<(Symbol, bool)> {
        match self {
            Node::Stmt(s) => s.memory_accesses(),
            Node::Loop(l) => l.memory_accesses(),
        }
    }

    fn replace_uses(&mut self, from: Symbol, to: Operand) {
        match self {
            Node::Stmt(s) => s.replace_uses(from, to),
            Node::Loop(l) => l.replace_uses(from, to),
        }
    }
}

/// A straight-line sequence of statements and loops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub nodes: Vec<Node>,
}

impl Region {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn max_loop_id(&self) -> LoopId {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Loop(l) => Some(l.max_loop_id()),
                Node::Stmt(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}

/// Convenience constructor for IR, numbering loops in preorder so that
/// inner loops get larger ids.
pub struct IrBuilder<'a> {
    names: &'a mut SymbolInterner,
    next_loop: LoopId,
}

impl<'a> IrBuilder<'a> {
    pub fn new(names: &'a mut SymbolInterner) -> Self {
        Self { names, next_loop: 1 }
    }

    pub fn sym(&mut self, name: &str) -> Symbol {
        self.names.intern(name)
    }

    pub fn var(&mut self, name: &str) -> Operand {
        Operand::Var(self.sym(name))
    }

    /// `dest = a op b`
    pub fn binary(&mut self, dest: &str, op: BinOp, a: Operand, b: Operand) -> Node {
        let dest = self.sym(dest);
        Node::Stmt(Stmt::binary(dest, op, a, b))
    }

    /// `dest = array[index]`
    pub fn load(&mut self, dest: &str, array: &str, index: Vec<Operand>) -> Node {
        let dest = self.sym(dest);
        let array = self.sym(array);
        Node::Stmt(Stmt::assign(dest, Expr::Load { array, index }))
    }

    /// `array[index] = value`
    pub fn store(&mut self, array: &str, index: Vec<Operand>, value: Operand) -> Node {
        let array = self.sym(array);
        Node::Stmt(Stmt::Store { array, index, value })
    }

    /// A counted loop `for (iv = init; iv op bound; iv += step)`.
    ///
    /// `body` receives the induction variable; the increment `iv.next`
    /// is appended after the body.
    pub fn counted_loop(
        &mut self,
        iv: &str,
        init: Operand,
        op: CmpOp,
        bound: Operand,
        step: i64,
        body: impl FnOnce(&mut Self, Operand) -> Vec<Node>,
    ) -> LoopNode {
        let id = self.next_loop;
        self.next_loop += 1;
        let iv_sym = self.sym(iv);
        let next = self.sym(&format!("{}.next", iv));
        let mut nodes = body(self, Operand::Var(iv_sym));
        nodes.push(Node::Stmt(Stmt::binary(next, BinOp::Add, iv_sym, step)));
        LoopNode {
            id,
            phis: vec![Phi::header(iv_sym, init, next)],
            test: Some(ExitTest { op, lhs: Operand::Var(iv_sym), rhs: bound }),
            body: nodes,
            exit_phis: Vec::new(),
        }
    }
}
