//! Reference interpreter for the loop IR.
//!
//! Used to check that a transformed region computes the same memory state
//! as the original one. Array elements that were never written read as 0.

use super::{BinOp, Expr, LoopNode, Node, Operand, Region, Stmt};
use crate::utils::{Symbol, SymbolInterner};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::{BTreeMap, HashMap};

/// Scalar values and array memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    pub scalars: HashMap<Symbol, i64>,
    pub arrays: BTreeMap<(Symbol, Vec<i64>), i64>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scalars(values: impl IntoIterator<Item = (Symbol, i64)>) -> Self {
        Self { scalars: values.into_iter().collect(), arrays: BTreeMap::new() }
    }

    pub fn set(&mut self, sym: Symbol, value: i64) {
        self.scalars.insert(sym, value);
    }

    pub fn get(&self, sym: Symbol) -> Option<i64> {
        self.scalars.get(&sym).copied()
    }

    pub fn load(&self, array: Symbol, index: &[i64]) -> i64 {
        self.arrays.get(&(array, index.to_vec())).copied().unwrap_or(0)
    }

    pub fn store(&mut self, array: Symbol, index: Vec<i64>, value: i64) {
        self.arrays.insert((array, index), value);
    }
}

/// Executes regions against a [`Store`], giving up after `fuel` loop
/// iterations.
pub struct Interpreter<'a> {
    names: &'a SymbolInterner,
    fuel: u64,
}

impl<'a> Interpreter<'a> {
    pub const DEFAULT_FUEL: u64 = 1_000_000;

    pub fn new(names: &'a SymbolInterner) -> Self {
        Self { names, fuel: Self::DEFAULT_FUEL }
    }

    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn run_region(&mut self, region: &Region, store: &mut Store) -> Result<()> {
        self.run_nodes(&region.nodes, store)
    }

    pub fn run_loop(&mut self, l: &LoopNode, store: &mut Store) -> Result<()> {
        let test = l.test.as_ref().ok_or_else(|| anyhow!("loop {} has no exit test", l.id))?;

        let entry = self.phi_values(l, false, store)?;
        entry.into_iter().for_each(|(s, v)| store.set(s, v));
        loop {
            if self.fuel == 0 {
                bail!("out of fuel in loop {}", l.id);
            }
            self.fuel -= 1;
            let lhs = self.operand(test.lhs, store)?;
            let rhs = self.operand(test.rhs, store)?;
            if !test.op.holds(lhs, rhs) {
                break;
            }
            self.run_nodes(&l.body, store).with_context(|| format!("in loop {}", l.id))?;
            // all header PHIs take their latch values at once
            let latch = self.phi_values(l, true, store)?;
            latch.into_iter().for_each(|(s, v)| store.set(s, v));
        }

        for phi in &l.exit_phis {
            let arg = phi.args.first().ok_or_else(|| anyhow!("empty exit phi in loop {}", l.id))?;
            let v = self.operand(arg.value, store)?;
            store.set(phi.result, v);
        }
        Ok(())
    }

    fn phi_values(&self, l: &LoopNode, latch: bool, store: &Store) -> Result<Vec<(Symbol, i64)>> {
        let mut values = Vec::with_capacity(l.phis.len());
        for phi in &l.phis {
            let arg = if latch { phi.latch() } else { phi.entry() };
            if let Some(op) = arg {
                values.push((phi.result, self.operand(op, store)?));
            }
        }
        Ok(values)
    }

    fn run_nodes(&mut self, nodes: &[Node], store: &mut Store) -> Result<()> {
        for n in nodes {
            match n {
                Node::Stmt(s) => self.run_stmt(s, store)?,
                Node::Loop(l) => self.run_loop(l, store)?,
            }
        }
        Ok(())
    }

    fn run_stmt(&self, s: &Stmt, store: &mut Store) -> Result<()> {
        match s {
            Stmt::Assign { dest, expr } => {
                let v = self.expr(expr, store)?;
                store.set(*dest, v);
            }
            Stmt::Store { array, index, value } => {
                let index = self.operands(index, store)?;
                let v = self.operand(*value, store)?;
                store.store(*array, index, v);
            }
        }
        Ok(())
    }

    fn expr(&self, e: &Expr, store: &Store) -> Result<i64> {
        match e {
            Expr::Use(a) => self.operand(*a, store),
            Expr::Binary(op, a, b) => {
                let a = self.operand(*a, store)?;
                let b = self.operand(*b, store)?;
                binary(*op, a, b)
            }
            Expr::Load { array, index } => Ok(store.load(*array, &self.operands(index, store)?)),
        }
    }

    fn operands(&self, ops: &[Operand], store: &Store) -> Result<Vec<i64>> {
        ops.iter().map(|&o| self.operand(o, store)).collect()
    }

    fn operand(&self, op: Operand, store: &Store) -> Result<i64> {
        match op {
            Operand::Const(c) => Ok(c),
            Operand::Var(s) => store.get(s).ok_or_else(|| anyhow!("unbound variable `{}`", self.names.name(s))),
        }
    }
}

fn binary(op: BinOp, a: i64, b: i64) -> Result<i64> {
    if matches!(op, BinOp::FloorDiv | BinOp::CeilDiv) && b == 0 {
        bail!("division by zero");
    }
    op.fold(a, b).ok_or_else(|| anyhow!("overflow in {} {} {}", a, op.symbol(), b))
}
