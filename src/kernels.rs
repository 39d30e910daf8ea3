//! Small loop nests that exercise the pass.
//!
//! Every kernel reads the loop invariants `n` and `m` and only writes
//! arrays, so two runs can be compared through the final memory state.

use crate::ir::{BinOp, CmpOp, IrBuilder, Node, Operand, Region};
use crate::utils::SymbolInterner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// `A[j][i] = B[j][i] + i`, walking arrays along the wrong dimension
    Interchange,
    /// `A[i][j] = A[i][j - 1] + 1`, reuse already carried innermost
    Carried,
    /// `A[i][j] = A[i - 1][j + 1] + 1`, distance `(1, -1)`
    Skew,
    /// `A[j][i] = 2i + j` with `i` counting down
    Reverse,
    /// `A[j][i] = i + j` followed by `B[i] = i` in the outer body
    Imperfect,
}

impl Kernel {
    pub const ALL: [Kernel; 5] = [Kernel::Interchange, Kernel::Carried, Kernel::Skew, Kernel::Reverse, Kernel::Imperfect];

    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Interchange => "interchange",
            Kernel::Carried => "carried",
            Kernel::Skew => "skew",
            Kernel::Reverse => "reverse",
            Kernel::Imperfect => "imperfect",
        }
    }

    /// Build the kernel as a region of its own.
    pub fn build(&self, names: &mut SymbolInterner) -> Region {
        let mut b = IrBuilder::new(names);
        let n = b.var("n");
        let m = b.var("m");
        let zero = Operand::Const(0);
        let one = Operand::Const(1);
        match self {
            Kernel::Interchange => {
                let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, move |b, i| {
                    let inner = b.counted_loop("j", zero, CmpOp::Lt, m, 1, |b, j| {
                        let (t, u) = (b.var("t"), b.var("u"));
                        vec![
                            b.load("t", "B", vec![j, i]),
                            b.binary("u", BinOp::Add, t, i),
                            b.store("A", vec![j, i], u),
                        ]
                    });
                    vec![Node::Loop(inner)]
                });
                Region::new(vec![Node::Loop(nest)])
            }
            Kernel::Carried => {
                let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, move |b, i| {
                    let inner = b.counted_loop("j", one, CmpOp::Lt, m, 1, |b, j| {
                        let (jm, t, u) = (b.var("jm"), b.var("t"), b.var("u"));
                        vec![
                            b.binary("jm", BinOp::Sub, j, one),
                            b.load("t", "A", vec![i, jm]),
                            b.binary("u", BinOp::Add, t, one),
                            b.store("A", vec![i, j], u),
                        ]
                    });
                    vec![Node::Loop(inner)]
                });
                Region::new(vec![Node::Loop(nest)])
            }
            Kernel::Skew => {
                let nest = b.counted_loop("i", one, CmpOp::Lt, n, 1, move |b, i| {
                    let inner = b.counted_loop("j", zero, CmpOp::Lt, m, 1, |b, j| {
                        let (ip, jp, t, u) = (b.var("ip"), b.var("jp"), b.var("t"), b.var("u"));
                        vec![
                            b.binary("ip", BinOp::Sub, i, one),
                            b.binary("jp", BinOp::Add, j, one),
                            b.load("t", "A", vec![ip, jp]),
                            b.binary("u", BinOp::Add, t, one),
                            b.store("A", vec![i, j], u),
                        ]
                    });
                    vec![Node::Loop(inner)]
                });
                Region::new(vec![Node::Loop(nest)])
            }
            Kernel::Reverse => {
                let last = b.var("n.last");
                let init = b.binary("n.last", BinOp::Sub, n, one);
                let nest = b.counted_loop("i", last, CmpOp::Ge, zero, -1, move |b, i| {
                    let inner = b.counted_loop("j", zero, CmpOp::Lt, m, 1, |b, j| {
                        let (t, u) = (b.var("t"), b.var("u"));
                        vec![
                            b.binary("t", BinOp::Mul, i, Operand::Const(2)),
                            b.binary("u", BinOp::Add, t, j),
                            b.store("A", vec![j, i], u),
                        ]
                    });
                    vec![Node::Loop(inner)]
                });
                Region::new(vec![init, Node::Loop(nest)])
            }
            Kernel::Imperfect => {
                let nest = b.counted_loop("i", zero, CmpOp::Lt, n, 1, move |b, i| {
                    let inner = b.counted_loop("j", zero, CmpOp::Lt, m, 1, |b, j| {
                        let t = b.var("t");
                        vec![b.binary("t", BinOp::Add, i, j), b.store("A", vec![j, i], t)]
                    });
                    vec![Node::Loop(inner), b.store("B", vec![i], i)]
                });
                Region::new(vec![Node::Loop(nest)])
            }
        }
    }
}
