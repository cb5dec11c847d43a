// SPDX-License-Identifier: Apache-2.0

//! Per-bit BDD abstraction of an IR function.
//!
//! Every bits-typed node gets one BDD reference per output bit (LSb-first),
//! computed with the abstract evaluator instantiated over BDD nodes. Ops
//! outside the evaluator's reach (arithmetic, shifts, aggregates, params)
//! introduce fresh variables per bit, which soundly models "nothing is
//! known".

use std::collections::HashMap;

use bdd_rs::bdd::Bdd;
use bdd_rs::reference::Ref;

use crate::abstract_eval::AbstractEvaluator;
use crate::ir::{Binop, Fn, NaryOp, Node, NodePayload, NodeRef, Type, Unop};
use crate::ir_utils::get_topological;
use crate::value::IrValue;

/// Classification of a single output bit's BDD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownBit {
    Zero,
    One,
    Unknown,
}

/// Instantiates the abstract per-bit evaluator over BDD references.
struct BddEval<'a> {
    bdd: &'a Bdd,
}

impl AbstractEvaluator for BddEval<'_> {
    type Elem = Ref;

    fn one(&self) -> Ref {
        self.bdd.one()
    }

    fn zero(&self) -> Ref {
        self.bdd.zero()
    }

    fn not(&self, a: &Ref) -> Ref {
        -*a
    }

    fn and(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_and(*a, *b)
    }

    fn or(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_or(*a, *b)
    }
}

pub struct BddEngine {
    bdd: Bdd,
    next_var: u32,
    bits: HashMap<NodeRef, Vec<Ref>>,
}

impl BddEngine {
    /// Computes BDD bits for every bits-typed node of `f`.
    pub fn build(f: &Fn) -> Self {
        let mut engine = BddEngine {
            bdd: Bdd::default(),
            next_var: 1,
            bits: HashMap::new(),
        };
        for nr in get_topological(f) {
            engine.compute_node(f, nr);
        }
        engine
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    /// The BDD references for the node's output bits, LSb-first. `None` for
    /// non-bits-typed nodes.
    pub fn node_bits(&self, nr: NodeRef) -> Option<&[Ref]> {
        self.bits.get(&nr).map(|v| v.as_slice())
    }

    pub fn known(&self, r: Ref) -> KnownBit {
        if self.bdd.is_zero(r) {
            KnownBit::Zero
        } else if self.bdd.is_one(r) {
            KnownBit::One
        } else {
            KnownBit::Unknown
        }
    }

    pub fn known_bits(&self, nr: NodeRef) -> Option<Vec<KnownBit>> {
        self.node_bits(nr)
            .map(|bits| bits.iter().map(|r| self.known(*r)).collect())
    }

    /// Whether the conjunction of two bit functions is unsatisfiable.
    pub fn and_is_zero(&self, a: Ref, b: Ref) -> bool {
        self.bdd.is_zero(self.bdd.apply_and(a, b))
    }

    /// Whether at most one of the given bits can be set at a time.
    pub fn pairwise_disjoint(&self, bits: &[Ref]) -> bool {
        for (i, a) in bits.iter().enumerate() {
            for b in bits.iter().skip(i + 1) {
                if !self.and_is_zero(*a, *b) {
                    return false;
                }
            }
        }
        true
    }

    /// Whether the disjunction of the given bits is a tautology.
    pub fn or_is_one(&self, bits: &[Ref]) -> bool {
        let mut accum = self.bdd.zero();
        for b in bits.iter() {
            accum = self.bdd.apply_or(accum, *b);
        }
        self.bdd.is_one(accum)
    }

    fn fresh_bits(&mut self, width: usize) -> Vec<Ref> {
        (0..width)
            .map(|_| {
                let v = self.next_var;
                self.next_var += 1;
                self.bdd.mk_var(v)
            })
            .collect()
    }

    fn compute_node(&mut self, f: &Fn, nr: NodeRef) {
        let node = f.get_node(nr);
        let width = match node.ty {
            Type::Bits(w) => w,
            _ => return,
        };
        let computed = match self.try_compute(node, width) {
            Some(bits) => bits,
            None => self.fresh_bits(width),
        };
        assert_eq!(computed.len(), width, "bit width mismatch for {:?}", nr);
        self.bits.insert(nr, computed);
    }

    /// Evaluates the node's bits when the op is expressible via per-bit
    /// logic over already-computed operand bits; `None` means "opaque".
    fn try_compute(&self, node: &Node, width: usize) -> Option<Vec<Ref>> {
        let eval = BddEval { bdd: &self.bdd };
        let operand_bits = |nr: NodeRef| -> Option<&Vec<Ref>> { self.bits.get(&nr) };

        match &node.payload {
            NodePayload::Literal(IrValue::Bits(b)) => Some(eval.literal_bits(b)),
            NodePayload::Unop(op, a) => {
                let a = operand_bits(*a)?;
                match op {
                    Unop::Not => Some(eval.bitwise_not(a)),
                    Unop::Identity => Some(a.clone()),
                    Unop::Reverse => Some(eval.reverse(a)),
                    Unop::OrReduce => Some(vec![eval.or_reduce(a)]),
                    Unop::AndReduce => Some(vec![eval.and_reduce(a)]),
                    Unop::XorReduce => Some(vec![eval.xor_reduce(a)]),
                    Unop::Neg => None,
                }
            }
            NodePayload::Binop(op, a, b) => {
                let a = operand_bits(*a)?;
                let b = operand_bits(*b)?;
                if a.len() != b.len() {
                    return None;
                }
                let bit = match op {
                    Binop::Eq => eval.eq(a, b),
                    Binop::Ne => eval.ne(a, b),
                    Binop::Ult => eval.ult(a, b),
                    Binop::Ule => eval.ule(a, b),
                    Binop::Ugt => eval.ugt(a, b),
                    Binop::Uge => eval.uge(a, b),
                    Binop::Slt => eval.slt(a, b),
                    Binop::Sle => eval.sle(a, b),
                    Binop::Sgt => eval.sgt(a, b),
                    Binop::Sge => eval.sge(a, b),
                    _ => return None,
                };
                Some(vec![bit])
            }
            NodePayload::Nary(op, elems) => {
                let elem_bits: Vec<&Vec<Ref>> = elems
                    .iter()
                    .map(|e| operand_bits(*e))
                    .collect::<Option<_>>()?;
                if matches!(op, NaryOp::Concat) {
                    // Operand 0 is the MSb, so its bits land last in the
                    // LSb-first result.
                    let mut out = Vec::with_capacity(width);
                    for e in elem_bits.iter().rev() {
                        out.extend(e.iter().copied());
                    }
                    return Some(out);
                }
                let mut accum = elem_bits[0].clone();
                for e in &elem_bits[1..] {
                    accum = match op {
                        NaryOp::And | NaryOp::Nand => eval.bitwise_and(&accum, e),
                        NaryOp::Or | NaryOp::Nor => eval.bitwise_or(&accum, e),
                        NaryOp::Xor => eval.bitwise_xor(&accum, e),
                        NaryOp::Concat => unreachable!(),
                    };
                }
                if matches!(op, NaryOp::Nand | NaryOp::Nor) {
                    accum = eval.bitwise_not(&accum);
                }
                Some(accum)
            }
            NodePayload::BitSlice { arg, start, width } => {
                let a = operand_bits(*arg)?;
                Some(a[*start..*start + *width].to_vec())
            }
            NodePayload::ZeroExt { arg, .. } => {
                let a = operand_bits(*arg)?;
                let mut out = a.clone();
                out.resize(width, eval.zero());
                Some(out)
            }
            NodePayload::SignExt { arg, .. } => {
                let a = operand_bits(*arg)?;
                if a.is_empty() {
                    return None;
                }
                let mut out = a.clone();
                let msb = *out.last().unwrap();
                out.resize(width, msb);
                Some(out)
            }
            NodePayload::OneHot { arg, lsb_prio } => {
                let a = operand_bits(*arg)?;
                Some(eval.one_hot(a, *lsb_prio))
            }
            NodePayload::Encode { arg } => {
                let a = operand_bits(*arg)?;
                Some(eval.encode(a, width))
            }
            NodePayload::Sel {
                selector,
                cases,
                default,
            } => {
                let sel = operand_bits(*selector)?;
                let case_bits: Vec<Vec<Ref>> = cases
                    .iter()
                    .map(|c| operand_bits(*c).cloned())
                    .collect::<Option<_>>()?;
                let default_bits = match default {
                    Some(d) => Some(operand_bits(*d)?.clone()),
                    None => None,
                };
                Some(eval.select(sel, &case_bits, default_bits))
            }
            NodePayload::OneHotSel { selector, cases } => {
                let sel = operand_bits(*selector)?;
                let case_bits: Vec<Vec<Ref>> = cases
                    .iter()
                    .map(|c| operand_bits(*c).cloned())
                    .collect::<Option<_>>()?;
                Some(eval.one_hot_select(sel, &case_bits, false))
            }
            // Arithmetic, shifts, aggregate ops, and params are opaque.
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;
    use crate::ir_builder::FnBuilder;

    #[test]
    fn test_or_with_complement_is_all_ones() {
        let mut fb = FnBuilder::new("f");
        let x = fb.param("x", Type::Bits(4));
        let inv = fb.not_(x);
        let out = fb.or_(&[x, inv]);
        fb.ret(out);
        let f = fb.build();

        let engine = BddEngine::build(&f);
        assert_eq!(engine.known_bits(out).unwrap(), vec![KnownBit::One; 4]);
        // The bare parameter has no known bits.
        assert_eq!(engine.known_bits(x).unwrap(), vec![KnownBit::Unknown; 4]);
    }

    #[test]
    fn test_concat_orders_msb_first_operand_last() {
        let mut fb = FnBuilder::new("f");
        let x = fb.param("x", Type::Bits(2));
        let lit = fb.literal_ubits(0b11, 2);
        let out = fb.concat(&[lit, x]);
        fb.ret(out);
        let f = fb.build();

        let engine = BddEngine::build(&f);
        let known = engine.known_bits(out).unwrap();
        assert_eq!(
            known,
            vec![
                KnownBit::Unknown,
                KnownBit::Unknown,
                KnownBit::One,
                KnownBit::One
            ]
        );
    }

    #[test]
    fn test_disjoint_equalities() {
        let mut fb = FnBuilder::new("f");
        let x = fb.param("x", Type::Bits(4));
        let l0 = fb.literal_ubits(0, 4);
        let l1 = fb.literal_ubits(1, 4);
        let eq0 = fb.eq(x, l0);
        let eq1 = fb.eq(x, l1);
        let out = fb.concat(&[eq0, eq1]);
        fb.ret(out);
        let f = fb.build();

        let engine = BddEngine::build(&f);
        let b0 = engine.node_bits(eq0).unwrap()[0];
        let b1 = engine.node_bits(eq1).unwrap()[0];
        assert!(engine.and_is_zero(b0, b1));
        assert!(engine.pairwise_disjoint(&[b0, b1]));
        assert!(!engine.or_is_one(&[b0, b1]));
    }
}
