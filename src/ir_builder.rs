// SPDX-License-Identifier: Apache-2.0

//! The `FnBuilder` is a builder for an IR `Fn` -- it builds up the underlying
//! node graph as operations are added, inferring result types as it goes.
//!
//! Basic example usage:
//! ```
//! use irprove::ir::Type;
//! use irprove::ir_builder::FnBuilder;
//!
//! let mut fb = FnBuilder::new("my_and");
//! let a = fb.param("a", Type::Bits(8));
//! let b = fb.param("b", Type::Bits(8));
//! let o = fb.and(&[a, b]);
//! fb.ret(o);
//! let f = fb.build();
//! assert_eq!(f.ret_ty, Type::Bits(8));
//! ```

use crate::ir::{
    min_bit_count_unsigned, Binop, Fn, NaryOp, Node, NodePayload, NodeRef, Param, ParamId, Type,
    Unop,
};
use crate::value::IrValue;

pub struct FnBuilder {
    name: String,
    params: Vec<Param>,
    nodes: Vec<Node>,
    ret: Option<NodeRef>,
    next_id: usize,
}

impl FnBuilder {
    pub fn new(name: &str) -> Self {
        // Index 0 is a reserved nil node so parameters land at dense indices
        // starting at 1.
        let nil = Node {
            text_id: 0,
            name: None,
            ty: Type::Tuple(vec![]),
            payload: NodePayload::Nil,
        };
        FnBuilder {
            name: name.to_string(),
            params: Vec::new(),
            nodes: vec![nil],
            ret: None,
            next_id: 1,
        }
    }

    fn add_node(&mut self, ty: Type, payload: NodePayload) -> NodeRef {
        let text_id = self.next_id;
        self.next_id += 1;
        self.nodes.push(Node {
            text_id,
            name: None,
            ty,
            payload,
        });
        NodeRef {
            index: self.nodes.len() - 1,
        }
    }

    pub fn get_type(&self, nr: NodeRef) -> &Type {
        &self.nodes[nr.index].ty
    }

    fn bit_count(&self, nr: NodeRef) -> usize {
        match self.get_type(nr) {
            Type::Bits(w) => *w,
            other => panic!("expected bits-typed operand, got {}", other),
        }
    }

    pub fn param(&mut self, name: &str, ty: Type) -> NodeRef {
        let id = ParamId::new(self.next_id);
        self.next_id += 1;
        self.params.push(Param {
            name: name.to_string(),
            ty: ty.clone(),
            id,
        });
        self.nodes.push(Node {
            text_id: id.get_wrapped_id(),
            name: Some(name.to_string()),
            ty,
            payload: NodePayload::GetParam(id),
        });
        NodeRef {
            index: self.nodes.len() - 1,
        }
    }

    pub fn literal(&mut self, value: IrValue) -> NodeRef {
        let ty = value.ty();
        self.add_node(ty, NodePayload::Literal(value))
    }

    pub fn literal_ubits(&mut self, value: u64, width: usize) -> NodeRef {
        self.literal(IrValue::ubits(value, width))
    }

    fn binop_same_width(&mut self, op: Binop, a: NodeRef, b: NodeRef) -> NodeRef {
        assert_eq!(
            self.bit_count(a),
            self.bit_count(b),
            "{} operands must have matching widths",
            crate::ir::binop_to_operator(op)
        );
        let ty = self.get_type(a).clone();
        self.add_node(ty, NodePayload::Binop(op, a, b))
    }

    pub fn add(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.binop_same_width(Binop::Add, a, b)
    }

    pub fn sub(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.binop_same_width(Binop::Sub, a, b)
    }

    fn compare(&mut self, op: Binop, a: NodeRef, b: NodeRef) -> NodeRef {
        assert_eq!(
            self.bit_count(a),
            self.bit_count(b),
            "comparison operands must have matching widths"
        );
        self.add_node(Type::Bits(1), NodePayload::Binop(op, a, b))
    }

    pub fn eq(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Eq, a, b)
    }

    pub fn ne(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Ne, a, b)
    }

    pub fn ult(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Ult, a, b)
    }

    pub fn ule(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Ule, a, b)
    }

    pub fn ugt(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Ugt, a, b)
    }

    pub fn uge(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Uge, a, b)
    }

    pub fn slt(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Slt, a, b)
    }

    pub fn sle(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Sle, a, b)
    }

    pub fn sgt(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Sgt, a, b)
    }

    pub fn sge(&mut self, a: NodeRef, b: NodeRef) -> NodeRef {
        self.compare(Binop::Sge, a, b)
    }

    fn shift(&mut self, op: Binop, value: NodeRef, amount: NodeRef) -> NodeRef {
        let ty = self.get_type(value).clone();
        let _ = self.bit_count(amount);
        self.add_node(ty, NodePayload::Binop(op, value, amount))
    }

    pub fn shll(&mut self, value: NodeRef, amount: NodeRef) -> NodeRef {
        self.shift(Binop::Shll, value, amount)
    }

    pub fn shrl(&mut self, value: NodeRef, amount: NodeRef) -> NodeRef {
        self.shift(Binop::Shrl, value, amount)
    }

    pub fn shra(&mut self, value: NodeRef, amount: NodeRef) -> NodeRef {
        self.shift(Binop::Shra, value, amount)
    }

    /// Multiply operands may differ in width; the result width is explicit.
    pub fn umul(&mut self, a: NodeRef, b: NodeRef, width: usize) -> NodeRef {
        self.add_node(Type::Bits(width), NodePayload::Binop(Binop::Umul, a, b))
    }

    pub fn smul(&mut self, a: NodeRef, b: NodeRef, width: usize) -> NodeRef {
        self.add_node(Type::Bits(width), NodePayload::Binop(Binop::Smul, a, b))
    }

    fn unop_same_ty(&mut self, op: Unop, arg: NodeRef) -> NodeRef {
        let ty = self.get_type(arg).clone();
        self.add_node(ty, NodePayload::Unop(op, arg))
    }

    pub fn not_(&mut self, arg: NodeRef) -> NodeRef {
        self.unop_same_ty(Unop::Not, arg)
    }

    pub fn neg(&mut self, arg: NodeRef) -> NodeRef {
        self.unop_same_ty(Unop::Neg, arg)
    }

    pub fn identity(&mut self, arg: NodeRef) -> NodeRef {
        self.unop_same_ty(Unop::Identity, arg)
    }

    pub fn reverse(&mut self, arg: NodeRef) -> NodeRef {
        self.unop_same_ty(Unop::Reverse, arg)
    }

    fn reduce(&mut self, op: Unop, arg: NodeRef) -> NodeRef {
        let _ = self.bit_count(arg);
        self.add_node(Type::Bits(1), NodePayload::Unop(op, arg))
    }

    pub fn or_reduce(&mut self, arg: NodeRef) -> NodeRef {
        self.reduce(Unop::OrReduce, arg)
    }

    pub fn and_reduce(&mut self, arg: NodeRef) -> NodeRef {
        self.reduce(Unop::AndReduce, arg)
    }

    pub fn xor_reduce(&mut self, arg: NodeRef) -> NodeRef {
        self.reduce(Unop::XorReduce, arg)
    }

    fn nary_same_width(&mut self, op: NaryOp, elems: &[NodeRef]) -> NodeRef {
        assert!(!elems.is_empty(), "n-ary op requires at least one operand");
        let width = self.bit_count(elems[0]);
        for e in elems.iter() {
            assert_eq!(self.bit_count(*e), width, "n-ary operands must match");
        }
        self.add_node(Type::Bits(width), NodePayload::Nary(op, elems.to_vec()))
    }

    pub fn and(&mut self, elems: &[NodeRef]) -> NodeRef {
        self.nary_same_width(NaryOp::And, elems)
    }

    pub fn or_(&mut self, elems: &[NodeRef]) -> NodeRef {
        self.nary_same_width(NaryOp::Or, elems)
    }

    pub fn xor(&mut self, elems: &[NodeRef]) -> NodeRef {
        self.nary_same_width(NaryOp::Xor, elems)
    }

    pub fn nand(&mut self, elems: &[NodeRef]) -> NodeRef {
        self.nary_same_width(NaryOp::Nand, elems)
    }

    pub fn nor(&mut self, elems: &[NodeRef]) -> NodeRef {
        self.nary_same_width(NaryOp::Nor, elems)
    }

    /// Concatenates bit vectors; operand 0 supplies the most significant bits.
    pub fn concat(&mut self, elems: &[NodeRef]) -> NodeRef {
        assert!(!elems.is_empty(), "concat requires at least one operand");
        let width: usize = elems.iter().map(|e| self.bit_count(*e)).sum();
        self.add_node(
            Type::Bits(width),
            NodePayload::Nary(NaryOp::Concat, elems.to_vec()),
        )
    }

    pub fn sign_ext(&mut self, arg: NodeRef, new_bit_count: usize) -> NodeRef {
        assert!(self.bit_count(arg) <= new_bit_count);
        self.add_node(
            Type::Bits(new_bit_count),
            NodePayload::SignExt { arg, new_bit_count },
        )
    }

    pub fn zero_ext(&mut self, arg: NodeRef, new_bit_count: usize) -> NodeRef {
        assert!(self.bit_count(arg) <= new_bit_count);
        self.add_node(
            Type::Bits(new_bit_count),
            NodePayload::ZeroExt { arg, new_bit_count },
        )
    }

    pub fn bit_slice(&mut self, arg: NodeRef, start: usize, width: usize) -> NodeRef {
        assert!(
            start + width <= self.bit_count(arg),
            "bit_slice out of range"
        );
        self.add_node(
            Type::Bits(width),
            NodePayload::BitSlice { arg, start, width },
        )
    }

    pub fn dynamic_bit_slice(&mut self, arg: NodeRef, start: NodeRef, width: usize) -> NodeRef {
        self.add_node(
            Type::Bits(width),
            NodePayload::DynamicBitSlice { arg, start, width },
        )
    }

    pub fn decode(&mut self, arg: NodeRef, width: usize) -> NodeRef {
        self.add_node(Type::Bits(width), NodePayload::Decode { arg, width })
    }

    /// Encode result width covers the largest input bit index.
    pub fn encode(&mut self, arg: NodeRef) -> NodeRef {
        let input_width = self.bit_count(arg);
        assert!(input_width > 1, "encode requires a multi-bit input");
        let width = min_bit_count_unsigned(input_width - 1);
        self.add_node(Type::Bits(width), NodePayload::Encode { arg })
    }

    /// One-hot result has one extra MSb that is set iff no input bit is set.
    pub fn one_hot(&mut self, arg: NodeRef, lsb_prio: bool) -> NodeRef {
        let width = self.bit_count(arg) + 1;
        self.add_node(Type::Bits(width), NodePayload::OneHot { arg, lsb_prio })
    }

    pub fn one_hot_sel(&mut self, selector: NodeRef, cases: &[NodeRef]) -> NodeRef {
        assert_eq!(
            self.bit_count(selector),
            cases.len(),
            "one_hot_sel selector width must match case count"
        );
        let case_ty = self.get_type(cases[0]).clone();
        for c in cases.iter() {
            assert_eq!(self.get_type(*c), &case_ty, "all cases must be the same type");
        }
        self.add_node(
            case_ty,
            NodePayload::OneHotSel {
                selector,
                cases: cases.to_vec(),
            },
        )
    }

    pub fn sel(&mut self, selector: NodeRef, cases: &[NodeRef], default: Option<NodeRef>) -> NodeRef {
        assert!(!cases.is_empty(), "sel requires at least one case");
        let sel_width = self.bit_count(selector);
        let selectable = 1usize
            .checked_shl(sel_width as u32)
            .unwrap_or(usize::MAX);
        if selectable > cases.len() {
            assert!(
                default.is_some(),
                "sel with non-exhaustive cases requires a default"
            );
        } else {
            assert!(
                default.is_none(),
                "sel with exhaustive cases must not have a default"
            );
        }
        let case_ty = self.get_type(cases[0]).clone();
        for c in cases.iter() {
            assert_eq!(self.get_type(*c), &case_ty, "all cases must be the same type");
        }
        if let Some(d) = default {
            assert_eq!(
                self.get_type(d),
                &case_ty,
                "default must be the same type as the cases"
            );
        }
        self.add_node(
            case_ty,
            NodePayload::Sel {
                selector,
                cases: cases.to_vec(),
                default,
            },
        )
    }

    pub fn array(&mut self, elems: &[NodeRef]) -> NodeRef {
        assert!(!elems.is_empty(), "array requires at least one element");
        let elem_ty = self.get_type(elems[0]).clone();
        for e in elems.iter() {
            assert_eq!(
                self.get_type(*e),
                &elem_ty,
                "all array elements must be the same type"
            );
        }
        self.add_node(
            Type::new_array(elem_ty, elems.len()),
            NodePayload::Array(elems.to_vec()),
        )
    }

    pub fn array_index(&mut self, array: NodeRef, index: NodeRef) -> NodeRef {
        let elem_ty = self.get_type(array).get_array_element_type().clone();
        self.add_node(elem_ty, NodePayload::ArrayIndex { array, index })
    }

    pub fn tuple(&mut self, elems: &[NodeRef]) -> NodeRef {
        let ty = Type::Tuple(
            elems
                .iter()
                .map(|e| Box::new(self.get_type(*e).clone()))
                .collect(),
        );
        self.add_node(ty, NodePayload::Tuple(elems.to_vec()))
    }

    pub fn tuple_index(&mut self, tuple: NodeRef, index: usize) -> NodeRef {
        let ty = self.get_type(tuple).get_tuple_element_types()[index]
            .as_ref()
            .clone();
        self.add_node(ty, NodePayload::TupleIndex { tuple, index })
    }

    pub fn ret(&mut self, nr: NodeRef) {
        self.ret = Some(nr);
    }

    pub fn build(self) -> Fn {
        let ret = self.ret.expect("FnBuilder::build called with no return node");
        let ret_ty = self.nodes[ret.index].ty.clone();
        Fn {
            name: self.name,
            params: self.params,
            ret_ty,
            nodes: self.nodes,
            ret_node_ref: Some(ret),
        }
    }
}
