// SPDX-License-Identifier: Apache-2.0

//! The typed SSA IR the verification core operates on: fixed-width bit
//! vectors, fixed-size arrays, and tuples, arranged as a DAG of nodes.

use crate::value::IrValue;

/// Strongly-typed wrapper for parameter IDs.
///
/// Note: This is *not* a general node id. This is an ordinal referring to the
/// dense parameter space for a function signature (i.e., the Nth parameter),
/// not a node id in the IR graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(usize);

impl ParamId {
    /// Constructs a new ParamId, asserting that the id is greater than zero.
    pub fn new(id: usize) -> Self {
        assert!(id > 0, "ParamId must be greater than zero, got {}", id);
        ParamId(id)
    }

    /// Returns the wrapped id value.
    pub fn get_wrapped_id(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ArrayTypeData {
    pub element_type: Box<Type>,
    pub element_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Type {
    Bits(usize),
    Tuple(Vec<Box<Type>>),
    Array(ArrayTypeData),
}

impl Type {
    pub fn new_array(element_type: Type, element_count: usize) -> Self {
        Type::Array(ArrayTypeData {
            element_type: Box::new(element_type),
            element_count,
        })
    }

    /// Returns the flat bit count of the type, summed across structure.
    pub fn bit_count(&self) -> usize {
        match self {
            Type::Bits(width) => *width,
            Type::Tuple(types) => types.iter().map(|t| t.bit_count()).sum(),
            Type::Array(ArrayTypeData {
                element_type,
                element_count,
            }) => element_type.bit_count() * element_count,
        }
    }

    pub fn get_array_element_type(&self) -> &Type {
        match self {
            Type::Array(ArrayTypeData { element_type, .. }) => element_type,
            _ => panic!(
                "Attempted to get array element type for non-array type: {:?}",
                self
            ),
        }
    }

    pub fn get_array_size(&self) -> usize {
        match self {
            Type::Array(ArrayTypeData { element_count, .. }) => *element_count,
            _ => panic!("Attempted to get array size for non-array type: {:?}", self),
        }
    }

    pub fn get_tuple_element_types(&self) -> &[Box<Type>] {
        match self {
            Type::Tuple(types) => types,
            _ => panic!(
                "Attempted to get tuple element types for non-tuple type: {:?}",
                self
            ),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Bits(width) => write!(f, "bits[{}]", width),
            Type::Tuple(types) => {
                write!(f, "(")?;
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ")")
            }
            Type::Array(ArrayTypeData {
                element_type,
                element_count,
            }) => {
                write!(f, "{}", element_type)?;
                write!(f, "[{}]", element_count)
            }
        }
    }
}

/// Returns the number of bits required to represent the value `v`, i.e. zero
/// for zero and `floor(log2(v)) + 1` otherwise.
pub fn min_bit_count_unsigned(v: usize) -> usize {
    (usize::BITS - v.leading_zeros()) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binop {
    Add,
    Sub,

    Shll,
    Shrl,
    Shra,

    Eq,
    Ne,

    Uge,
    Ugt,
    Ult,
    Ule,

    // signed comparisons
    Sgt,
    Sge,
    Slt,
    Sle,

    Umul,
    Smul,
}

pub fn binop_to_operator(binop: Binop) -> &'static str {
    match binop {
        Binop::Add => "add",
        Binop::Sub => "sub",
        Binop::Shll => "shll",
        Binop::Shrl => "shrl",
        Binop::Shra => "shra",
        Binop::Eq => "eq",
        Binop::Ne => "ne",
        Binop::Uge => "uge",
        Binop::Ugt => "ugt",
        Binop::Ult => "ult",
        Binop::Ule => "ule",
        Binop::Sgt => "sgt",
        Binop::Sge => "sge",
        Binop::Slt => "slt",
        Binop::Sle => "sle",
        Binop::Umul => "umul",
        Binop::Smul => "smul",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unop {
    Neg,
    Not,
    Identity,
    Reverse,
    OrReduce,
    AndReduce,
    XorReduce,
}

pub fn unop_to_operator(unop: Unop) -> &'static str {
    match unop {
        Unop::Neg => "neg",
        Unop::Not => "not",
        Unop::Identity => "identity",
        Unop::Reverse => "reverse",
        Unop::OrReduce => "or_reduce",
        Unop::AndReduce => "and_reduce",
        Unop::XorReduce => "xor_reduce",
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum NaryOp {
    And,
    Nor,
    Or,
    Xor,
    Nand,
    Concat,
}

pub fn nary_op_to_operator(nary_op: NaryOp) -> &'static str {
    match nary_op {
        NaryOp::And => "and",
        NaryOp::Nor => "nor",
        NaryOp::Or => "or",
        NaryOp::Xor => "xor",
        NaryOp::Nand => "nand",
        NaryOp::Concat => "concat",
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct NodeRef {
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    Nil,
    GetParam(ParamId),
    Tuple(Vec<NodeRef>),
    Array(Vec<NodeRef>),
    TupleIndex {
        tuple: NodeRef,
        index: usize,
    },
    Binop(Binop, NodeRef, NodeRef),
    Unop(Unop, NodeRef),
    Literal(IrValue),
    SignExt {
        arg: NodeRef,
        new_bit_count: usize,
    },
    ZeroExt {
        arg: NodeRef,
        new_bit_count: usize,
    },
    /// array_index(array, index) -> element; out-of-bounds indices read the
    /// last element of the array.
    ArrayIndex {
        array: NodeRef,
        index: NodeRef,
    },
    BitSlice {
        arg: NodeRef,
        start: usize,
        width: usize,
    },
    DynamicBitSlice {
        arg: NodeRef,
        start: NodeRef,
        width: usize,
    },
    Nary(NaryOp, Vec<NodeRef>),
    OneHotSel {
        selector: NodeRef,
        cases: Vec<NodeRef>,
    },
    OneHot {
        arg: NodeRef,
        lsb_prio: bool,
    },
    Sel {
        selector: NodeRef,
        cases: Vec<NodeRef>,
        default: Option<NodeRef>,
    },
    Decode {
        arg: NodeRef,
        width: usize,
    },
    Encode {
        arg: NodeRef,
    },
}

impl NodePayload {
    pub fn get_operator(&self) -> &str {
        match self {
            NodePayload::Nil => "nil",
            NodePayload::GetParam(_) => "get_param",
            NodePayload::Tuple(_) => "tuple",
            NodePayload::Array(_) => "array",
            NodePayload::TupleIndex { .. } => "tuple_index",
            NodePayload::Binop(op, _, _) => binop_to_operator(*op),
            NodePayload::Unop(op, _) => unop_to_operator(*op),
            NodePayload::Literal(_) => "literal",
            NodePayload::SignExt { .. } => "sign_ext",
            NodePayload::ZeroExt { .. } => "zero_ext",
            NodePayload::ArrayIndex { .. } => "array_index",
            NodePayload::BitSlice { .. } => "bit_slice",
            NodePayload::DynamicBitSlice { .. } => "dynamic_bit_slice",
            NodePayload::Nary(op, _) => nary_op_to_operator(*op),
            NodePayload::OneHotSel { .. } => "one_hot_sel",
            NodePayload::OneHot { .. } => "one_hot",
            NodePayload::Sel { .. } => "sel",
            NodePayload::Decode { .. } => "decode",
            NodePayload::Encode { .. } => "encode",
        }
    }

    pub fn to_string(&self, f: &Fn, id: usize) -> Option<String> {
        let get_name = |node_ref: NodeRef| -> String { node_textual_id(f, node_ref) };
        let join_names = |nodes: &[NodeRef]| -> String {
            nodes
                .iter()
                .map(|n| get_name(*n))
                .collect::<Vec<String>>()
                .join(", ")
        };
        let result = match self {
            NodePayload::Tuple(nodes) => {
                if nodes.is_empty() {
                    format!("tuple(id={})", id)
                } else {
                    format!("tuple({}, id={})", join_names(nodes), id)
                }
            }
            NodePayload::Array(nodes) => format!("array({}, id={})", join_names(nodes), id),
            NodePayload::TupleIndex { tuple, index } => {
                format!(
                    "tuple_index({}, index={}, id={})",
                    get_name(*tuple),
                    index,
                    id
                )
            }
            NodePayload::Binop(op, lhs, rhs) => format!(
                "{}({}, {}, id={})",
                binop_to_operator(*op),
                get_name(*lhs),
                get_name(*rhs),
                id
            ),
            NodePayload::Unop(op, arg) => {
                format!("{}({}, id={})", unop_to_operator(*op), get_name(*arg), id)
            }
            NodePayload::Literal(value) => format!("literal(value={}, id={})", value, id),
            NodePayload::SignExt { arg, new_bit_count } => format!(
                "sign_ext({}, new_bit_count={}, id={})",
                get_name(*arg),
                new_bit_count,
                id
            ),
            NodePayload::ZeroExt { arg, new_bit_count } => format!(
                "zero_ext({}, new_bit_count={}, id={})",
                get_name(*arg),
                new_bit_count,
                id
            ),
            NodePayload::ArrayIndex { array, index } => {
                format!(
                    "array_index({}, indices=[{}], id={})",
                    get_name(*array),
                    get_name(*index),
                    id
                )
            }
            NodePayload::BitSlice { arg, start, width } => {
                format!(
                    "bit_slice({}, start={}, width={}, id={})",
                    get_name(*arg),
                    start,
                    width,
                    id
                )
            }
            NodePayload::DynamicBitSlice { arg, start, width } => format!(
                "dynamic_bit_slice({}, {}, width={}, id={})",
                get_name(*arg),
                get_name(*start),
                width,
                id
            ),
            NodePayload::Nary(op, nodes) => format!(
                "{}({}, id={})",
                nary_op_to_operator(*op),
                join_names(nodes),
                id
            ),
            NodePayload::OneHotSel { selector, cases } => format!(
                "one_hot_sel({}, cases=[{}], id={})",
                get_name(*selector),
                join_names(cases),
                id
            ),
            NodePayload::OneHot { arg, lsb_prio } => {
                format!(
                    "one_hot({}, lsb_prio={}, id={})",
                    get_name(*arg),
                    lsb_prio,
                    id
                )
            }
            NodePayload::Sel {
                selector,
                cases,
                default,
            } => {
                let default_str = if let Some(default) = default {
                    format!(", default={}", get_name(*default))
                } else {
                    "".to_string()
                };
                format!(
                    "sel({}, cases=[{}]{}, id={})",
                    get_name(*selector),
                    join_names(cases),
                    default_str,
                    id
                )
            }
            NodePayload::Decode { arg, width } => {
                format!("decode({}, width={}, id={})", get_name(*arg), width, id)
            }
            NodePayload::Encode { arg } => {
                format!("encode({}, id={})", get_name(*arg), id)
            }
            NodePayload::GetParam(_) | NodePayload::Nil => return None,
        };
        Some(result)
    }
}

/// Returns a human-oriented textual identifier for a node reference.
///
/// - For `get_param` nodes, returns the parameter's name.
/// - For other nodes, returns the node's `name` if present, otherwise
///   `"<operator>.<text_id>"`.
pub fn node_textual_id(f: &Fn, nr: NodeRef) -> String {
    let node = f.get_node(nr);
    match node.payload {
        NodePayload::GetParam(_) => node.name.clone().expect("GetParam node should have a name"),
        _ => match &node.name {
            Some(n) => n.clone(),
            None => format!("{}.{}", node.payload.get_operator(), node.text_id),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// All nodes have known ids.
    pub text_id: usize,
    /// Some nodes also have names -- params must have names, other nodes
    /// optionally have names.
    pub name: Option<String>,
    pub ty: Type,
    pub payload: NodePayload,
}

impl Node {
    pub fn to_string(&self, f: &Fn) -> Option<String> {
        let payload_str = self.payload.to_string(f, self.text_id)?;
        let name_str = if let Some(name) = &self.name {
            name.clone()
        } else {
            format!("{}.{}", self.payload.get_operator(), self.text_id)
        };
        Some(format!("{}: {} = {}", name_str, self.ty, payload_str))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub id: ParamId,
}

#[derive(Debug, Clone)]
pub struct Fn {
    pub name: String,
    pub params: Vec<Param>,
    pub ret_ty: Type,
    pub nodes: Vec<Node>,
    pub ret_node_ref: Option<NodeRef>,
}

impl Fn {
    pub fn node_refs(&self) -> Vec<NodeRef> {
        (0..self.nodes.len()).map(|i| NodeRef { index: i }).collect()
    }

    pub fn get_node(&self, node_ref: NodeRef) -> &Node {
        &self.nodes[node_ref.index]
    }

    pub fn get_node_ty(&self, node_ref: NodeRef) -> &Type {
        &self.get_node(node_ref).ty
    }

    pub fn get_node_mut(&mut self, node_ref: NodeRef) -> &mut Node {
        &mut self.nodes[node_ref.index]
    }

    /// Returns the node holding the `GetParam` for the given parameter id.
    pub fn get_param_node_ref(&self, id: ParamId) -> Option<NodeRef> {
        self.nodes.iter().enumerate().find_map(|(i, n)| match n.payload {
            NodePayload::GetParam(pid) if pid == id => Some(NodeRef { index: i }),
            _ => None,
        })
    }
}

fn append_emitted_node_line(out: &mut String, func: &Fn, node_ref: NodeRef) {
    let node = func.get_node(node_ref);
    let is_ret = func.ret_node_ref == Some(node_ref);

    match &node.payload {
        NodePayload::GetParam(pid) if is_ret => {
            let name = node.name.as_deref().unwrap_or("<unnamed>");
            out.push_str(&format!(
                "  ret {}: {} = param(name={}, id={})\n",
                name,
                node.ty,
                name,
                pid.get_wrapped_id()
            ));
        }
        _ => {
            let Some(node_str) = node.to_string(func) else {
                return;
            };
            out.push_str("  ");
            if is_ret {
                out.push_str("ret ");
            }
            out.push_str(&node_str);
            out.push('\n');
        }
    }
}

/// Emits a function as text: signature line followed by the body nodes.
pub fn emit_fn(func: &Fn) -> String {
    let mut out = String::new();
    let params_str = func
        .params
        .iter()
        .map(|p| format!("{}: {} id={}", p.name, p.ty, p.id.get_wrapped_id()))
        .collect::<Vec<String>>()
        .join(", ");
    out.push_str(&format!(
        "fn {}({}) -> {} {{\n",
        func.name, params_str, func.ret_ty
    ));

    for (i, _node) in func.nodes.iter().enumerate() {
        append_emitted_node_line(&mut out, func, NodeRef { index: i });
    }

    out.push('}');
    out
}

impl std::fmt::Display for Fn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", emit_fn(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir_builder::FnBuilder;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_emit_simple_and_fn() {
        let mut fb = FnBuilder::new("do_and");
        let a = fb.param("a", Type::Bits(1));
        let b = fb.param("b", Type::Bits(1));
        let r = fb.and(&[a, b]);
        fb.ret(r);
        let f = fb.build();
        assert_eq!(
            f.to_string(),
            r#"fn do_and(a: bits[1] id=1, b: bits[1] id=2) -> bits[1] {
  ret and.3: bits[1] = and(a, b, id=3)
}"#
        );
    }

    #[test]
    fn test_emit_literal_array() {
        let mut fb = FnBuilder::new("f");
        let lit = fb.literal(crate::value::IrValue::Array(vec![
            crate::value::IrValue::ubits(0, 32),
            crate::value::IrValue::ubits(1, 32),
        ]));
        fb.ret(lit);
        let f = fb.build();
        assert_eq!(
            f.to_string(),
            r#"fn f() -> bits[32][2] {
  ret literal.1: bits[32][2] = literal(value=[0, 1], id=1)
}"#
        );
    }

    #[test]
    fn test_returning_param_emits_param_line() {
        let mut fb = FnBuilder::new("passthrough");
        let x = fb.param("x", Type::Bits(16));
        fb.ret(x);
        let f = fb.build();
        assert_eq!(
            f.to_string(),
            r#"fn passthrough(x: bits[16] id=1) -> bits[16] {
  ret x: bits[16] = param(name=x, id=1)
}"#
        );
    }

    #[test]
    fn test_min_bit_count_unsigned() {
        assert_eq!(min_bit_count_unsigned(0), 0);
        assert_eq!(min_bit_count_unsigned(1), 1);
        assert_eq!(min_bit_count_unsigned(3), 2);
        assert_eq!(min_bit_count_unsigned(4), 3);
        assert_eq!(min_bit_count_unsigned(7), 3);
    }
}
