// SPDX-License-Identifier: Apache-2.0

//! Structural translation of an IR function into Z3 terms.
//!
//! Nodes are visited in data-dependency order; each visit emits one term and
//! records it against the node, so multiple uses of a node share one term.
//! The translator either owns its Z3 context (created and destroyed with the
//! translator) or borrows a caller-provided context, in which case the caller
//! also supplies the terms standing in for the function parameters.

use std::collections::HashMap;
use std::ffi::CString;
use std::os::raw::{c_int, c_uint};
use std::time::Duration;

use z3_sys::*;

use crate::abstract_eval::AbstractEvaluator;
use crate::error::{Error, Result};
use crate::ir::{
    min_bit_count_unsigned, ArrayTypeData, Binop, Fn, NaryOp, NodePayload, NodeRef, Type, Unop,
};
use crate::ir_utils::get_topological;
use crate::smt::error_handler::ScopedErrorHandler;
use crate::smt::ops::OpBuilder;
use crate::value::{IrBits, IrValue};

/// Instantiates the abstract per-bit evaluator over 1-bit Z3 terms.
struct SmtEval {
    ops: OpBuilder,
}

impl AbstractEvaluator for SmtEval {
    type Elem = Z3_ast;

    fn one(&self) -> Z3_ast {
        self.ops.fill(true, 1)
    }

    fn zero(&self) -> Z3_ast {
        self.ops.fill(false, 1)
    }

    fn not(&self, a: &Z3_ast) -> Z3_ast {
        self.ops.not(*a)
    }

    fn and(&self, a: &Z3_ast, b: &Z3_ast) -> Z3_ast {
        self.ops.and(*a, *b)
    }

    fn or(&self, a: &Z3_ast, b: &Z3_ast) -> Z3_ast {
        self.ops.or(*a, *b)
    }
}

pub struct Translator<'f> {
    config: Option<Z3_config>,
    ctx: Z3_context,
    borrowed_context: bool,
    imported_params: Option<Vec<Z3_ast>>,
    func: &'f Fn,
    translations: HashMap<NodeRef, Z3_ast>,
}

impl<'f> Translator<'f> {
    /// Encodes `func` in a freshly created solver context (owned mode).
    pub fn encode(func: &'f Fn) -> Result<Self> {
        let proof_key = CString::new("proof").unwrap();
        let proof_value = CString::new("true").unwrap();
        let (config, ctx) = unsafe {
            let config = Z3_mk_config();
            Z3_set_param_value(config, proof_key.as_ptr(), proof_value.as_ptr());
            let ctx = Z3_mk_context(config);
            (config, ctx)
        };
        let mut translator = Translator {
            config: Some(config),
            ctx,
            borrowed_context: false,
            imported_params: None,
            func,
            translations: HashMap::new(),
        };
        translator.translate()?;
        Ok(translator)
    }

    /// Encodes `func` into a caller-owned context, using `imported_params`
    /// (in parameter order) in place of fresh symbolic constants.
    pub fn encode_with_context(
        ctx: Z3_context,
        func: &'f Fn,
        imported_params: &[Z3_ast],
    ) -> Result<Self> {
        assert_eq!(
            imported_params.len(),
            func.params.len(),
            "one imported term is required per function parameter"
        );
        let mut translator = Translator {
            config: None,
            ctx,
            borrowed_context: true,
            imported_params: Some(imported_params.to_vec()),
            func,
            translations: HashMap::new(),
        };
        translator.translate()?;
        Ok(translator)
    }

    pub fn ctx(&self) -> Z3_context {
        self.ctx
    }

    fn ops(&self) -> OpBuilder {
        OpBuilder::new(self.ctx)
    }

    fn translate(&mut self) -> Result<()> {
        for nr in get_topological(self.func) {
            if matches!(self.func.get_node(nr).payload, NodePayload::Nil) {
                continue;
            }
            let seh = ScopedErrorHandler::new(self.ctx);
            let term = self.visit(nr)?;
            seh.status()?;
            self.translations.insert(nr, term);
        }
        Ok(())
    }

    /// Returns the term recorded for `node`.
    pub fn get_translation(&self, node: NodeRef) -> Result<Z3_ast> {
        if node.index >= self.func.nodes.len() {
            return Err(Error::NotFound(format!(
                "node index {} is not part of the encoded function '{}'",
                node.index, self.func.name
            )));
        }
        self.translations.get(&node).copied().ok_or_else(|| {
            Error::NotFound(format!(
                "no translation recorded for node {}",
                crate::ir::node_textual_id(self.func, node)
            ))
        })
    }

    /// Returns the term for the function's return value.
    pub fn get_return_term(&self) -> Result<Z3_ast> {
        let ret = self.func.ret_node_ref.ok_or_else(|| {
            Error::InvalidArgument(format!("function '{}' has no return node", self.func.name))
        })?;
        self.get_translation(ret)
    }

    pub fn get_value_kind(&self, value: Z3_ast) -> SortKind {
        unsafe {
            let sort = Z3_get_sort(self.ctx, value);
            Z3_get_sort_kind(self.ctx, sort)
        }
    }

    /// Sets the context's solver timeout; an elapsed timeout surfaces as the
    /// "unknown" verdict.
    pub fn set_timeout(&self, timeout: Duration) {
        let key = CString::new("timeout").unwrap();
        let value = CString::new(timeout.as_millis().to_string()).unwrap();
        unsafe { Z3_update_param_value(self.ctx, key.as_ptr(), value.as_ptr()) };
    }

    // -- Type adaptor.

    pub fn type_to_sort(&self, ty: &Type) -> Z3_sort {
        match ty {
            Type::Bits(width) => unsafe { Z3_mk_bv_sort(self.ctx, *width as c_uint) },
            Type::Tuple(_) => self.create_tuple_sort(ty),
            Type::Array(array_ty) => {
                let element_sort = self.type_to_sort(&array_ty.element_type);
                let index_sort = self.array_index_sort(array_ty.element_count);
                unsafe { Z3_mk_array_sort(self.ctx, index_sort, element_sort) }
            }
        }
    }

    /// The sort used to index arrays of `size` elements: the smallest bit
    /// vector that covers the size, floored at one bit so the sort is
    /// well-formed for empty and single-element arrays.
    fn array_index_sort(&self, size: usize) -> Z3_sort {
        let width = min_bit_count_unsigned(size).max(1);
        unsafe { Z3_mk_bv_sort(self.ctx, width as c_uint) }
    }

    fn create_tuple_sort(&self, ty: &Type) -> Z3_sort {
        let element_types = ty.get_tuple_element_types();
        let tuple_type_str = ty.to_string();
        let sort_name = CString::new(tuple_type_str.clone()).unwrap();

        let field_cnames: Vec<CString> = (0..element_types.len())
            .map(|i| CString::new(format!("{}_{}", tuple_type_str, i)).unwrap())
            .collect();
        let field_names: Vec<Z3_symbol> = field_cnames
            .iter()
            .map(|n| unsafe { Z3_mk_string_symbol(self.ctx, n.as_ptr()) })
            .collect();
        let field_sorts: Vec<Z3_sort> = element_types
            .iter()
            .map(|t| self.type_to_sort(t))
            .collect();

        let mut mk_tuple_decl: Z3_func_decl = std::ptr::null_mut();
        let mut proj_decls: Vec<Z3_func_decl> =
            vec![std::ptr::null_mut(); element_types.len()];
        unsafe {
            Z3_mk_tuple_sort(
                self.ctx,
                Z3_mk_string_symbol(self.ctx, sort_name.as_ptr()),
                element_types.len() as c_uint,
                field_names.as_ptr(),
                field_sorts.as_ptr(),
                &mut mk_tuple_decl,
                proj_decls.as_mut_ptr(),
            )
        }
    }

    fn create_tuple(&self, tuple_sort: Z3_sort, elements: &[Z3_ast]) -> Z3_ast {
        unsafe {
            let mk_tuple_decl = Z3_get_tuple_sort_mk_decl(self.ctx, tuple_sort);
            Z3_mk_app(
                self.ctx,
                mk_tuple_decl,
                elements.len() as c_uint,
                elements.as_ptr(),
            )
        }
    }

    fn tuple_field(&self, tuple: Z3_ast, index: usize) -> Z3_ast {
        unsafe {
            let tuple_sort = Z3_get_sort(self.ctx, tuple);
            let accessor = Z3_get_tuple_sort_field_decl(self.ctx, tuple_sort, index as c_uint);
            Z3_mk_app(self.ctx, accessor, 1, &tuple)
        }
    }

    /// Constructs a well-typed zero value of the given sort.
    pub fn zero_of_sort(&self, sort: Z3_sort) -> Z3_ast {
        let sort_kind = unsafe { Z3_get_sort_kind(self.ctx, sort) };
        match sort_kind {
            SortKind::BV => unsafe { Z3_mk_int(self.ctx, 0 as c_int, sort) },
            SortKind::Array => unsafe {
                let index_sort = Z3_get_array_sort_domain(self.ctx, sort);
                let element = self.zero_of_sort(Z3_get_array_sort_range(self.ctx, sort));
                Z3_mk_const_array(self.ctx, index_sort, element)
            },
            SortKind::Datatype => {
                let num_fields =
                    unsafe { Z3_get_tuple_sort_num_fields(self.ctx, sort) } as usize;
                let elements: Vec<Z3_ast> = (0..num_fields)
                    .map(|i| unsafe {
                        let decl = Z3_get_tuple_sort_field_decl(self.ctx, sort, i as c_uint);
                        self.zero_of_sort(Z3_get_range(self.ctx, decl))
                    })
                    .collect();
                self.create_tuple(sort, &elements)
            }
            other => panic!("Unknown/unsupported sort kind: {:?}", other),
        }
    }

    fn create_array(&self, array_ty: &ArrayTypeData, elements: &[Z3_ast]) -> Z3_ast {
        assert_eq!(elements.len(), array_ty.element_count);
        let element_sort = self.type_to_sort(&array_ty.element_type);
        // Zero-element arrays are a thing, so every array starts from a
        // synthesized zero default.
        let default_value = self.zero_of_sort(element_sort);
        let index_sort = self.array_index_sort(array_ty.element_count);
        let mut z3_array =
            unsafe { Z3_mk_const_array(self.ctx, index_sort, default_value) };
        for (i, element) in elements.iter().enumerate() {
            unsafe {
                let index = Z3_mk_int64(self.ctx, i as i64, index_sort);
                z3_array = Z3_mk_store(self.ctx, z3_array, index, *element);
            }
        }
        z3_array
    }

    /// Reads an element out of an array term, casting the index to the
    /// array's natural index width and clamping it to the last element to
    /// match IR out-of-bounds semantics.
    fn get_array_element(
        &self,
        array_ty: &ArrayTypeData,
        array: Z3_ast,
        index: Z3_ast,
    ) -> Z3_ast {
        let ops = self.ops();
        let target_width = min_bit_count_unsigned(array_ty.element_count).max(1);
        let index_width = ops.get_bv_bit_count(index);
        let mut index = index;
        if index_width < target_width {
            index = unsafe {
                Z3_mk_zero_ext(self.ctx, (target_width - index_width) as c_uint, index)
            };
        } else if index_width > target_width {
            index = unsafe {
                Z3_mk_extract(self.ctx, (target_width - 1) as c_uint, 0, index)
            };
        }
        let max_index = array_ty.element_count.saturating_sub(1);
        let index_sort = unsafe { Z3_get_sort(self.ctx, index) };
        let array_max_index =
            unsafe { Z3_mk_int64(self.ctx, max_index as i64, index_sort) };
        let clamped = ops.min(index, array_max_index);
        unsafe { Z3_mk_select(self.ctx, array, clamped) }
    }

    /// Returns a little-endian (LSb-first) flattening of `value` into 1-bit
    /// terms: bits LSb first, but array element 0 / tuple field 0 first.
    pub fn flatten_value(&self, ty: &Type, value: Z3_ast) -> Vec<Z3_ast> {
        match ty {
            Type::Bits(_) => self.ops().explode_bits(value),
            Type::Array(array_ty) => {
                let index_sort = self.array_index_sort(array_ty.element_count);
                let mut flattened = Vec::with_capacity(ty.bit_count());
                for i in 0..array_ty.element_count {
                    let index =
                        unsafe { Z3_mk_int64(self.ctx, i as i64, index_sort) };
                    let element = self.get_array_element(array_ty, value, index);
                    flattened.extend(self.flatten_value(&array_ty.element_type, element));
                }
                flattened
            }
            Type::Tuple(element_types) => {
                let mut flattened = Vec::with_capacity(ty.bit_count());
                for (i, element_type) in element_types.iter().enumerate() {
                    let child = self.tuple_field(value, i);
                    flattened.extend(self.flatten_value(element_type, child));
                }
                flattened
            }
        }
    }

    /// Inverse of [`flatten_value`] modulo a full reversal: consumes `flat`
    /// in most-significant-first order, with tuple field 0 and array element
    /// 0 taking the trailing (least significant) positions.
    pub fn unflatten_ast(&self, ty: &Type, flat: &[Z3_ast]) -> Z3_ast {
        assert_eq!(flat.len(), ty.bit_count());
        match ty {
            Type::Bits(_) => self.ops().concat_n(flat),
            Type::Array(array_ty) => {
                let element_bits = array_ty.element_type.bit_count();
                let mut high = ty.bit_count();
                let mut elements = Vec::with_capacity(array_ty.element_count);
                for _ in 0..array_ty.element_count {
                    let sub = &flat[high - element_bits..high];
                    elements.push(self.unflatten_ast(&array_ty.element_type, sub));
                    high -= element_bits;
                }
                self.create_array(array_ty, &elements)
            }
            Type::Tuple(element_types) => {
                let mut high = ty.bit_count();
                let mut elements = Vec::with_capacity(element_types.len());
                for element_type in element_types.iter() {
                    let element_bits = element_type.bit_count();
                    let sub = &flat[high - element_bits..high];
                    elements.push(self.unflatten_ast(element_type, sub));
                    high -= element_bits;
                }
                self.create_tuple(self.type_to_sort(ty), &elements)
            }
        }
    }

    // -- Node visitation.

    fn get_value(&self, node: NodeRef) -> Z3_ast {
        *self
            .translations
            .get(&node)
            .unwrap_or_else(|| panic!("operand translated before use: {:?}", node))
    }

    /// Wrapper around `get_value` that verifies we're accessing a bit-vector
    /// value of the node's declared width.
    fn get_bitvec(&self, node: NodeRef) -> Z3_ast {
        let value = self.get_value(node);
        assert_eq!(
            self.get_value_kind(value),
            SortKind::BV,
            "expected bit-vector operand: {}",
            crate::ir::node_textual_id(self.func, node)
        );
        assert_eq!(
            self.func.get_node_ty(node).bit_count(),
            self.ops().get_bv_bit_count(value)
        );
        value
    }

    fn visit(&self, nr: NodeRef) -> Result<Z3_ast> {
        let node = self.func.get_node(nr);
        let ops = self.ops();
        match &node.payload {
            NodePayload::Nil => unreachable!("nil nodes are skipped by the traversal"),
            NodePayload::GetParam(pid) => {
                let ordinal = self
                    .func
                    .params
                    .iter()
                    .position(|p| p.id == *pid)
                    .expect("GetParam refers to a declared parameter");
                match &self.imported_params {
                    Some(imported) => Ok(imported[ordinal]),
                    None => {
                        let param = &self.func.params[ordinal];
                        let cname = CString::new(param.name.clone()).unwrap();
                        Ok(unsafe {
                            Z3_mk_const(
                                self.ctx,
                                Z3_mk_string_symbol(self.ctx, cname.as_ptr()),
                                self.type_to_sort(&param.ty),
                            )
                        })
                    }
                }
            }
            NodePayload::Literal(value) => self.translate_literal(&node.ty, value),
            NodePayload::Binop(op, a, b) => self.visit_binop(*op, *a, *b, &node.ty),
            NodePayload::Unop(op, a) => match op {
                Unop::Neg => Ok(unsafe { Z3_mk_bvneg(self.ctx, self.get_bitvec(*a)) }),
                Unop::Not => Ok(ops.not(self.get_bitvec(*a))),
                Unop::Identity => Ok(self.get_value(*a)),
                Unop::Reverse => {
                    let eval = SmtEval { ops };
                    let input = ops.explode_bits(self.get_bitvec(*a));
                    Ok(self.finish_bits(node.ty.bit_count(), eval.reverse(&input)))
                }
                Unop::OrReduce | Unop::AndReduce | Unop::XorReduce => {
                    let eval = SmtEval { ops };
                    let input = ops.explode_bits(self.get_bitvec(*a));
                    let bit = match op {
                        Unop::OrReduce => eval.or_reduce(&input),
                        Unop::AndReduce => eval.and_reduce(&input),
                        _ => eval.xor_reduce(&input),
                    };
                    Ok(self.finish_bits(node.ty.bit_count(), vec![bit]))
                }
            },
            NodePayload::Nary(op, elems) => {
                let f: unsafe extern "C" fn(Z3_context, Z3_ast, Z3_ast) -> Z3_ast = match op {
                    NaryOp::And | NaryOp::Nand => Z3_mk_bvand,
                    NaryOp::Or | NaryOp::Nor => Z3_mk_bvor,
                    NaryOp::Xor => Z3_mk_bvxor,
                    NaryOp::Concat => Z3_mk_concat,
                };
                let invert_result = matches!(op, NaryOp::Nand | NaryOp::Nor);
                let mut accum = self.get_bitvec(elems[0]);
                for e in &elems[1..] {
                    accum = unsafe { f(self.ctx, accum, self.get_bitvec(*e)) };
                }
                if invert_result {
                    accum = ops.not(accum);
                }
                Ok(accum)
            }
            NodePayload::SignExt { arg, new_bit_count } => {
                let input_bit_count = self.func.get_node_ty(*arg).bit_count();
                Ok(unsafe {
                    Z3_mk_sign_ext(
                        self.ctx,
                        (new_bit_count - input_bit_count) as c_uint,
                        self.get_bitvec(*arg),
                    )
                })
            }
            NodePayload::ZeroExt { arg, new_bit_count } => {
                let input_bit_count = self.func.get_node_ty(*arg).bit_count();
                Ok(unsafe {
                    Z3_mk_zero_ext(
                        self.ctx,
                        (new_bit_count - input_bit_count) as c_uint,
                        self.get_bitvec(*arg),
                    )
                })
            }
            NodePayload::BitSlice { arg, start, width } => {
                let low = *start;
                let high = low + width - 1;
                Ok(unsafe {
                    Z3_mk_extract(self.ctx, high as c_uint, low as c_uint, self.get_bitvec(*arg))
                })
            }
            NodePayload::ArrayIndex { array, index } => {
                let array_ty = match self.func.get_node_ty(*array) {
                    Type::Array(a) => a,
                    other => panic!("array_index over non-array type: {}", other),
                };
                Ok(self.get_array_element(
                    array_ty,
                    self.get_value(*array),
                    self.get_value(*index),
                ))
            }
            NodePayload::Array(elems) => {
                let array_ty = match &node.ty {
                    Type::Array(a) => a,
                    other => panic!("array node of non-array type: {}", other),
                };
                let elements: Vec<Z3_ast> = elems.iter().map(|e| self.get_value(*e)).collect();
                Ok(self.create_array(array_ty, &elements))
            }
            NodePayload::Tuple(elems) => {
                let elements: Vec<Z3_ast> = elems.iter().map(|e| self.get_value(*e)).collect();
                Ok(self.create_tuple(self.type_to_sort(&node.ty), &elements))
            }
            NodePayload::TupleIndex { tuple, index } => {
                Ok(self.tuple_field(self.get_value(*tuple), *index))
            }
            NodePayload::OneHot { arg, lsb_prio } => {
                let eval = SmtEval { ops };
                let input = ops.explode_bits(self.get_bitvec(*arg));
                Ok(self.finish_bits(node.ty.bit_count(), eval.one_hot(&input, *lsb_prio)))
            }
            NodePayload::Encode { arg } => {
                let eval = SmtEval { ops };
                let input = ops.explode_bits(self.get_bitvec(*arg));
                Ok(self.finish_bits(
                    node.ty.bit_count(),
                    eval.encode(&input, node.ty.bit_count()),
                ))
            }
            NodePayload::Sel {
                selector,
                cases,
                default,
            } => {
                let eval = SmtEval { ops };
                let selector_bits = ops.explode_bits(self.get_bitvec(*selector));
                let case_elements = self.flatten_cases(cases);
                let default_flat = default
                    .as_ref()
                    .map(|d| self.flatten_value(self.func.get_node_ty(*d), self.get_value(*d)));
                let mut flat = eval.select(&selector_bits, &case_elements, default_flat);
                flat.reverse();
                Ok(self.unflatten_ast(&node.ty, &flat))
            }
            NodePayload::OneHotSel { selector, cases } => {
                let eval = SmtEval { ops };
                let selector_bits = ops.explode_bits(self.get_bitvec(*selector));
                let case_elements = self.flatten_cases(cases);
                let mut flat = eval.one_hot_select(
                    &selector_bits,
                    &case_elements,
                    /* selector_can_be_zero= */ false,
                );
                flat.reverse();
                Ok(self.unflatten_ast(&node.ty, &flat))
            }
            NodePayload::DynamicBitSlice { .. } | NodePayload::Decode { .. } => {
                Err(Error::Unimplemented(format!(
                    "Unhandled node for conversion: {}",
                    node.to_string(self.func)
                        .unwrap_or_else(|| crate::ir::node_textual_id(self.func, nr))
                )))
            }
        }
    }

    fn flatten_cases(&self, cases: &[NodeRef]) -> Vec<Vec<Z3_ast>> {
        cases
            .iter()
            .map(|c| self.flatten_value(self.func.get_node_ty(*c), self.get_value(*c)))
            .collect()
    }

    /// The per-bit evaluator yields LSb-first bits, but `concat_n` puts its
    /// first element in the MSb position, so the list is reversed before
    /// concatenation.
    fn finish_bits(&self, expected_width: usize, mut flat: Vec<Z3_ast>) -> Z3_ast {
        flat.reverse();
        let result = self.ops().concat_n(&flat);
        assert_eq!(self.ops().get_bv_bit_count(result), expected_width);
        result
    }

    fn visit_binop(&self, op: Binop, a: NodeRef, b: NodeRef, result_ty: &Type) -> Result<Z3_ast> {
        let ops = self.ops();
        match op {
            Binop::Add => {
                Ok(unsafe { Z3_mk_bvadd(self.ctx, self.get_bitvec(a), self.get_bitvec(b)) })
            }
            Binop::Sub => {
                Ok(unsafe { Z3_mk_bvsub(self.ctx, self.get_bitvec(a), self.get_bitvec(b)) })
            }
            Binop::Eq => Ok(ops.eq(self.get_bitvec(a), self.get_bitvec(b))),
            Binop::Ne => Ok(ops.reduce_or(ops.xor(self.get_bitvec(a), self.get_bitvec(b)))),
            Binop::Ult => Ok(ops.ult(self.get_bitvec(a), self.get_bitvec(b))),
            Binop::Ule => {
                let (lhs, rhs) = (self.get_bitvec(a), self.get_bitvec(b));
                Ok(ops.reduce_or(ops.or(ops.ult(lhs, rhs), ops.eq(lhs, rhs))))
            }
            Binop::Ugt => {
                let (lhs, rhs) = (self.get_bitvec(a), self.get_bitvec(b));
                Ok(ops.not(ops.or(ops.eq(lhs, rhs), ops.ult(lhs, rhs))))
            }
            Binop::Uge => Ok(ops.not(ops.ult(self.get_bitvec(a), self.get_bitvec(b)))),
            Binop::Slt => Ok(ops.slt(self.get_bitvec(a), self.get_bitvec(b))),
            Binop::Sle => {
                let (lhs, rhs) = (self.get_bitvec(a), self.get_bitvec(b));
                Ok(ops.reduce_or(ops.or(ops.slt(lhs, rhs), ops.eq(lhs, rhs))))
            }
            Binop::Sgt => {
                // Mirrors the Ugt shape with the signed less-than.
                let (lhs, rhs) = (self.get_bitvec(a), self.get_bitvec(b));
                Ok(ops.not(ops.or(ops.slt(lhs, rhs), ops.eq(lhs, rhs))))
            }
            Binop::Sge => Ok(ops.not(ops.slt(self.get_bitvec(a), self.get_bitvec(b)))),
            Binop::Shll => self.visit_shift(a, b, Z3_mk_bvshl),
            Binop::Shrl => self.visit_shift(a, b, Z3_mk_bvlshr),
            Binop::Shra => self.visit_shift(a, b, Z3_mk_bvashr),
            Binop::Umul => self.visit_mul(a, b, result_ty.bit_count(), false),
            Binop::Smul => self.visit_mul(a, b, result_ty.bit_count(), true),
        }
    }

    fn visit_shift(
        &self,
        value: NodeRef,
        amount: NodeRef,
        fshift: unsafe extern "C" fn(Z3_context, Z3_ast, Z3_ast) -> Z3_ast,
    ) -> Result<Z3_ast> {
        let lhs = self.get_bitvec(value);
        let mut rhs = self.get_bitvec(amount);
        let lhs_bit_count = self.ops().get_bv_bit_count(lhs);
        let rhs_bit_count = self.ops().get_bv_bit_count(rhs);
        if rhs_bit_count != lhs_bit_count {
            if rhs_bit_count > lhs_bit_count {
                return Err(Error::InvalidArgument(format!(
                    "shift amount width {} exceeds value width {}",
                    rhs_bit_count, lhs_bit_count
                )));
            }
            rhs = unsafe {
                Z3_mk_zero_ext(self.ctx, (lhs_bit_count - rhs_bit_count) as c_uint, rhs)
            };
        }
        Ok(unsafe { fshift(self.ctx, lhs, rhs) })
    }

    /// Multiply operands may differ in width in the IR while Z3 requires
    /// matching widths: extend both operands past the widest of
    /// {lhs, rhs, result}, multiply, and truncate to the result width.
    fn visit_mul(
        &self,
        a: NodeRef,
        b: NodeRef,
        result_size: usize,
        is_signed: bool,
    ) -> Result<Z3_ast> {
        let mut lhs = self.get_bitvec(a);
        let mut rhs = self.get_bitvec(b);
        let lhs_size = self.ops().get_bv_bit_count(lhs);
        let rhs_size = self.ops().get_bv_bit_count(rhs);

        let mut operand_size = lhs_size.max(rhs_size).max(result_size);
        unsafe {
            if is_signed {
                if lhs_size != operand_size {
                    lhs = Z3_mk_sign_ext(self.ctx, (operand_size - lhs_size) as c_uint, lhs);
                }
                if rhs_size != operand_size {
                    rhs = Z3_mk_sign_ext(self.ctx, (operand_size - rhs_size) as c_uint, rhs);
                }
            } else {
                // An extra 0 MSb leaves room for the unsigned carry.
                operand_size += 1;
                if lhs_size != operand_size {
                    lhs = Z3_mk_zero_ext(self.ctx, (operand_size - lhs_size) as c_uint, lhs);
                }
                if rhs_size != operand_size {
                    rhs = Z3_mk_zero_ext(self.ctx, (operand_size - rhs_size) as c_uint, rhs);
                }
            }
            let mut result = Z3_mk_bvmul(self.ctx, lhs, rhs);
            if operand_size != result_size {
                result = Z3_mk_extract(self.ctx, (result_size - 1) as c_uint, 0, result);
            }
            Ok(result)
        }
    }

    fn translate_literal(&self, ty: &Type, value: &IrValue) -> Result<Z3_ast> {
        match (ty, value) {
            (Type::Bits(width), IrValue::Bits(bits)) => {
                assert_eq!(*width, bits.bit_count());
                Ok(self.bv_numeral(bits))
            }
            (Type::Array(array_ty), IrValue::Array(elems)) => {
                let elements: Vec<Z3_ast> = elems
                    .iter()
                    .map(|e| self.translate_literal(&array_ty.element_type, e))
                    .collect::<Result<_>>()?;
                Ok(self.create_array(array_ty, &elements))
            }
            (Type::Tuple(element_types), IrValue::Tuple(elems)) => {
                let elements: Vec<Z3_ast> = element_types
                    .iter()
                    .zip(elems.iter())
                    .map(|(t, e)| self.translate_literal(t, e))
                    .collect::<Result<_>>()?;
                Ok(self.create_tuple(self.type_to_sort(ty), &elements))
            }
            (ty, value) => Err(Error::InvalidArgument(format!(
                "literal value {} does not match type {}",
                value, ty
            ))),
        }
    }

    fn bv_numeral(&self, bits: &IrBits) -> Z3_ast {
        let booleans: Vec<bool> = bits.iter_lsb_to_msb().collect();
        unsafe {
            Z3_mk_bv_numeral(self.ctx, booleans.len() as c_uint, booleans.as_ptr())
        }
    }

    // -- Floating-point helpers (IEEE-754 binary32 composition only).

    pub fn float_zero(&self, sort: Z3_sort) -> Z3_ast {
        unsafe { Z3_mk_fpa_zero(self.ctx, sort, /* negative= */ false) }
    }

    /// Replaces subnormal values with zero; fails unless `value` has a
    /// floating-point sort.
    pub fn float_flush_subnormal(&self, value: Z3_ast) -> Result<Z3_ast> {
        let sort = unsafe { Z3_get_sort(self.ctx, value) };
        let sort_kind = unsafe { Z3_get_sort_kind(self.ctx, sort) };
        if sort_kind != SortKind::FloatingPoint {
            return Err(Error::InvalidArgument(format!(
                "Wrong sort for floating-point operations: {:?}",
                sort_kind
            )));
        }
        let is_subnormal = unsafe { Z3_mk_fpa_is_subnormal(self.ctx, value) };
        Ok(unsafe { Z3_mk_ite(self.ctx, is_subnormal, self.float_zero(sort), value) })
    }

    /// Composes a single-precision float from sign/exponent/significand
    /// bit-vector terms of widths 1, 8, and 23.
    pub fn to_float32(&self, nodes: &[Z3_ast]) -> Result<Z3_ast> {
        if nodes.len() != 3 {
            return Err(Error::InvalidArgument(format!(
                "Incorrect number of arguments - need 3, got {}",
                nodes.len()
            )));
        }

        let get_fp_component = |index: usize, expected_width: usize| -> Result<Z3_ast> {
            let sort_kind = self.get_value_kind(nodes[index]);
            if sort_kind != SortKind::BV {
                return Err(Error::InvalidArgument(format!(
                    "Wrong sort for floating-point components: need bit-vector, got {:?}",
                    sort_kind
                )));
            }
            let bit_width = self.ops().get_bv_bit_count(nodes[index]);
            if bit_width != expected_width {
                return Err(Error::InvalidArgument(format!(
                    "Invalid width for FP component {}: got {}, need {}",
                    index, bit_width, expected_width
                )));
            }
            Ok(nodes[index])
        };

        let sign = get_fp_component(0, 1)?;
        let exponent = get_fp_component(1, 8)?;
        let significand = get_fp_component(2, 23)?;

        Ok(unsafe { Z3_mk_fpa_fp(self.ctx, sign, exponent, significand) })
    }

    /// Extracts three bit-vector fields from a tuple term and composes a
    /// single-precision float from them.
    pub fn tuple_to_float32(&self, tuple: Z3_ast) -> Result<Z3_ast> {
        let components: Vec<Z3_ast> = (0..3).map(|i| self.tuple_field(tuple, i)).collect();
        self.to_float32(&components)
    }
}

impl Drop for Translator<'_> {
    fn drop(&mut self) {
        if !self.borrowed_context {
            unsafe {
                Z3_del_context(self.ctx);
                if let Some(config) = self.config {
                    Z3_del_config(config);
                }
            }
        }
    }
}
