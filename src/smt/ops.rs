// SPDX-License-Identifier: Apache-2.0

//! Convenience layer over Z3's bit-vector constructors.
//!
//! Comparison helpers return 1-bit bit-vectors so they compose with other
//! bit-vector operations; the `*_bool` variants build first-class booleans
//! for use in solver assertions.

use std::ffi::CString;
use std::os::raw::c_uint;

use z3_sys::*;

#[derive(Clone, Copy)]
pub struct OpBuilder {
    ctx: Z3_context,
}

impl OpBuilder {
    pub fn new(ctx: Z3_context) -> Self {
        OpBuilder { ctx }
    }

    pub fn ctx(&self) -> Z3_context {
        self.ctx
    }

    pub fn sub(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_bvsub(self.ctx, lhs, rhs) }
    }

    pub fn and(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_bvand(self.ctx, lhs, rhs) }
    }

    pub fn or(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_bvor(self.ctx, lhs, rhs) }
    }

    pub fn xor(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_bvxor(self.ctx, lhs, rhs) }
    }

    pub fn not(&self, arg: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_bvnot(self.ctx, arg) }
    }

    pub fn reduce_or(&self, arg: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_bvredor(self.ctx, arg) }
    }

    pub fn reduce_and(&self, arg: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_bvredand(self.ctx, arg) }
    }

    pub fn eq_zero(&self, arg: Z3_ast) -> Z3_ast {
        self.not(self.reduce_or(arg))
    }

    pub fn eq(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        self.eq_zero(self.xor(lhs, rhs))
    }

    pub fn zext_by_1b(&self, arg: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_zero_ext(self.ctx, 1, arg) }
    }

    pub fn sext_by_1b(&self, arg: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_sign_ext(self.ctx, 1, arg) }
    }

    pub fn extract_bit(&self, arg: Z3_ast, bitno: usize) -> Z3_ast {
        unsafe { Z3_mk_extract(self.ctx, bitno as c_uint, bitno as c_uint, arg) }
    }

    pub fn get_bv_bit_count(&self, arg: Z3_ast) -> usize {
        unsafe {
            let sort = Z3_get_sort(self.ctx, arg);
            Z3_get_bv_sort_size(self.ctx, sort) as usize
        }
    }

    /// Explodes the bits of `arg` such that the LSb is at index 0 of the
    /// returned vector.
    pub fn explode_bits(&self, arg: Z3_ast) -> Vec<Z3_ast> {
        let bit_count = self.get_bv_bit_count(arg);
        (0..bit_count).map(|i| self.extract_bit(arg, i)).collect()
    }

    pub fn msb(&self, arg: Z3_ast) -> Z3_ast {
        let bit_count = self.get_bv_bit_count(arg);
        self.extract_bit(arg, bit_count - 1)
    }

    /// Concatenates such that `args[0]` supplies the most significant bits
    /// and the last element supplies the least significant bits.
    pub fn concat_n(&self, args: &[Z3_ast]) -> Z3_ast {
        assert!(!args.is_empty(), "concat_n requires at least one element");
        let mut accum = args[0];
        for arg in &args[1..] {
            accum = unsafe { Z3_mk_concat(self.ctx, accum, *arg) };
        }
        accum
    }

    /// Whether lhs < rhs, determined by zero-extending both values and
    /// testing whether lhs - rhs underflows.
    pub fn ult(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        self.msb(self.sub(self.zext_by_1b(lhs), self.zext_by_1b(rhs)))
    }

    pub fn slt(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        self.msb(self.sub(self.sext_by_1b(lhs), self.sext_by_1b(rhs)))
    }

    pub fn min(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        unsafe {
            let lt = Z3_mk_bvult(self.ctx, lhs, rhs);
            Z3_mk_ite(self.ctx, lt, lhs, rhs)
        }
    }

    /// Returns a bit vector filled with `bit_count` digits of `value`.
    pub fn fill(&self, value: bool, bit_count: usize) -> Z3_ast {
        let bits = vec![value; bit_count];
        unsafe { Z3_mk_bv_numeral(self.ctx, bit_count as c_uint, bits.as_ptr()) }
    }

    pub fn eq_zero_bool(&self, arg: Z3_ast) -> Z3_ast {
        let bits = self.get_bv_bit_count(arg);
        unsafe { Z3_mk_eq(self.ctx, arg, self.fill(false, bits)) }
    }

    pub fn ne_zero_bool(&self, arg: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_not(self.ctx, self.eq_zero_bool(arg)) }
    }

    pub fn ne_bool(&self, lhs: Z3_ast, rhs: Z3_ast) -> Z3_ast {
        unsafe { Z3_mk_not(self.ctx, Z3_mk_eq(self.ctx, lhs, rhs)) }
    }

    /// Makes a fresh bit-vector constant of the given width.
    pub fn make_bv_param(&self, bit_count: usize, name: &str) -> Z3_ast {
        let cname = CString::new(name).expect("param name must not contain NUL");
        unsafe {
            let sort = Z3_mk_bv_sort(self.ctx, bit_count as c_uint);
            let symbol = Z3_mk_string_symbol(self.ctx, cname.as_ptr());
            Z3_mk_const(self.ctx, symbol, sort)
        }
    }
}
