// SPDX-License-Identifier: Apache-2.0

//! An abstract evaluator over single-bit logic.
//!
//! Implementors supply only the primitive capability set (`one`, `zero`,
//! `not`, `and`, `or`); every other operation is provided in terms of those
//! primitives. Bit lists are ordered least-significant-bit first.
//!
//! The SMT encoder instantiates the evaluator over 1-bit solver terms and the
//! BDD engine instantiates it over BDD node references, so the lowering of
//! ops like one-hot and select is written exactly once.

use crate::value::IrBits;

pub trait AbstractEvaluator {
    type Elem: Clone;

    fn one(&self) -> Self::Elem;
    fn zero(&self) -> Self::Elem;
    fn not(&self, a: &Self::Elem) -> Self::Elem;
    fn and(&self, a: &Self::Elem, b: &Self::Elem) -> Self::Elem;
    fn or(&self, a: &Self::Elem, b: &Self::Elem) -> Self::Elem;

    // -- Derived single-bit operations.

    fn xor(&self, a: &Self::Elem, b: &Self::Elem) -> Self::Elem {
        self.or(
            &self.and(a, &self.not(b)),
            &self.and(&self.not(a), b),
        )
    }

    fn xnor(&self, a: &Self::Elem, b: &Self::Elem) -> Self::Elem {
        self.not(&self.xor(a, b))
    }

    /// Returns `on_true` when `sel` is set, `on_false` otherwise.
    fn mux_bit(&self, sel: &Self::Elem, on_true: &Self::Elem, on_false: &Self::Elem) -> Self::Elem {
        self.or(
            &self.and(sel, on_true),
            &self.and(&self.not(sel), on_false),
        )
    }

    // -- Bit-vector constructors.

    fn literal_bits(&self, bits: &IrBits) -> Vec<Self::Elem> {
        bits.iter_lsb_to_msb()
            .map(|b| if b { self.one() } else { self.zero() })
            .collect()
    }

    // -- Bitwise vector operations.

    fn bitwise_not(&self, a: &[Self::Elem]) -> Vec<Self::Elem> {
        a.iter().map(|bit| self.not(bit)).collect()
    }

    fn bitwise_and(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Vec<Self::Elem> {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter()).map(|(x, y)| self.and(x, y)).collect()
    }

    fn bitwise_or(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Vec<Self::Elem> {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter()).map(|(x, y)| self.or(x, y)).collect()
    }

    fn bitwise_xor(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Vec<Self::Elem> {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter()).map(|(x, y)| self.xor(x, y)).collect()
    }

    // -- Bit reductions.

    fn and_reduce(&self, a: &[Self::Elem]) -> Self::Elem {
        a.iter()
            .fold(self.one(), |accum, bit| self.and(&accum, bit))
    }

    fn or_reduce(&self, a: &[Self::Elem]) -> Self::Elem {
        a.iter()
            .fold(self.zero(), |accum, bit| self.or(&accum, bit))
    }

    fn xor_reduce(&self, a: &[Self::Elem]) -> Self::Elem {
        a.iter()
            .fold(self.zero(), |accum, bit| self.xor(&accum, bit))
    }

    // -- Comparisons. All return a single bit.

    fn eq(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        assert_eq!(a.len(), b.len());
        let per_bit: Vec<Self::Elem> = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| self.xnor(x, y))
            .collect();
        self.and_reduce(&per_bit)
    }

    fn ne(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        self.not(&self.eq(a, b))
    }

    fn ult(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        assert_eq!(a.len(), b.len());
        // Scan from the MSb: a < b at the first differing bit position.
        let mut result = self.zero();
        let mut eq_so_far = self.one();
        for (x, y) in a.iter().zip(b.iter()).rev() {
            let lt_here = self.and(&self.not(x), y);
            result = self.or(&result, &self.and(&eq_so_far, &lt_here));
            eq_so_far = self.and(&eq_so_far, &self.xnor(x, y));
        }
        result
    }

    fn ule(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        self.or(&self.ult(a, b), &self.eq(a, b))
    }

    fn ugt(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        self.not(&self.ule(a, b))
    }

    fn uge(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        self.not(&self.ult(a, b))
    }

    fn slt(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        assert_eq!(a.len(), b.len());
        assert!(!a.is_empty(), "signed comparison requires at least one bit");
        let sa = &a[a.len() - 1];
        let sb = &b[b.len() - 1];
        // Negative < non-negative; with equal signs the unsigned order agrees.
        let sign_differs_lt = self.and(sa, &self.not(sb));
        let same_sign_lt = self.and(&self.xnor(sa, sb), &self.ult(a, b));
        self.or(&sign_differs_lt, &same_sign_lt)
    }

    fn sle(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        self.or(&self.slt(a, b), &self.eq(a, b))
    }

    fn sgt(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        self.not(&self.sle(a, b))
    }

    fn sge(&self, a: &[Self::Elem], b: &[Self::Elem]) -> Self::Elem {
        self.not(&self.slt(a, b))
    }

    // -- Structured ops.

    fn reverse(&self, a: &[Self::Elem]) -> Vec<Self::Elem> {
        a.iter().rev().cloned().collect()
    }

    /// Lowers a one-hot: result bit i is set iff input bit i is set and no
    /// higher-priority bit is set; the extra MSb is set iff no input bit is
    /// set. `lsb_prio` gives priority to lower bit indices.
    fn one_hot(&self, a: &[Self::Elem], lsb_prio: bool) -> Vec<Self::Elem> {
        let w = a.len();
        let mut out = vec![self.zero(); w + 1];
        let mut none_prior = self.one();
        let order: Vec<usize> = if lsb_prio {
            (0..w).collect()
        } else {
            (0..w).rev().collect()
        };
        for i in order {
            out[i] = self.and(&a[i], &none_prior);
            none_prior = self.and(&none_prior, &self.not(&a[i]));
        }
        out[w] = none_prior;
        out
    }

    /// Lowers an encode: output bit j is the OR of all input bits whose index
    /// has bit j set.
    fn encode(&self, a: &[Self::Elem], result_width: usize) -> Vec<Self::Elem> {
        let mut out = Vec::with_capacity(result_width);
        for j in 0..result_width {
            let contributors: Vec<Self::Elem> = a
                .iter()
                .enumerate()
                .filter(|(i, _)| (i >> j) & 1 == 1)
                .map(|(_, bit)| bit.clone())
                .collect();
            out.push(self.or_reduce(&contributors));
        }
        out
    }

    /// The condition under which an indexed select picks case `i`: the
    /// selector bits spell out `i`.
    fn case_condition(&self, selector: &[Self::Elem], i: usize) -> Self::Elem {
        let per_bit: Vec<Self::Elem> = selector
            .iter()
            .enumerate()
            .map(|(j, bit)| {
                if (i >> j) & 1 == 1 {
                    bit.clone()
                } else {
                    self.not(bit)
                }
            })
            .collect();
        self.and_reduce(&per_bit)
    }

    /// Lowers an indexed select. A selector value beyond the case count picks
    /// the default, which must be present exactly when such values exist.
    fn select(
        &self,
        selector: &[Self::Elem],
        cases: &[Vec<Self::Elem>],
        default: Option<Vec<Self::Elem>>,
    ) -> Vec<Self::Elem> {
        assert!(!cases.is_empty());
        let width = cases[0].len();
        let mut result = match default {
            Some(d) => {
                assert_eq!(d.len(), width);
                d
            }
            None => vec![self.zero(); width],
        };
        for (i, case) in cases.iter().enumerate() {
            assert_eq!(case.len(), width);
            let cond = self.case_condition(selector, i);
            result = result
                .iter()
                .zip(case.iter())
                .map(|(r, c)| self.mux_bit(&cond, c, r))
                .collect();
        }
        result
    }

    /// Lowers a one-hot select: the OR of each case masked by its selector
    /// bit. Callers guarantee whether an all-zeros selector is possible; the
    /// lowering is the same either way.
    fn one_hot_select(
        &self,
        selector: &[Self::Elem],
        cases: &[Vec<Self::Elem>],
        _selector_can_be_zero: bool,
    ) -> Vec<Self::Elem> {
        assert_eq!(selector.len(), cases.len());
        assert!(!cases.is_empty());
        let width = cases[0].len();
        let mut result = vec![self.zero(); width];
        for (sel_bit, case) in selector.iter().zip(cases.iter()) {
            assert_eq!(case.len(), width);
            result = result
                .iter()
                .zip(case.iter())
                .map(|(r, c)| self.or(r, &self.and(sel_bit, c)))
                .collect();
        }
        result
    }
}

/// Concrete boolean instantiation, used for unit testing the lowerings.
pub struct BoolEvaluator;

impl AbstractEvaluator for BoolEvaluator {
    type Elem = bool;

    fn one(&self) -> bool {
        true
    }

    fn zero(&self) -> bool {
        false
    }

    fn not(&self, a: &bool) -> bool {
        !a
    }

    fn and(&self, a: &bool, b: &bool) -> bool {
        *a && *b
    }

    fn or(&self, a: &bool, b: &bool) -> bool {
        *a || *b
    }
}
