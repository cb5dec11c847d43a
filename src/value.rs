// SPDX-License-Identifier: Apache-2.0

//! Literal values carried by IR nodes: arbitrary-width bit strings and
//! aggregates thereof.

use crate::ir::Type;

/// An arbitrary-width bit string. Index 0 is the least-significant bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IrBits {
    bits: Vec<bool>,
}

impl IrBits {
    pub fn new(bits: Vec<bool>) -> Self {
        IrBits { bits }
    }

    /// Makes a `width`-bit value holding `value`; asserts the value fits.
    pub fn ubits(value: u64, width: usize) -> Self {
        if width < 64 {
            assert!(
                value < (1u64 << width),
                "value {} does not fit in {} bits",
                value,
                width
            );
        }
        let bits = (0..width).map(|i| (value >> i) & 1 == 1).collect();
        IrBits { bits }
    }

    pub fn zero(width: usize) -> Self {
        IrBits {
            bits: vec![false; width],
        }
    }

    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    /// Returns the bit at index `i` where index 0 is the LSb.
    pub fn get_bit(&self, i: usize) -> bool {
        self.bits[i]
    }

    pub fn iter_lsb_to_msb(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    /// Returns the value as a `u64` if it fits, i.e. the width is <= 64.
    pub fn to_u64(&self) -> Option<u64> {
        if self.bits.len() > 64 {
            return None;
        }
        let mut accum = 0u64;
        for (i, bit) in self.bits.iter().enumerate() {
            if *bit {
                accum |= 1u64 << i;
            }
        }
        Some(accum)
    }
}

impl std::fmt::Display for IrBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_u64() {
            Some(v) => write!(f, "{}", v),
            None => {
                write!(f, "0b")?;
                for bit in self.bits.iter().rev() {
                    write!(f, "{}", if *bit { 1 } else { 0 })?;
                }
                Ok(())
            }
        }
    }
}

/// A literal value of any IR type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrValue {
    Bits(IrBits),
    Array(Vec<IrValue>),
    Tuple(Vec<IrValue>),
}

impl IrValue {
    pub fn ubits(value: u64, width: usize) -> Self {
        IrValue::Bits(IrBits::ubits(value, width))
    }

    /// Computes the type of this value; array element types are taken from the
    /// first element, so empty arrays cannot be typed this way.
    pub fn ty(&self) -> Type {
        match self {
            IrValue::Bits(b) => Type::Bits(b.bit_count()),
            IrValue::Array(elems) => {
                assert!(!elems.is_empty(), "cannot infer the type of an empty array");
                Type::new_array(elems[0].ty(), elems.len())
            }
            IrValue::Tuple(elems) => {
                Type::Tuple(elems.iter().map(|e| Box::new(e.ty())).collect())
            }
        }
    }
}

impl std::fmt::Display for IrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IrValue::Bits(b) => write!(f, "{}", b),
            IrValue::Array(elems) => {
                write!(f, "[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            IrValue::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
        }
    }
}
