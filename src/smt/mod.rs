// SPDX-License-Identifier: Apache-2.0

//! Lowering of IR functions into Z3 formulas and proving predicates about
//! them.

pub mod error_handler;
pub mod ops;
pub mod prove;
pub mod translator;
