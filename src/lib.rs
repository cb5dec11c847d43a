// SPDX-License-Identifier: Apache-2.0

//! Formal-verification and simplification core for a typed bit-vector IR:
//! an SMT encoder that lowers IR functions to Z3 formulas (with a
//! `try_prove` driver on top), and a BDD-assisted pass that folds
//! statically-known bits and narrows one-hot selector structures.

pub mod abstract_eval;
pub mod bdd;
pub mod error;
pub mod ir;
pub mod ir_builder;
pub mod ir_utils;
pub mod smt;
pub mod value;
