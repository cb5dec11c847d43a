// SPDX-License-Identifier: Apache-2.0

//! BDD abstractions of IR node bits and the simplification pass built on
//! them.

pub mod engine;
pub mod simplify;
