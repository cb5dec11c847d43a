// SPDX-License-Identifier: Apache-2.0

//! Predicate objectives and the solver-driving entry points.
//!
//! An objective is the negation of the predicate being proven: when the
//! solver reports the objective unsatisfiable, the predicate holds for all
//! inputs.

use std::ffi::CStr;
use std::time::Duration;

use z3_sys::*;

use crate::error::{Error, Result};
use crate::ir::{node_textual_id, Fn, NodeRef};
use crate::smt::error_handler::ScopedErrorHandler;
use crate::smt::ops::OpBuilder;
use crate::smt::translator::Translator;

/// A predicate about the value of an IR node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    EqualToZero,
    NotEqualToZero,
    EqualToNode(NodeRef),
}

impl Predicate {
    pub fn describe(&self, f: &Fn) -> String {
        match self {
            Predicate::EqualToZero => "eq zero".to_string(),
            Predicate::NotEqualToZero => "ne zero".to_string(),
            Predicate::EqualToNode(nr) => format!("eq {}", node_textual_id(f, *nr)),
        }
    }
}

/// Builds the boolean term whose unsatisfiability proves predicate `p` about
/// the term `a`.
pub fn predicate_to_objective(
    p: &Predicate,
    a: Z3_ast,
    translator: &Translator,
) -> Result<Z3_ast> {
    let seh = ScopedErrorHandler::new(translator.ctx());
    let t = OpBuilder::new(translator.ctx());
    // Note that if the predicate we want to prove is "equal to zero" we
    // return that "not equal to zero" is not satisfiable.
    let objective = match p {
        Predicate::EqualToZero => t.ne_zero_bool(a),
        Predicate::NotEqualToZero => t.eq_zero_bool(a),
        Predicate::EqualToNode(nr) => {
            let b = translator.get_translation(*nr)?;
            if translator.get_value_kind(b) != SortKind::BV {
                return Err(Error::InvalidArgument(format!(
                    "Cannot compare to non-bits-valued node: {:?}",
                    nr
                )));
            }
            t.ne_bool(a, b)
        }
    };
    seh.status()?;
    Ok(objective)
}

fn ast_to_string(ctx: Z3_context, ast: Z3_ast) -> String {
    unsafe {
        CStr::from_ptr(Z3_ast_to_string(ctx, ast))
            .to_string_lossy()
            .into_owned()
    }
}

/// Evaluates `node` under `model` (with completion) and prints the result.
pub fn query_node(ctx: Z3_context, model: Z3_model, node: Z3_ast) -> String {
    let mut node_eval: Z3_ast = std::ptr::null_mut();
    unsafe {
        Z3_model_eval(ctx, model, node, true, &mut node_eval);
    }
    ast_to_string(ctx, node_eval)
}

fn lbool_to_string(x: Z3_lbool) -> &'static str {
    if x == Z3_L_TRUE {
        "true"
    } else if x == Z3_L_FALSE {
        "false"
    } else if x == Z3_L_UNDEF {
        "undef"
    } else {
        "invalid"
    }
}

/// Runs a check on `solver` and renders the verdict (and model, when
/// satisfiable) as a human-readable string.
pub fn solver_result_to_string(ctx: Z3_context, solver: Z3_solver) -> String {
    let satisfiable = unsafe { Z3_solver_check(ctx, solver) };
    let mut result = format!(
        "Solver result; satisfiable: {}\n",
        lbool_to_string(satisfiable)
    );
    if satisfiable == Z3_L_TRUE {
        unsafe {
            let model = Z3_solver_get_model(ctx, solver);
            let model_str = CStr::from_ptr(Z3_model_to_string(ctx, model)).to_string_lossy();
            result.push_str(&format!("\n  Model:\n{}", model_str));
        }
    }
    result
}

/// Attempts to prove predicate `p` about `subject` within `timeout`.
///
/// Returns true iff the solver reports the objective unsatisfiable; a
/// satisfiable or unknown verdict (including an elapsed timeout) returns
/// false.
pub fn try_prove(f: &Fn, subject: NodeRef, p: Predicate, timeout: Duration) -> Result<bool> {
    let translator = Translator::encode(f)?;
    translator.set_timeout(timeout);
    let a = translator.get_translation(subject)?;
    if translator.get_value_kind(a) != SortKind::BV {
        return Err(Error::InvalidArgument(format!(
            "Cannot prove properties of non-bits-typed node: {}",
            node_textual_id(f, subject)
        )));
    }
    let objective = predicate_to_objective(&p, a, &translator)?;
    let ctx = translator.ctx();
    log::debug!(
        "proving '{}' about {}; objective:\n{}",
        p.describe(f),
        node_textual_id(f, subject),
        ast_to_string(ctx, objective)
    );
    let satisfiable = unsafe {
        let solver = Z3_mk_solver(ctx);
        Z3_solver_assert(ctx, solver, objective);
        Z3_solver_check(ctx, solver)
    };
    log::debug!("solver result; satisfiable: {}", lbool_to_string(satisfiable));

    // We posit the inverse of the predicate we want to check -- when that is
    // unsatisfiable, the predicate has been proven (there was no way found
    // that we could not satisfy its inverse).
    Ok(satisfiable == Z3_L_FALSE)
}

/// Proves two functions equivalent by encoding `rhs` into `lhs`'s context
/// with shared parameter terms and asserting the return values differ.
pub fn try_prove_fn_equiv(lhs: &Fn, rhs: &Fn, timeout: Duration) -> Result<bool> {
    if lhs.params.len() != rhs.params.len() {
        return Err(Error::InvalidArgument(format!(
            "parameter count mismatch: {} vs {}",
            lhs.params.len(),
            rhs.params.len()
        )));
    }
    for (l, r) in lhs.params.iter().zip(rhs.params.iter()) {
        if l.ty != r.ty {
            return Err(Error::InvalidArgument(format!(
                "parameter type mismatch: {} vs {}",
                l.ty, r.ty
            )));
        }
    }
    if lhs.ret_ty != rhs.ret_ty {
        return Err(Error::InvalidArgument(format!(
            "return type mismatch: {} vs {}",
            lhs.ret_ty, rhs.ret_ty
        )));
    }

    let lhs_translator = Translator::encode(lhs)?;
    lhs_translator.set_timeout(timeout);
    let param_terms: Vec<Z3_ast> = lhs
        .params
        .iter()
        .map(|p| {
            let nr = lhs.get_param_node_ref(p.id).ok_or_else(|| {
                Error::NotFound(format!("no GetParam node for parameter '{}'", p.name))
            })?;
            lhs_translator.get_translation(nr)
        })
        .collect::<Result<_>>()?;

    let ctx = lhs_translator.ctx();
    let rhs_translator = Translator::encode_with_context(ctx, rhs, &param_terms)?;

    let seh = ScopedErrorHandler::new(ctx);
    let t = OpBuilder::new(ctx);
    let objective = t.ne_bool(
        lhs_translator.get_return_term()?,
        rhs_translator.get_return_term()?,
    );
    let satisfiable = unsafe {
        let solver = Z3_mk_solver(ctx);
        Z3_solver_assert(ctx, solver, objective);
        Z3_solver_check(ctx, solver)
    };
    seh.status()?;
    log::debug!(
        "equivalence of '{}' and '{}': satisfiable={}",
        lhs.name,
        rhs.name,
        lbool_to_string(satisfiable)
    );
    Ok(satisfiable == Z3_L_FALSE)
}
