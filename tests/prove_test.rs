// SPDX-License-Identifier: Apache-2.0

//! Tests for the predicate objectives and the `try_prove` /
//! `try_prove_fn_equiv` drivers.

use std::time::Duration;

use irprove::error::Error;
use irprove::ir::Type;
use irprove::ir_builder::FnBuilder;
use irprove::smt::ops::OpBuilder;
use irprove::smt::prove::{
    predicate_to_objective, query_node, solver_result_to_string, try_prove, try_prove_fn_equiv,
    Predicate,
};
use irprove::smt::translator::Translator;

use z3_sys::{Z3_mk_solver, Z3_solver_assert, Z3_solver_get_model};

const TIMEOUT: Duration = Duration::from_secs(1);

#[test]
fn test_or_with_complement_is_all_ones() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut fb = FnBuilder::new("f");
    let x = fb.param("x", Type::Bits(8));
    let inv = fb.not_(x);
    let out = fb.or_(&[x, inv]);
    let all_ones = fb.literal_ubits(0xff, 8);
    fb.ret(out);
    let f = fb.build();

    assert!(
        try_prove(&f, out, Predicate::EqualToNode(all_ones), TIMEOUT).unwrap(),
        "x | ~x is always 0xff"
    );
    assert!(
        !try_prove(&f, out, Predicate::EqualToZero, TIMEOUT).unwrap(),
        "x | ~x is never zero"
    );
    assert!(
        try_prove(&f, out, Predicate::NotEqualToZero, TIMEOUT).unwrap(),
        "x | ~x is always nonzero"
    );
}

#[test]
fn test_and_with_complement_is_zero() {
    let mut fb = FnBuilder::new("f");
    let x = fb.param("x", Type::Bits(8));
    let inv = fb.not_(x);
    let out = fb.and(&[x, inv]);
    fb.ret(out);
    let f = fb.build();

    assert!(try_prove(&f, out, Predicate::EqualToZero, TIMEOUT).unwrap());
    assert!(!try_prove(&f, out, Predicate::NotEqualToZero, TIMEOUT).unwrap());
}

#[test]
fn test_predicate_descriptions() {
    let mut fb = FnBuilder::new("f");
    let x = fb.param("x", Type::Bits(4));
    fb.ret(x);
    let f = fb.build();

    assert_eq!(Predicate::EqualToZero.describe(&f), "eq zero");
    assert_eq!(Predicate::NotEqualToZero.describe(&f), "ne zero");
    assert_eq!(Predicate::EqualToNode(x).describe(&f), "eq x");
}

#[test]
fn test_non_bits_subject_is_invalid() {
    let mut fb = FnBuilder::new("f");
    let a = fb.param("a", Type::Bits(4));
    let b = fb.param("b", Type::Bits(4));
    let t = fb.tuple(&[a, b]);
    fb.ret(t);
    let f = fb.build();

    match try_prove(&f, t, Predicate::EqualToZero, TIMEOUT) {
        Err(Error::InvalidArgument(msg)) => {
            assert!(msg.contains("non-bits-typed node"), "got: {}", msg)
        }
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
}

#[test]
fn test_equal_to_non_bits_node_is_invalid() {
    let mut fb = FnBuilder::new("f");
    let a = fb.param("a", Type::Bits(4));
    let b = fb.param("b", Type::Bits(4));
    let t = fb.tuple(&[a, b]);
    let out = fb.add(a, b);
    fb.ret(out);
    let f = fb.build();

    match try_prove(&f, out, Predicate::EqualToNode(t), TIMEOUT) {
        Err(Error::InvalidArgument(msg)) => {
            assert!(msg.contains("non-bits-valued node"), "got: {}", msg)
        }
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
}

#[test]
fn test_unknown_node_is_not_found() {
    let mut fb = FnBuilder::new("f");
    let x = fb.param("x", Type::Bits(4));
    fb.ret(x);
    let f = fb.build();

    let bogus = irprove::ir::NodeRef { index: 9999 };
    match try_prove(&f, x, Predicate::EqualToNode(bogus), TIMEOUT) {
        Err(Error::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_fn_equivalence_via_borrowed_context() {
    let build = |name: &str, swap: bool, subtract: bool| {
        let mut fb = FnBuilder::new(name);
        let x = fb.param("x", Type::Bits(16));
        let y = fb.param("y", Type::Bits(16));
        let (a, b) = if swap { (y, x) } else { (x, y) };
        let out = if subtract { fb.sub(a, b) } else { fb.add(a, b) };
        fb.ret(out);
        fb.build()
    };

    let f = build("f", false, false);
    let g = build("g", true, false);
    let h = build("h", false, true);

    // Addition commutes; subtraction does not match addition.
    assert!(try_prove_fn_equiv(&f, &g, TIMEOUT).unwrap());
    assert!(!try_prove_fn_equiv(&f, &h, TIMEOUT).unwrap());
}

#[test]
fn test_fn_equivalence_signature_mismatch() {
    let mut fb = FnBuilder::new("f");
    let x = fb.param("x", Type::Bits(16));
    fb.ret(x);
    let f = fb.build();

    let mut gb = FnBuilder::new("g");
    let y = gb.param("y", Type::Bits(8));
    gb.ret(y);
    let g = gb.build();

    match try_prove_fn_equiv(&f, &g, TIMEOUT) {
        Err(Error::InvalidArgument(msg)) => {
            assert!(msg.contains("parameter type mismatch"), "got: {}", msg)
        }
        other => panic!("expected InvalidArgument, got {:?}", other),
    }
}

#[test]
fn test_solver_diagnostics_render_model() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut fb = FnBuilder::new("f");
    let x = fb.param("x", Type::Bits(8));
    fb.ret(x);
    let f = fb.build();

    let translator = Translator::encode(&f).unwrap();
    let a = translator.get_translation(x).unwrap();
    // "x != 0" is satisfiable, so the diagnostics include a model.
    let objective = predicate_to_objective(&Predicate::EqualToZero, a, &translator).unwrap();
    let ctx = translator.ctx();
    unsafe {
        let solver = Z3_mk_solver(ctx);
        Z3_solver_assert(ctx, solver, objective);
        let rendered = solver_result_to_string(ctx, solver);
        assert!(rendered.contains("satisfiable: true"), "got: {}", rendered);
        assert!(rendered.contains("Model:"), "got: {}", rendered);

        let model = Z3_solver_get_model(ctx, solver);
        let value = query_node(ctx, model, a);
        assert!(!value.is_empty());
    }
}

#[test]
fn test_objective_shapes_are_boolean() {
    // Objectives must be first-class booleans so they can be asserted.
    let mut fb = FnBuilder::new("f");
    let x = fb.param("x", Type::Bits(8));
    fb.ret(x);
    let f = fb.build();

    let translator = Translator::encode(&f).unwrap();
    let a = translator.get_translation(x).unwrap();
    let ops = OpBuilder::new(translator.ctx());
    // The bit-vector comparison forms stay bit-vectors...
    assert_eq!(
        translator.get_value_kind(ops.eq(a, a)),
        z3_sys::SortKind::BV
    );
    // ...while the *_bool forms are booleans.
    assert_eq!(
        translator.get_value_kind(ops.eq_zero_bool(a)),
        z3_sys::SortKind::Bool
    );
    assert_eq!(
        translator.get_value_kind(ops.ne_bool(a, a)),
        z3_sys::SortKind::Bool
    );
}
