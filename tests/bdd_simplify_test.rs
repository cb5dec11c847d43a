// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios for the BDD-assisted simplification pass. Each
//! rewrite is additionally checked for soundness (the new return value is
//! provably equal to the old one) and idempotence (a second run changes
//! nothing).

use std::time::Duration;

use irprove::bdd::simplify::bdd_simplify;
use irprove::ir::{Binop, Fn, NaryOp, NodePayload, NodeRef, Type};
use irprove::ir_builder::FnBuilder;
use irprove::smt::prove::{try_prove, Predicate};
use irprove::value::{IrBits, IrValue};

use pretty_assertions::assert_eq;

const TIMEOUT: Duration = Duration::from_secs(10);

fn ret_node(f: &Fn) -> NodeRef {
    f.ret_node_ref.expect("function has a return node")
}

/// Proves the rewritten return value equal to the pre-rewrite return node
/// (which survives in the graph) and checks the pass is idempotent.
fn assert_sound_and_idempotent(f: &mut Fn, old_ret: NodeRef, split_ops: bool) {
    let new_ret = ret_node(f);
    assert!(
        try_prove(f, new_ret, Predicate::EqualToNode(old_ret), TIMEOUT).unwrap(),
        "rewrite must preserve the return value:\n{}",
        f
    );
    let before = f.to_string();
    assert!(!bdd_simplify(f, split_ops), "pass must be idempotent");
    assert_eq!(before, f.to_string());
}

#[test]
fn test_replace_all_known_values() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut fb = FnBuilder::new("all_known");
    let x = fb.param("x", Type::Bits(4));
    let y = fb.param("y", Type::Bits(4));
    let not_x = fb.not_(x);
    let x_or_not_x = fb.or_(&[x, not_x]);
    let not_y = fb.not_(y);
    let y_and_not_y = fb.and(&[y, not_y]);
    let out = fb.concat(&[x_or_not_x, y_and_not_y]);
    fb.ret(out);
    let mut f = fb.build();

    assert!(bdd_simplify(&mut f, true));

    match &f.get_node(ret_node(&f)).payload {
        NodePayload::Literal(IrValue::Bits(bits)) => {
            assert_eq!(*bits, IrBits::ubits(0b11110000, 8));
        }
        other => panic!("expected literal return, got {:?}", other),
    }
    assert_sound_and_idempotent(&mut f, out, true);
}

#[test]
fn test_replace_known_prefix() {
    let mut fb = FnBuilder::new("known_prefix");
    let x = fb.param("x", Type::Bits(16));
    let y = fb.param("y", Type::Bits(9));
    let zeros = fb.literal_ubits(0, 7);
    let padded = fb.concat(&[zeros, y]);
    let out = fb.and(&[x, padded]);
    fb.ret(out);
    let mut f = fb.build();

    assert!(bdd_simplify(&mut f, true));

    // and(x, concat(0, y)) becomes concat(lit(0, 7), bit_slice(and, 0, 9)).
    let ret = ret_node(&f);
    let NodePayload::Nary(NaryOp::Concat, ref parts) = f.get_node(ret).payload else {
        panic!("expected concat return, got {:?}", f.get_node(ret).payload);
    };
    assert_eq!(parts.len(), 2);
    match &f.get_node(parts[0]).payload {
        NodePayload::Literal(IrValue::Bits(bits)) => assert_eq!(*bits, IrBits::zero(7)),
        other => panic!("expected zero literal prefix, got {:?}", other),
    }
    match &f.get_node(parts[1]).payload {
        NodePayload::BitSlice { arg, start, width } => {
            assert_eq!(*arg, out);
            assert_eq!(*start, 0);
            assert_eq!(*width, 9);
        }
        other => panic!("expected bit_slice of the and node, got {:?}", other),
    }
    assert_sound_and_idempotent(&mut f, out, true);
}

#[test]
fn test_replace_known_suffix() {
    let mut fb = FnBuilder::new("known_suffix");
    let x = fb.param("x", Type::Bits(32));
    let y = fb.param("y", Type::Bits(31));
    let one = fb.literal_ubits(1, 1);
    let padded = fb.concat(&[y, one]);
    let out = fb.or_(&[x, padded]);
    fb.ret(out);
    let mut f = fb.build();

    assert!(bdd_simplify(&mut f, true));

    let ret = ret_node(&f);
    let NodePayload::Nary(NaryOp::Concat, ref parts) = f.get_node(ret).payload else {
        panic!("expected concat return, got {:?}", f.get_node(ret).payload);
    };
    assert_eq!(parts.len(), 2);
    match &f.get_node(parts[0]).payload {
        NodePayload::BitSlice { arg, start, width } => {
            assert_eq!(*arg, out);
            assert_eq!(*start, 1);
            assert_eq!(*width, 31);
        }
        other => panic!("expected bit_slice of the or node, got {:?}", other),
    }
    match &f.get_node(parts[1]).payload {
        NodePayload::Literal(IrValue::Bits(bits)) => assert_eq!(*bits, IrBits::ubits(1, 1)),
        other => panic!("expected one literal suffix, got {:?}", other),
    }
    assert_sound_and_idempotent(&mut f, out, true);
}

#[test]
fn test_known_suffix_not_replaced() {
    // The known suffix is already a concat-with-literal; rewriting would
    // reproduce the same expression, so the pass leaves it alone.
    let mut fb = FnBuilder::new("fixed_point");
    let x = fb.param("x", Type::Bits(32));
    let lit = fb.literal_ubits(123, 10);
    let out = fb.concat(&[x, lit]);
    fb.ret(out);
    let mut f = fb.build();

    let before = f.to_string();
    assert!(!bdd_simplify(&mut f, true));
    assert_eq!(before, f.to_string());
    assert_eq!(ret_node(&f), out);
}

#[test]
fn test_remove_redundant_one_hot() {
    // The three predicates are pairwise disjoint, so the priority masking
    // inside the one_hot is a no-op and it collapses to
    // concat(eq(input, 0), input); the ugt input survives untouched.
    let mut fb = FnBuilder::new("redundant_one_hot");
    let x = fb.param("x", Type::Bits(8));
    let zero = fb.literal_ubits(0, 8);
    let forty_two = fb.literal_ubits(42, 8);
    let many = fb.literal_ubits(123, 8);
    let x_eq_0 = fb.eq(x, zero);
    let x_eq_42 = fb.eq(x, forty_two);
    let x_gt_123 = fb.ugt(x, many);
    let packed = fb.concat(&[x_eq_0, x_eq_42, x_gt_123]);
    let out = fb.one_hot(packed, true);
    fb.ret(out);
    let mut f = fb.build();

    assert!(bdd_simplify(&mut f, true));

    let ret = ret_node(&f);
    let NodePayload::Nary(NaryOp::Concat, ref parts) = f.get_node(ret).payload else {
        panic!("expected concat return, got {:?}", f.get_node(ret).payload);
    };
    assert_eq!(parts.len(), 2);
    assert!(matches!(
        f.get_node(parts[0]).payload,
        NodePayload::Binop(Binop::Eq, _, _)
    ));
    assert_eq!(parts[1], packed);
    assert_sound_and_idempotent(&mut f, out, true);
}

#[test]
fn test_convert_two_way_one_hot_select() {
    let mut fb = FnBuilder::new("two_way_ohs");
    let p = fb.param("p", Type::Bits(1));
    let x = fb.param("x", Type::Bits(32));
    let y = fb.param("y", Type::Bits(32));
    let not_p = fb.not_(p);
    let selector = fb.concat(&[p, not_p]);
    let out = fb.one_hot_sel(selector, &[x, y]);
    fb.ret(out);
    let mut f = fb.build();

    assert!(bdd_simplify(&mut f, true));

    let ret = ret_node(&f);
    let NodePayload::Sel {
        selector: new_sel,
        ref cases,
        default,
    } = f.get_node(ret).payload
    else {
        panic!("expected sel return, got {:?}", f.get_node(ret).payload);
    };
    assert_eq!(default, None);
    assert_eq!(cases, &vec![y, x]);
    match &f.get_node(new_sel).payload {
        NodePayload::BitSlice { arg, start, width } => {
            assert_eq!(*arg, selector);
            assert_eq!(*start, 0);
            assert_eq!(*width, 1);
        }
        other => panic!("expected bit_slice selector, got {:?}", other),
    }
    assert_sound_and_idempotent(&mut f, out, true);
}

#[test]
fn test_select_chain_to_one_hot_select() {
    // Four exhaustive, disjoint equality predicates over a two-bit selector.
    let mut fb = FnBuilder::new("select_chain");
    let s = fb.param("s", Type::Bits(2));
    let x0 = fb.param("x0", Type::Bits(8));
    let x1 = fb.param("x1", Type::Bits(8));
    let x2 = fb.param("x2", Type::Bits(8));
    let x3 = fb.param("x3", Type::Bits(8));
    let y = fb.param("y", Type::Bits(8));
    let lits: Vec<NodeRef> = (0..4).map(|i| fb.literal_ubits(i, 2)).collect();
    let pred0 = fb.eq(s, lits[0]);
    let pred1 = fb.eq(s, lits[1]);
    let pred2 = fb.eq(s, lits[2]);
    let pred3 = fb.eq(s, lits[3]);
    let sel0 = fb.sel(pred0, &[y, x0], None);
    let sel1 = fb.sel(pred1, &[sel0, x1], None);
    let sel2 = fb.sel(pred2, &[sel1, x2], None);
    let out = fb.sel(pred3, &[sel2, x3], None);
    fb.ret(out);
    let mut f = fb.build();

    assert!(bdd_simplify(&mut f, true));

    let ret = ret_node(&f);
    let NodePayload::OneHotSel {
        selector,
        ref cases,
    } = f.get_node(ret).payload
    else {
        panic!("expected one_hot_sel return, got {:?}", f.get_node(ret).payload);
    };
    // The predicates are provably exhaustive so no guard bit is added; the
    // outermost predicate supplies the selector MSb.
    match &f.get_node(selector).payload {
        NodePayload::Nary(NaryOp::Concat, ops) => {
            assert_eq!(ops, &vec![pred3, pred2, pred1, pred0]);
        }
        other => panic!("expected concat selector, got {:?}", other),
    }
    assert_eq!(cases, &vec![x0, x1, x2, x3]);
    assert_sound_and_idempotent(&mut f, out, true);
}

#[test]
fn test_select_chain_with_non_exhaustive_predicates() {
    // Disjoint but non-exhaustive predicates get a nor() guard bit at the
    // selector LSb, selecting the chain's else value.
    let mut fb = FnBuilder::new("select_chain_guarded");
    let s = fb.param("s", Type::Bits(8));
    let x0 = fb.param("x0", Type::Bits(8));
    let x1 = fb.param("x1", Type::Bits(8));
    let x2 = fb.param("x2", Type::Bits(8));
    let y = fb.param("y", Type::Bits(8));
    let c42 = fb.literal_ubits(42, 8);
    let c11 = fb.literal_ubits(11, 8);
    let c7 = fb.literal_ubits(7, 8);
    let pred0 = fb.ugt(s, c42);
    let pred1 = fb.eq(s, c11);
    let pred2 = fb.ult(s, c7);
    let sel0 = fb.sel(pred0, &[y, x0], None);
    let sel1 = fb.sel(pred1, &[sel0, x1], None);
    let out = fb.sel(pred2, &[sel1, x2], None);
    fb.ret(out);
    let mut f = fb.build();

    assert!(bdd_simplify(&mut f, true));

    let ret = ret_node(&f);
    let NodePayload::OneHotSel {
        selector,
        ref cases,
    } = f.get_node(ret).payload
    else {
        panic!("expected one_hot_sel return, got {:?}", f.get_node(ret).payload);
    };
    let NodePayload::Nary(NaryOp::Concat, ref sel_ops) = f.get_node(selector).payload else {
        panic!("expected concat selector");
    };
    assert_eq!(sel_ops.len(), 4);
    assert_eq!(&sel_ops[..3], &[pred2, pred1, pred0]);
    match &f.get_node(sel_ops[3]).payload {
        NodePayload::Nary(NaryOp::Nor, nor_ops) => {
            assert_eq!(nor_ops, &vec![pred2, pred1, pred0]);
        }
        other => panic!("expected nor guard bit, got {:?}", other),
    }
    assert_eq!(cases, &vec![y, x0, x1, x2]);
    assert_sound_and_idempotent(&mut f, out, true);
}

#[test]
fn test_overlapping_predicates_block_chain_conversion() {
    // ult(s, 20) and ult(s, 10) overlap, so the chain must not convert.
    let mut fb = FnBuilder::new("overlapping_chain");
    let s = fb.param("s", Type::Bits(8));
    let x0 = fb.param("x0", Type::Bits(8));
    let x1 = fb.param("x1", Type::Bits(8));
    let y = fb.param("y", Type::Bits(8));
    let c20 = fb.literal_ubits(20, 8);
    let c10 = fb.literal_ubits(10, 8);
    let pred0 = fb.ult(s, c20);
    let pred1 = fb.ult(s, c10);
    let sel0 = fb.sel(pred0, &[y, x0], None);
    let out = fb.sel(pred1, &[sel0, x1], None);
    fb.ret(out);
    let mut f = fb.build();

    let before = f.to_string();
    assert!(!bdd_simplify(&mut f, true));
    assert_eq!(before, f.to_string());
}

#[test]
fn test_split_ops_false_disables_selector_rewrites() {
    // Same shape as the two-way one-hot-select test, but with split_ops off
    // the selector rewrite must not fire.
    let mut fb = FnBuilder::new("no_split_ops");
    let p = fb.param("p", Type::Bits(1));
    let x = fb.param("x", Type::Bits(32));
    let y = fb.param("y", Type::Bits(32));
    let not_p = fb.not_(p);
    let selector = fb.concat(&[p, not_p]);
    let out = fb.one_hot_sel(selector, &[x, y]);
    fb.ret(out);
    let mut f = fb.build();

    let before = f.to_string();
    assert!(!bdd_simplify(&mut f, false));
    assert_eq!(before, f.to_string());
}

#[test]
fn test_change_flag_false_on_opaque_function() {
    // Nothing is known about add(x, y), so nothing changes.
    let mut fb = FnBuilder::new("opaque");
    let x = fb.param("x", Type::Bits(8));
    let y = fb.param("y", Type::Bits(8));
    let out = fb.add(x, y);
    fb.ret(out);
    let mut f = fb.build();

    let before = f.to_string();
    assert!(!bdd_simplify(&mut f, true));
    assert_eq!(before, f.to_string());
}
