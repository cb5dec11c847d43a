// SPDX-License-Identifier: Apache-2.0

//! BDD-assisted simplification.
//!
//! A single pass in topological order over a function: statically-known bits
//! are folded to literals or spliced out as literal prefixes/suffixes,
//! one-hots with provably dead or provably disjoint inputs are narrowed, and
//! chains of two-way selects with disjoint predicates become one-hot
//! selects. Each node is rewritten at most once and every rewrite preserves
//! the function's behavior bit-for-bit.
//!
//! The pass leaves orphaned nodes behind for the caller's dead-code
//! elimination; guards below keep it idempotent in their presence.

use bdd_rs::reference::Ref;

use crate::bdd::engine::{BddEngine, KnownBit};
use crate::ir::{Binop, Fn, NaryOp, Node, NodePayload, NodeRef, Type};
use crate::ir_utils::{get_topological, operands, replace_uses_below};
use crate::value::{IrBits, IrValue};

/// Runs the simplification over `f`, rewriting in place. `split_ops` enables
/// the selector-shape rewrites (select-chain conversion and two-way one-hot
/// select narrowing). Returns whether anything changed.
pub fn bdd_simplify(f: &mut Fn, split_ops: bool) -> bool {
    let engine = BddEngine::build(f);
    let order = get_topological(f);
    let mut changed = false;
    for nr in order {
        changed |= simplify_node(f, &engine, nr, split_ops);
    }
    changed
}

fn simplify_node(f: &mut Fn, engine: &BddEngine, nr: NodeRef, split_ops: bool) -> bool {
    let width = match f.get_node_ty(nr) {
        Type::Bits(w) => *w,
        _ => return false,
    };
    if width == 0 {
        return false;
    }
    // Literals are already as simple as they get, and rewriting a node
    // nothing observes would churn forever on pass-created orphans.
    if matches!(f.get_node(nr).payload, NodePayload::Literal(_)) {
        return false;
    }
    if f.ret_node_ref != Some(nr) && !has_users(f, nr) {
        return false;
    }

    let Some(known) = engine.known_bits(nr) else {
        return false;
    };

    // (1) A node whose every output bit is known becomes a literal.
    if known.iter().all(|k| *k != KnownBit::Unknown) {
        let value = known_to_bits(&known);
        log::debug!(
            "bdd_simplify: folding {} to literal {}",
            crate::ir::node_textual_id(f, nr),
            value
        );
        let prefix_len = f.nodes.len();
        let lit = push_node(
            f,
            Type::Bits(width),
            NodePayload::Literal(IrValue::Bits(value)),
        );
        replace_uses_below(f, nr, lit, prefix_len);
        return true;
    }

    // (2) Known contiguous prefixes/suffixes are spliced out as literals
    // concatenated with a slice of the original node.
    let k_hi = known
        .iter()
        .rev()
        .take_while(|k| **k != KnownBit::Unknown)
        .count();
    let k_lo = known
        .iter()
        .take_while(|k| **k != KnownBit::Unknown)
        .count();
    if k_hi > 0 {
        let prefix = known_to_bits(&known[width - k_hi..]);
        if !concat_edge_matches(f, nr, /* msb_edge= */ true, &prefix)
            && !(f.ret_node_ref != Some(nr)
                && all_users_are_slice(f, nr, 0, width - k_hi))
        {
            log::debug!(
                "bdd_simplify: splicing known {}-bit prefix out of {}",
                k_hi,
                crate::ir::node_textual_id(f, nr)
            );
            let prefix_len = f.nodes.len();
            let lit = push_node(
                f,
                Type::Bits(k_hi),
                NodePayload::Literal(IrValue::Bits(prefix)),
            );
            let slice = push_node(
                f,
                Type::Bits(width - k_hi),
                NodePayload::BitSlice {
                    arg: nr,
                    start: 0,
                    width: width - k_hi,
                },
            );
            let concat = push_node(
                f,
                Type::Bits(width),
                NodePayload::Nary(NaryOp::Concat, vec![lit, slice]),
            );
            replace_uses_below(f, nr, concat, prefix_len);
            return true;
        }
    }
    if k_lo > 0 {
        let suffix = known_to_bits(&known[..k_lo]);
        if !concat_edge_matches(f, nr, /* msb_edge= */ false, &suffix)
            && !(f.ret_node_ref != Some(nr)
                && all_users_are_slice(f, nr, k_lo, width - k_lo))
        {
            log::debug!(
                "bdd_simplify: splicing known {}-bit suffix out of {}",
                k_lo,
                crate::ir::node_textual_id(f, nr)
            );
            let prefix_len = f.nodes.len();
            let slice = push_node(
                f,
                Type::Bits(width - k_lo),
                NodePayload::BitSlice {
                    arg: nr,
                    start: k_lo,
                    width: width - k_lo,
                },
            );
            let lit = push_node(
                f,
                Type::Bits(k_lo),
                NodePayload::Literal(IrValue::Bits(suffix)),
            );
            let concat = push_node(
                f,
                Type::Bits(width),
                NodePayload::Nary(NaryOp::Concat, vec![slice, lit]),
            );
            replace_uses_below(f, nr, concat, prefix_len);
            return true;
        }
    }

    // (3) One-hot rewrites.
    if let NodePayload::OneHot { arg, lsb_prio } = f.get_node(nr).payload {
        if simplify_one_hot(f, engine, nr, arg, lsb_prio) {
            return true;
        }
    }

    if !split_ops {
        return false;
    }

    // (4) A two-way one-hot select with a provably exactly-one-hot selector
    // is an ordinary select on the low selector bit.
    let two_way_ohs = match &f.get_node(nr).payload {
        NodePayload::OneHotSel { selector, cases } if cases.len() == 2 => {
            Some((*selector, cases.clone()))
        }
        _ => None,
    };
    if let Some((selector, cases)) = two_way_ohs {
        if let Some(sel_bits) = engine.node_bits(selector) {
            if sel_bits.len() == 2
                && engine.and_is_zero(sel_bits[0], sel_bits[1])
                && engine.or_is_one(sel_bits)
            {
                log::debug!(
                    "bdd_simplify: narrowing two-way one_hot_sel {}",
                    crate::ir::node_textual_id(f, nr)
                );
                let node_ty = f.get_node_ty(nr).clone();
                let prefix_len = f.nodes.len();
                let slice = push_node(
                    f,
                    Type::Bits(1),
                    NodePayload::BitSlice {
                        arg: selector,
                        start: 0,
                        width: 1,
                    },
                );
                let sel = push_node(
                    f,
                    node_ty,
                    NodePayload::Sel {
                        selector: slice,
                        cases: vec![cases[1], cases[0]],
                        default: None,
                    },
                );
                replace_uses_below(f, nr, sel, prefix_len);
                return true;
            }
        }
    }

    // (5) Chains of two-way selects with pairwise-disjoint predicates become
    // a single one-hot select.
    try_select_chain(f, engine, nr)
}

fn simplify_one_hot(
    f: &mut Fn,
    engine: &BddEngine,
    nr: NodeRef,
    arg: NodeRef,
    lsb_prio: bool,
) -> bool {
    let Some(arg_bits) = engine.node_bits(arg) else {
        return false;
    };
    let w_in = arg_bits.len();
    if w_in < 2 {
        return false;
    }
    let bdd = engine.bdd();

    // An input bit that cannot be set when no higher-priority bit is set
    // never reaches the output; zero it in the input.
    let mut dead = vec![false; w_in];
    let mut any_dead = false;
    for i in 0..w_in {
        if engine.known(arg_bits[i]) == KnownBit::Zero {
            continue;
        }
        let higher: Vec<Ref> = if lsb_prio {
            arg_bits[..i].to_vec()
        } else {
            arg_bits[i + 1..].to_vec()
        };
        let mut none_higher = bdd.one();
        for h in higher {
            none_higher = bdd.apply_and(none_higher, -h);
        }
        if bdd.is_zero(bdd.apply_and(arg_bits[i], none_higher)) {
            dead[i] = true;
            any_dead = true;
        }
    }

    // With at most one (post-zeroing) input bit ever set, the priority
    // masking is a no-op and the whole one-hot collapses to the input plus
    // an explicit "no bit set" MSb.
    let effective: Vec<Ref> = arg_bits
        .iter()
        .enumerate()
        .map(|(i, b)| if dead[i] { bdd.zero() } else { *b })
        .collect();
    let disjoint = engine.pairwise_disjoint(&effective);

    if !any_dead && !disjoint {
        return false;
    }

    let one_hot_arg = if any_dead {
        log::debug!(
            "bdd_simplify: zeroing {} dead one_hot input bit(s) of {}",
            dead.iter().filter(|d| **d).count(),
            crate::ir::node_textual_id(f, nr)
        );
        // Rebuild the input as a concat of kept slices and zero literals,
        // grouping contiguous runs, MSb-first.
        let mut parts: Vec<NodeRef> = Vec::new();
        let mut hi = w_in;
        while hi > 0 {
            let run_dead = dead[hi - 1];
            let mut lo = hi;
            while lo > 0 && dead[lo - 1] == run_dead {
                lo -= 1;
            }
            let run_width = hi - lo;
            let part = if run_dead {
                push_node(
                    f,
                    Type::Bits(run_width),
                    NodePayload::Literal(IrValue::Bits(IrBits::zero(run_width))),
                )
            } else {
                push_node(
                    f,
                    Type::Bits(run_width),
                    NodePayload::BitSlice {
                        arg,
                        start: lo,
                        width: run_width,
                    },
                )
            };
            parts.push(part);
            hi = lo;
        }
        push_node(
            f,
            Type::Bits(w_in),
            NodePayload::Nary(NaryOp::Concat, parts),
        )
    } else {
        arg
    };

    if disjoint {
        log::debug!(
            "bdd_simplify: collapsing one_hot {} over a disjoint input",
            crate::ir::node_textual_id(f, nr)
        );
        let prefix_len = f.nodes.len();
        let zero = push_node(
            f,
            Type::Bits(w_in),
            NodePayload::Literal(IrValue::Bits(IrBits::zero(w_in))),
        );
        let eq = push_node(
            f,
            Type::Bits(1),
            NodePayload::Binop(Binop::Eq, one_hot_arg, zero),
        );
        let concat = push_node(
            f,
            Type::Bits(w_in + 1),
            NodePayload::Nary(NaryOp::Concat, vec![eq, one_hot_arg]),
        );
        replace_uses_below(f, nr, concat, prefix_len);
    } else {
        f.get_node_mut(nr).payload = NodePayload::OneHot {
            arg: one_hot_arg,
            lsb_prio,
        };
    }
    true
}

/// Whether `nr` heads a chain of two-way selects: its false-arm nests
/// further qualifying selects, and no user continues the chain upward.
fn try_select_chain(f: &mut Fn, engine: &BddEngine, nr: NodeRef) -> bool {
    if !is_two_way_select(f, nr) {
        return false;
    }
    // Only fire at the head of the chain so the whole chain converts at
    // once.
    for (i, node) in f.nodes.iter().enumerate() {
        if let NodePayload::Sel { cases, default, .. } = &node.payload {
            if default.is_none()
                && cases.len() == 2
                && cases[0] == nr
                && is_two_way_select(f, NodeRef { index: i })
            {
                return false;
            }
        }
    }

    let mut preds: Vec<NodeRef> = Vec::new();
    let mut arms: Vec<NodeRef> = Vec::new();
    let mut cur = nr;
    loop {
        let node = f.get_node(cur);
        match &node.payload {
            NodePayload::Sel {
                selector,
                cases,
                default: None,
            } if cases.len() == 2 && is_bits1(f, *selector) => {
                // Interior links must have no other observers.
                if cur != nr && user_count(f, cur) != 1 {
                    break;
                }
                preds.push(*selector);
                arms.push(cases[1]);
                cur = cases[0];
            }
            _ => break,
        }
    }
    if preds.len() < 2 {
        return false;
    }
    let else_value = cur;

    let Some(pred_bits) = preds
        .iter()
        .map(|p| engine.node_bits(*p).map(|b| b[0]))
        .collect::<Option<Vec<Ref>>>()
    else {
        return false;
    };
    if !engine.pairwise_disjoint(&pred_bits) {
        return false;
    }
    let exhaustive = engine.or_is_one(&pred_bits);

    log::debug!(
        "bdd_simplify: converting {}-deep select chain at {} to one_hot_sel (exhaustive={})",
        preds.len(),
        crate::ir::node_textual_id(f, nr),
        exhaustive
    );

    let node_ty = f.get_node_ty(nr).clone();
    let prefix_len = f.nodes.len();
    // The outermost predicate supplies the selector MSb; cases run from the
    // innermost arm up. A non-exhaustive predicate set gets a "none true"
    // guard bit selecting the else value.
    let mut selector_ops = preds.clone();
    let mut cases: Vec<NodeRef> = arms.iter().rev().copied().collect();
    if !exhaustive {
        let none_true = push_node(f, Type::Bits(1), NodePayload::Nary(NaryOp::Nor, preds));
        selector_ops.push(none_true);
        cases.insert(0, else_value);
    }
    let selector_width = selector_ops.len();
    let selector = push_node(
        f,
        Type::Bits(selector_width),
        NodePayload::Nary(NaryOp::Concat, selector_ops),
    );
    let ohs = push_node(f, node_ty, NodePayload::OneHotSel { selector, cases });
    replace_uses_below(f, nr, ohs, prefix_len);
    true
}

fn is_two_way_select(f: &Fn, nr: NodeRef) -> bool {
    match &f.get_node(nr).payload {
        NodePayload::Sel {
            selector,
            cases,
            default: None,
        } => cases.len() == 2 && is_bits1(f, *selector),
        _ => false,
    }
}

fn is_bits1(f: &Fn, nr: NodeRef) -> bool {
    matches!(f.get_node_ty(nr), Type::Bits(1))
}

fn known_to_bits(known: &[KnownBit]) -> IrBits {
    IrBits::new(known.iter().map(|k| *k == KnownBit::One).collect())
}

fn has_users(f: &Fn, nr: NodeRef) -> bool {
    user_count(f, nr) > 0
}

fn user_count(f: &Fn, nr: NodeRef) -> usize {
    f.nodes
        .iter()
        .filter(|n| operands(&n.payload).contains(&nr))
        .count()
}

/// Whether every user of `nr` is a `bit_slice(nr, start, width)`, i.e. the
/// node has already been spliced and only its unknown region is observed.
fn all_users_are_slice(f: &Fn, nr: NodeRef, start: usize, width: usize) -> bool {
    let mut saw_user = false;
    for node in f.nodes.iter() {
        if !operands(&node.payload).contains(&nr) {
            continue;
        }
        saw_user = true;
        match &node.payload {
            NodePayload::BitSlice {
                arg,
                start: s,
                width: w,
            } if *arg == nr && *s == start && *w == width => {}
            _ => return false,
        }
    }
    saw_user
}

/// Fixed-point guard: whether `nr` is already a concat whose MSb (or LSb)
/// edge is a literal holding exactly the known bits.
fn concat_edge_matches(f: &Fn, nr: NodeRef, msb_edge: bool, expected: &IrBits) -> bool {
    let NodePayload::Nary(NaryOp::Concat, ops) = &f.get_node(nr).payload else {
        return false;
    };
    let edge = if msb_edge {
        ops.first()
    } else {
        ops.last()
    };
    let Some(edge) = edge else {
        return false;
    };
    match &f.get_node(*edge).payload {
        NodePayload::Literal(IrValue::Bits(bits)) => bits == expected,
        _ => false,
    }
}

fn push_node(f: &mut Fn, ty: Type, payload: NodePayload) -> NodeRef {
    let text_id = f.nodes.iter().map(|n| n.text_id).max().unwrap_or(0) + 1;
    f.nodes.push(Node {
        text_id,
        name: None,
        ty,
        payload,
    });
    NodeRef {
        index: f.nodes.len() - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;
    use crate::ir_builder::FnBuilder;

    #[test]
    fn test_one_hot_dead_input_bit_is_zeroed() {
        // eq(x, 2) implies both ult(x, 8) and ult(x, 12); with LSb priority
        // the ult bits mask the eq bit, so the eq input can never fire. The
        // two ult bits overlap, so the wrapper itself survives.
        let mut fb = FnBuilder::new("f");
        let x = fb.param("x", Type::Bits(4));
        let eight = fb.literal_ubits(8, 4);
        let twelve = fb.literal_ubits(12, 4);
        let two = fb.literal_ubits(2, 4);
        let lt8 = fb.ult(x, eight);
        let lt12 = fb.ult(x, twelve);
        let is_two = fb.eq(x, two);
        let packed = fb.concat(&[is_two, lt12, lt8]);
        let oh = fb.one_hot(packed, true);
        fb.ret(oh);
        let mut f = fb.build();

        assert!(bdd_simplify(&mut f, true));

        // The one_hot wrapper survives with a rewritten input whose MSb is a
        // zero literal.
        let NodePayload::OneHot { arg, .. } = f.get_node(oh).payload else {
            panic!("one_hot wrapper should be preserved");
        };
        let NodePayload::Nary(NaryOp::Concat, ref parts) = f.get_node(arg).payload else {
            panic!("rewritten input should be a concat");
        };
        match &f.get_node(parts[0]).payload {
            NodePayload::Literal(IrValue::Bits(bits)) => {
                assert_eq!(bits, &IrBits::zero(1));
            }
            other => panic!("expected zero literal at the MSb edge, got {:?}", other),
        }

        // Idempotent on its own output.
        assert!(!bdd_simplify(&mut f, true));
    }

    #[test]
    fn test_dead_nodes_are_left_alone() {
        let mut fb = FnBuilder::new("f");
        let x = fb.param("x", Type::Bits(4));
        let inv = fb.not_(x);
        // or(x, not(x)) is all-ones but unused; the return value is x.
        let _unused = fb.or_(&[x, inv]);
        fb.ret(x);
        let mut f = fb.build();

        assert!(!bdd_simplify(&mut f, true));
    }
}
