// SPDX-License-Identifier: Apache-2.0

//! Utility functions for working with / on IR functions.

use crate::ir::{Fn, Node, NodePayload, NodeRef};
use std::collections::{HashMap, HashSet};

/// Returns the list of operands for the provided node.
pub fn operands(payload: &NodePayload) -> Vec<NodeRef> {
    use NodePayload::*;

    match payload {
        Nil => vec![],
        GetParam(_) => vec![],
        Tuple(elems) => elems.clone(),
        Array(elems) => elems.clone(),
        TupleIndex { tuple, index: _ } => vec![*tuple],
        Binop(_, a, b) => vec![*a, *b],
        Unop(_, a) => vec![*a],
        Literal(_) => vec![],
        SignExt {
            arg,
            new_bit_count: _,
        } => vec![*arg],
        ZeroExt {
            arg,
            new_bit_count: _,
        } => vec![*arg],
        ArrayIndex { array, index } => vec![*array, *index],
        BitSlice {
            arg,
            start: _,
            width: _,
        } => vec![*arg],
        DynamicBitSlice {
            arg,
            start,
            width: _,
        } => vec![*arg, *start],
        Nary(_, elems) => elems.clone(),
        OneHotSel { selector, cases } => {
            let mut deps = vec![*selector];
            deps.extend(cases.iter().cloned());
            deps
        }
        OneHot { arg, lsb_prio: _ } => vec![*arg],
        Sel {
            selector,
            cases,
            default,
        } => {
            let mut deps = vec![*selector];
            deps.extend(cases.iter().cloned());
            if let Some(d) = default {
                deps.push(*d);
            }
            deps
        }
        Decode { arg, .. } | Encode { arg } => vec![*arg],
    }
}

/// Returns a topologically sorted list of node references for the given IR
/// function.
///
/// The ordering guarantees that for any node, all its dependency nodes will
/// appear before it in the returned vector.
fn topo_from_nodes(nodes: &[Node]) -> Vec<NodeRef> {
    // Non-recursive DFS that yields a deterministic postorder.
    let n = nodes.len();
    let mut visited: Vec<bool> = vec![false; n];
    let mut in_stack: Vec<bool> = vec![false; n];
    let mut order: Vec<NodeRef> = Vec::with_capacity(n);

    // Precompute dependency indices per node to avoid repeated operand walks.
    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(n);
    for node in nodes.iter() {
        deps.push(
            operands(&node.payload)
                .into_iter()
                .map(|r| r.index)
                .collect(),
        );
    }

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = Vec::new(); // (node_idx, next_child_pos)
        stack.push((start, 0));
        in_stack[start] = true;

        while let Some((node_idx, child_pos)) = stack.pop() {
            if visited[node_idx] {
                in_stack[node_idx] = false;
                continue;
            }
            if child_pos < deps[node_idx].len() {
                let next_child = deps[node_idx][child_pos];
                stack.push((node_idx, child_pos + 1));
                if !visited[next_child] {
                    assert!(
                        !in_stack[next_child],
                        "Cycle detected in IR graph; topological order impossible"
                    );
                    stack.push((next_child, 0));
                    in_stack[next_child] = true;
                }
                continue;
            }
            visited[node_idx] = true;
            in_stack[node_idx] = false;
            order.push(NodeRef { index: node_idx });
        }
    }
    assert!(
        order.len() == n,
        "Topological sort did not include all nodes"
    );
    order
}

pub fn get_topological(f: &Fn) -> Vec<NodeRef> {
    topo_from_nodes(&f.nodes)
}

/// Computes the immediate users of each node in the function.
///
/// Returns a mapping from each `NodeRef` to the set of `NodeRef`s that
/// directly use it as an operand. Nodes with no users will map to an empty
/// set.
pub fn compute_users(f: &Fn) -> HashMap<NodeRef, HashSet<NodeRef>> {
    let n = f.nodes.len();
    let mut users: HashMap<NodeRef, HashSet<NodeRef>> = HashMap::with_capacity(n);

    for i in 0..n {
        users.insert(NodeRef { index: i }, HashSet::new());
    }

    for (i, node) in f.nodes.iter().enumerate() {
        let this_ref = NodeRef { index: i };
        for dep in operands(&node.payload) {
            users
                .get_mut(&dep)
                .expect("operand NodeRef must exist in users map")
                .insert(this_ref);
        }
    }

    users
}

/// Rebuilds a payload with each operand passed through `map`.
pub fn remap_payload_with<FMap>(payload: &NodePayload, mut map: FMap) -> NodePayload
where
    FMap: FnMut(NodeRef) -> NodeRef,
{
    use NodePayload::*;
    match payload {
        Nil => Nil,
        GetParam(p) => GetParam(*p),
        Literal(v) => Literal(v.clone()),
        Tuple(elems) => Tuple(elems.iter().map(|r| map(*r)).collect()),
        Array(elems) => Array(elems.iter().map(|r| map(*r)).collect()),
        TupleIndex { tuple, index } => TupleIndex {
            tuple: map(*tuple),
            index: *index,
        },
        Binop(op, a, b) => Binop(*op, map(*a), map(*b)),
        Unop(op, a) => Unop(*op, map(*a)),
        SignExt { arg, new_bit_count } => SignExt {
            arg: map(*arg),
            new_bit_count: *new_bit_count,
        },
        ZeroExt { arg, new_bit_count } => ZeroExt {
            arg: map(*arg),
            new_bit_count: *new_bit_count,
        },
        ArrayIndex { array, index } => ArrayIndex {
            array: map(*array),
            index: map(*index),
        },
        BitSlice { arg, start, width } => BitSlice {
            arg: map(*arg),
            start: *start,
            width: *width,
        },
        DynamicBitSlice { arg, start, width } => DynamicBitSlice {
            arg: map(*arg),
            start: map(*start),
            width: *width,
        },
        Nary(op, elems) => Nary(*op, elems.iter().map(|r| map(*r)).collect()),
        OneHotSel { selector, cases } => OneHotSel {
            selector: map(*selector),
            cases: cases.iter().map(|r| map(*r)).collect(),
        },
        OneHot { arg, lsb_prio } => OneHot {
            arg: map(*arg),
            lsb_prio: *lsb_prio,
        },
        Sel {
            selector,
            cases,
            default,
        } => Sel {
            selector: map(*selector),
            cases: cases.iter().map(|r| map(*r)).collect(),
            default: default.map(&mut map),
        },
        Decode { arg, width } => Decode {
            arg: map(*arg),
            width: *width,
        },
        Encode { arg } => Encode { arg: map(*arg) },
    }
}

/// Redirects every use of `old` to `new` among the first `limit` nodes, and
/// updates the return node if it was `old`.
///
/// Callers replacing a node with a freshly appended subgraph pass the node
/// count from before the append as `limit` so the subgraph's own references
/// to `old` are left intact.
pub fn replace_uses_below(f: &mut Fn, old: NodeRef, new: NodeRef, limit: usize) {
    for i in 0..limit {
        let payload = remap_payload_with(&f.nodes[i].payload, |dep| {
            if dep == old {
                new
            } else {
                dep
            }
        });
        f.nodes[i].payload = payload;
    }
    if f.ret_node_ref == Some(old) {
        f.ret_node_ref = Some(new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Type;
    use crate::ir_builder::FnBuilder;

    #[test]
    fn test_topological_order_respects_deps() {
        let mut fb = FnBuilder::new("f");
        let a = fb.param("a", Type::Bits(4));
        let b = fb.param("b", Type::Bits(4));
        let sum = fb.add(a, b);
        let inv = fb.not_(sum);
        fb.ret(inv);
        let f = fb.build();

        let order = get_topological(&f);
        let pos = |nr: NodeRef| order.iter().position(|x| *x == nr).unwrap();
        assert!(pos(a) < pos(sum));
        assert!(pos(b) < pos(sum));
        assert!(pos(sum) < pos(inv));
    }

    #[test]
    fn test_compute_users() {
        let mut fb = FnBuilder::new("f");
        let a = fb.param("a", Type::Bits(4));
        let inv = fb.not_(a);
        let out = fb.and(&[a, inv]);
        fb.ret(out);
        let f = fb.build();

        let users = compute_users(&f);
        assert_eq!(users[&a].len(), 2);
        assert_eq!(users[&inv], [out].into_iter().collect());
        assert!(users[&out].is_empty());
    }

    #[test]
    fn test_replace_uses_below() {
        let mut fb = FnBuilder::new("f");
        let a = fb.param("a", Type::Bits(4));
        let b = fb.param("b", Type::Bits(4));
        let sum = fb.add(a, b);
        fb.ret(sum);
        let mut f = fb.build();

        let limit = f.nodes.len();
        let lit = {
            // Append a replacement literal and redirect uses of `b` to it.
            let text_id = f.nodes.iter().map(|n| n.text_id).max().unwrap() + 1;
            f.nodes.push(crate::ir::Node {
                text_id,
                name: None,
                ty: Type::Bits(4),
                payload: NodePayload::Literal(crate::value::IrValue::ubits(7, 4)),
            });
            NodeRef {
                index: f.nodes.len() - 1,
            }
        };
        replace_uses_below(&mut f, b, lit, limit);
        match f.get_node(sum).payload {
            NodePayload::Binop(_, lhs, rhs) => {
                assert_eq!(lhs, a);
                assert_eq!(rhs, lit);
            }
            _ => panic!("expected binop"),
        }
    }
}
