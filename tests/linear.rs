//! Scenario 1 (spec §8, "Linear"): `s1 -[a]-> s2 -[b]-> fs`. Posting `a`
//! then `b` should visit s1, s2, and the final state in that order and
//! leave the machine terminated.

mod common;

use common::Trace;
use hsm::{GraphBuilder, Machine, NodeKind, TransitionKind, Trigger};
use std::time::Duration;

#[test]
fn linear_chain_terminates_in_order() {
    let trace = Trace::new();
    let mut b = GraphBuilder::<&'static str>::new();

    let root = b.add_named_node(NodeKind::State, "root");
    b.set_root(root);
    let s1 = b.add_named_node(NodeKind::State, "s1");
    let s2 = b.add_named_node(NodeKind::State, "s2");
    let fs = b.add_named_node(NodeKind::Final, "fs");
    b.set_parent(s1, root, true).unwrap();
    b.set_parent(s2, root, false).unwrap();
    b.set_parent(fs, root, false).unwrap();

    trace.watch(&mut b, s1, "s1");
    trace.watch(&mut b, s2, "s2");

    b.add_transition(s1, Some(s2), TransitionKind::External, Trigger::Equals("a"));
    b.add_transition(s2, Some(fs), TransitionKind::External, Trigger::Equals("b"));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    machine.post("a");
    machine.post("b");

    assert!(machine.join(Duration::from_secs(2)), "machine should terminate");
    assert!(trace.contains_in_order(&[
        ("s1", "entry"),
        ("s1", "exit"),
        ("s2", "entry"),
        ("s2", "exit"),
    ]));
}
