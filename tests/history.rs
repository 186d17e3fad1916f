//! Scenario 5 (spec §8, "Shallow history default"): a composite state s1
//! holding a shallow history pseudo-state plus a small loop among its own
//! substates; entering s1 via its history pseudo-state the first time (no
//! snapshot yet) falls back to s1's own default initial child, and every
//! subsequent entry restores whatever substate was active when s1 was last
//! exited.

mod common;

use common::Trace;
use hsm::{GraphBuilder, Machine, NodeKind, TransitionKind, Trigger};
use std::time::Duration;

#[test]
fn shallow_history_restores_last_active_substate() {
    let trace = Trace::new();
    let mut b = GraphBuilder::<&'static str>::new();

    let root = b.add_named_node(NodeKind::State, "root");
    b.set_root(root);
    let s1 = b.add_named_node(NodeKind::State, "s1");
    let s2 = b.add_named_node(NodeKind::State, "s2");
    let fs = b.add_named_node(NodeKind::Final, "fs");
    b.set_parent(s1, root, false).unwrap();
    b.set_parent(s2, root, true).unwrap();
    b.set_parent(fs, root, false).unwrap();

    let h = b.add_named_node(NodeKind::History, "h");
    let s11 = b.add_named_node(NodeKind::State, "s11");
    let s12 = b.add_named_node(NodeKind::State, "s12");
    let s13 = b.add_named_node(NodeKind::State, "s13");
    b.set_parent(h, s1, false).unwrap();
    b.set_parent(s11, s1, true).unwrap();
    b.set_parent(s12, s1, false).unwrap();
    b.set_parent(s13, s1, false).unwrap();

    for (node, name) in [(s1, "s1"), (s2, "s2"), (s11, "s11"), (s12, "s12"), (s13, "s13")] {
        trace.watch(&mut b, node, name);
    }

    b.add_transition(s2, Some(h), TransitionKind::External, Trigger::Equals("a"));
    b.add_transition(s11, Some(s12), TransitionKind::External, Trigger::Equals("b"));
    b.add_transition(s12, Some(s13), TransitionKind::External, Trigger::Equals("c"));
    b.add_transition(s13, Some(s11), TransitionKind::External, Trigger::Equals("d"));
    b.add_transition(s1, Some(s2), TransitionKind::External, Trigger::Equals("e"));
    b.add_transition(s2, Some(fs), TransitionKind::External, Trigger::Equals("f"));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    for evt in ["a", "b", "c", "d", "b", "e", "a", "e", "f"] {
        machine.post(evt);
    }

    assert!(machine.join(Duration::from_secs(2)), "machine should terminate");

    // First "a": no snapshot yet, h falls back to s1's own initial child.
    assert!(trace.contains_in_order(&[("s2", "entry"), ("s2", "exit"), ("s11", "entry")]));
    // "b","c","d","b" walk s11 -> s12 -> s13 -> s11 -> s12, then "e" exits
    // s1 (saving history = s12) and re-enters s2.
    assert!(trace.contains_in_order(&[("s12", "entry"), ("s1", "exit"), ("s2", "entry")]));
    // Second "a": history restores directly to s12, skipping s11 entirely.
    assert!(trace.contains_in_order(&[("s2", "exit"), ("s12", "entry"), ("s1", "exit"), ("s2", "entry")]));
    assert!(trace.contains_in_order(&[("s2", "exit")]));
}
