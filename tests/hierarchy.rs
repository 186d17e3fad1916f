//! Scenario 2 (spec §8, "Hierarchy with transition from superstate"):
//! s2 (with children s3 initial, s4) and s5 (with child s6 initial) are
//! both children of the root; s3-[a]->s4 stays local to s2, s2-[b]->s5
//! crosses up to their common ancestor, s5-[c]->Final ends the machine.

mod common;

use common::Trace;
use hsm::{GraphBuilder, Machine, NodeKind, TransitionKind, Trigger};
use std::time::Duration;

#[test]
fn superstate_transition_exits_and_enters_full_subpaths() {
    let trace = Trace::new();
    let mut b = GraphBuilder::<&'static str>::new();

    // root (= "s1" in the spec's naming) has s2 (initial) and s5 as children.
    let root = b.add_named_node(NodeKind::State, "root");
    b.set_root(root);
    let s2 = b.add_named_node(NodeKind::State, "s2");
    let s5 = b.add_named_node(NodeKind::State, "s5");
    let fs = b.add_named_node(NodeKind::Final, "fs");
    b.set_parent(s2, root, true).unwrap();
    b.set_parent(s5, root, false).unwrap();
    b.set_parent(fs, root, false).unwrap();

    let s3 = b.add_named_node(NodeKind::State, "s3");
    let s4 = b.add_named_node(NodeKind::State, "s4");
    b.set_parent(s3, s2, true).unwrap();
    b.set_parent(s4, s2, false).unwrap();

    let s6 = b.add_named_node(NodeKind::State, "s6");
    b.set_parent(s6, s5, true).unwrap();

    for (node, name) in [(s2, "s2"), (s3, "s3"), (s4, "s4"), (s5, "s5"), (s6, "s6")] {
        trace.watch(&mut b, node, name);
    }

    b.add_transition(s3, Some(s4), TransitionKind::External, Trigger::Equals("a"));
    b.add_transition(s2, Some(s5), TransitionKind::External, Trigger::Equals("b"));
    b.add_transition(s5, Some(fs), TransitionKind::External, Trigger::Equals("c"));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    machine.post("a");
    machine.post("b");
    machine.post("c");

    assert!(machine.join(Duration::from_secs(2)), "machine should terminate");
    assert!(trace.contains_in_order(&[
        ("s2", "entry"),
        ("s3", "entry"),
        ("s3", "exit"),
        ("s4", "entry"),
        ("s4", "exit"),
        ("s2", "exit"),
        ("s5", "entry"),
        ("s6", "entry"),
        ("s6", "exit"),
        ("s5", "exit"),
    ]));
}
