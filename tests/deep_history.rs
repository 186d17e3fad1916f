//! Deep history round-trip (spec §8, testable properties: "save the active
//! configuration of a composite state via deep-history immediately before
//! exit, re-enter via deep-history, read the configuration again ->
//! identical flattened sequence"). `s1` holds a parallel state `p` with two
//! independent regions; each region is driven one step away from its own
//! initial child before `s1` is exited, and a deep-history restore must put
//! both regions back exactly where they were, without re-running either
//! region's own initial entry.

mod common;

use common::Trace;
use hsm::{GraphBuilder, Machine, NodeKind, TransitionKind, Trigger};
use std::time::Duration;

#[test]
fn deep_history_restores_full_nested_configuration() {
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

    let dh = b.add_named_node(NodeKind::DeepHistory, "dh");
    let p = b.add_named_node(NodeKind::Parallel, "p");
    b.set_parent(dh, s1, false).unwrap();
    b.set_parent(p, s1, true).unwrap();

    let ra = b.add_named_node(NodeKind::State, "ra");
    let rb = b.add_named_node(NodeKind::State, "rb");
    b.set_parent(ra, p, false).unwrap();
    b.set_parent(rb, p, false).unwrap();

    let a1 = b.add_named_node(NodeKind::State, "a1");
    let a2 = b.add_named_node(NodeKind::State, "a2");
    b.set_parent(a1, ra, true).unwrap();
    b.set_parent(a2, ra, false).unwrap();

    let b1 = b.add_named_node(NodeKind::State, "b1");
    let b2 = b.add_named_node(NodeKind::State, "b2");
    b.set_parent(b1, rb, true).unwrap();
    b.set_parent(b2, rb, false).unwrap();

    for (node, name) in [
        (s1, "s1"),
        (s2, "s2"),
        (a1, "a1"),
        (a2, "a2"),
        (b1, "b1"),
        (b2, "b2"),
    ] {
        trace.watch(&mut b, node, name);
    }

    b.add_transition(a1, Some(a2), TransitionKind::External, Trigger::Equals("x"));
    b.add_transition(b1, Some(b2), TransitionKind::External, Trigger::Equals("y"));
    b.add_transition(s1, Some(s2), TransitionKind::External, Trigger::Equals("e"));
    b.add_transition(s2, Some(dh), TransitionKind::External, Trigger::Equals("a"));
    b.add_transition(s2, Some(fs), TransitionKind::External, Trigger::Equals("f"));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    // Drive each region one step away from its own initial child, then exit
    // s1 (saving the nested configuration), then come back via deep history.
    for evt in ["x", "y", "e", "a", "e", "f"] {
        machine.post(evt);
        assert!(machine.settle(Duration::from_secs(2)));
    }

    assert!(machine.join(Duration::from_secs(2)), "machine should terminate");

    // a1/b1 are each entered exactly once (their own initial entry) and
    // exited exactly once (the moment "x"/"y" moved past them) — never
    // re-entered by the history restore.
    let log = trace.log();
    let count = |name: &str, what: &str| log.iter().filter(|(n, w)| n == name && *w == what).count();
    assert_eq!(count("a1", "entry"), 1);
    assert_eq!(count("a1", "exit"), 1);
    assert_eq!(count("b1", "entry"), 1);
    assert_eq!(count("b1", "exit"), 1);

    // a2/b2 are each entered twice: once when "x"/"y" first reached them,
    // once more when the deep-history restore puts the saved configuration
    // back directly (bypassing ra/rb's own default-initial resolution).
    assert_eq!(count("a2", "entry"), 2);
    assert_eq!(count("a2", "exit"), 2);
    assert_eq!(count("b2", "entry"), 2);
    assert_eq!(count("b2", "exit"), 2);

    // The restore happens as one atomic step: a2 and b2 both re-enter (via
    // the deep-history restore) strictly after the exit that saved the
    // snapshot, and strictly before s1 is exited a second time.
    assert!(trace.contains_in_order(&[
        ("a2", "exit"),
        ("b2", "exit"),
        ("a2", "entry"),
        ("b2", "entry"),
        ("s1", "exit"),
    ]));
}
