//! Scenario 4 (spec §8, "Parallel with one event"): a parallel state with
//! two orthogonal regions, each reacting to the same posted event. One
//! region reaches its own Final; the other keeps running, so the parallel
//! state (and the whole machine) stays alive.

mod common;

use common::Trace;
use hsm::{GraphBuilder, Machine, NodeKind, TransitionKind, Trigger};
use std::time::Duration;

#[test]
fn parallel_regions_react_independently_to_one_event() {
    let trace = Trace::new();
    let mut b = GraphBuilder::<&'static str>::new();

    let root = b.add_named_node(NodeKind::State, "root");
    b.set_root(root);
    let p = b.add_named_node(NodeKind::Parallel, "p");
    b.set_parent(p, root, true).unwrap();

    let r1 = b.add_named_node(NodeKind::State, "r1");
    let r2 = b.add_named_node(NodeKind::State, "r2");
    b.set_parent(r1, p, false).unwrap();
    b.set_parent(r2, p, false).unwrap();

    let s11 = b.add_named_node(NodeKind::State, "s11");
    let s12 = b.add_named_node(NodeKind::State, "s12");
    b.set_parent(s11, r1, true).unwrap();
    b.set_parent(s12, r1, false).unwrap();

    let s21 = b.add_named_node(NodeKind::State, "s21");
    let fs_r2 = b.add_named_node(NodeKind::Final, "fs_r2");
    b.set_parent(s21, r2, true).unwrap();
    b.set_parent(fs_r2, r2, false).unwrap();

    for (node, name) in [(s11, "s11"), (s12, "s12"), (s21, "s21")] {
        trace.watch(&mut b, node, name);
    }

    b.add_transition(s11, Some(s12), TransitionKind::External, Trigger::Equals("a"));
    b.add_transition(s21, Some(fs_r2), TransitionKind::External, Trigger::Equals("a"));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    machine.post("a");
    assert!(machine.settle(Duration::from_secs(2)));

    assert!(trace.contains_in_order(&[("s11", "exit"), ("s12", "entry")]));
    assert!(trace.contains_in_order(&[("s21", "exit")]));
    assert!(!trace.log().iter().any(|(n, w)| n == "s12" && *w == "exit"));

    // R2 reached its Final but R1 is still running, so the parallel state
    // (and the whole machine) is still alive.
    assert!(!machine.join(Duration::from_millis(50)));

    machine.stop(None);
    assert!(machine.join(Duration::from_secs(2)));
}
