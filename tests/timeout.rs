//! Scenario 6 (spec §8, "Timeout"): s1 has a timeout transition to s2,
//! which itself has a timeout transition to the final state. No events are
//! ever posted; the machine progresses purely off its own armed timers.

mod common;

use common::Trace;
use hsm::{GraphBuilder, Machine, NodeKind, TransitionKind, Trigger};
use std::time::Duration;

#[test]
fn chained_timeouts_drive_the_machine_to_completion() {
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

    b.add_transition(s1, Some(s2), TransitionKind::External, Trigger::Timeout(Duration::from_millis(50)));
    b.add_transition(s2, Some(fs), TransitionKind::External, Trigger::Timeout(Duration::from_millis(50)));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    // Nothing posted: the two timeouts alone should carry the machine from
    // s1 to s2 to termination, each hop within (roughly) one timer period.
    assert!(!machine.join(Duration::from_millis(20)), "must not terminate before the first timeout");
    assert!(machine.join(Duration::from_secs(2)), "machine should terminate once both timeouts fire");

    assert!(trace.contains_in_order(&[("s1", "entry"), ("s1", "exit"), ("s2", "entry"), ("s2", "exit")]));
}

#[test]
fn exiting_a_state_cancels_its_still_armed_timeout() {
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

    // s1 races an event against a long timeout; the event must win, and the
    // timeout must never fire afterwards (it was cancelled on exit).
    b.add_transition(s1, Some(s2), TransitionKind::External, Trigger::Equals("a"));
    b.add_transition(s1, Some(fs), TransitionKind::External, Trigger::Timeout(Duration::from_secs(10)));
    b.add_transition(s2, Some(fs), TransitionKind::External, Trigger::Equals("b"));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    machine.post("a");
    assert!(machine.settle(Duration::from_secs(2)));
    assert!(trace.contains_in_order(&[("s1", "exit"), ("s2", "entry")]));

    machine.post("b");
    assert!(machine.join(Duration::from_secs(2)), "machine should terminate via the event path");
    // s1 is entered and exited exactly once each: the 10s timeout never
    // re-fires against it after exit cancelled the armed timer.
    let s1_entries = trace.log().iter().filter(|(n, w)| n == "s1" && *w == "entry").count();
    let s1_exits = trace.log().iter().filter(|(n, w)| n == "s1" && *w == "exit").count();
    assert_eq!((s1_entries, s1_exits), (1, 1));
}
