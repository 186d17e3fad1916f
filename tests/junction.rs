//! Scenario 3 (spec §8, "Junction with guards"): a single junction with
//! three guarded outgoing branches, selected in order by an external
//! counter, routing to s3, then s4, then the final state across three
//! separate passes through the junction.

mod common;

use common::Trace;
use hsm::{GraphBuilder, Machine, NodeKind, TransitionKind, Trigger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn junction_guards_select_branch_in_order() {
    let trace = Trace::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let mut b = GraphBuilder::<&'static str>::new();

    let root = b.add_named_node(NodeKind::State, "root");
    b.set_root(root);
    let s2 = b.add_named_node(NodeKind::State, "s2");
    let s3 = b.add_named_node(NodeKind::State, "s3");
    let s4 = b.add_named_node(NodeKind::State, "s4");
    let fs = b.add_named_node(NodeKind::Final, "fs");
    let j = b.add_named_node(NodeKind::Junction, "j");
    b.set_parent(s2, root, true).unwrap();
    b.set_parent(s3, root, false).unwrap();
    b.set_parent(s4, root, false).unwrap();
    b.set_parent(fs, root, false).unwrap();
    b.set_parent(j, root, false).unwrap();

    trace.watch(&mut b, s2, "s2");
    trace.watch(&mut b, s3, "s3");
    trace.watch(&mut b, s4, "s4");

    b.add_transition(s2, Some(j), TransitionKind::External, Trigger::Equals("a"));

    // Junction branches are resolved purely through `guard` (evaluated by
    // `crate::selector::resolve_compound`), not through `trigger` — a
    // compound hop past the initial event-matching transition carries no
    // event of its own to match against.
    let c0 = counter.clone();
    let t0 = b.add_transition(j, Some(s3), TransitionKind::External, Trigger::Any);
    b.transition_mut(t0).guard = Some(Arc::new(move |_: &&'static str| c0.load(Ordering::SeqCst) == 0));
    b.transition_mut(t0).action = Some(Arc::new({
        let counter = counter.clone();
        move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let c1 = counter.clone();
    let t1 = b.add_transition(j, Some(s4), TransitionKind::External, Trigger::Any);
    b.transition_mut(t1).guard = Some(Arc::new(move |_: &&'static str| c1.load(Ordering::SeqCst) == 1));
    b.transition_mut(t1).action = Some(Arc::new({
        let counter = counter.clone();
        move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let c2 = counter.clone();
    let t2 = b.add_transition(j, Some(fs), TransitionKind::External, Trigger::Any);
    b.transition_mut(t2).guard = Some(Arc::new(move |_: &&'static str| c2.load(Ordering::SeqCst) == 2));

    // Loop s3/s4 back to s2 so the junction can be visited a second and
    // third time from further "a" posts.
    b.add_transition(s3, Some(s2), TransitionKind::External, Trigger::Equals("a"));
    b.add_transition(s4, Some(s2), TransitionKind::External, Trigger::Equals("a"));

    let graph = b.build().expect("well-formed");
    let machine = Machine::new(graph, None).with_max_stop_wait(Duration::from_millis(20));
    machine.start().unwrap();

    machine.post("a"); // s2 -> j -> s3 (counter 0 -> 1)
    assert!(machine.settle(Duration::from_secs(2)));
    assert!(trace.log().last() == Some(&("s3".to_string(), "entry")));

    machine.post("a"); // s3 -> s2
    machine.post("a"); // s2 -> j -> s4 (counter 1 -> 2)
    assert!(machine.settle(Duration::from_secs(2)));
    assert!(trace.log().last() == Some(&("s4".to_string(), "entry")));

    machine.post("a"); // s4 -> s2
    machine.post("a"); // s2 -> j -> fs (counter == 2), machine terminates
    assert!(machine.join(Duration::from_secs(2)));

    assert!(trace.contains_in_order(&[("s3", "entry"), ("s4", "entry")]));
}
