//! Shared test-only trace helper, grounded in `toysm/tests/sm_trace.py`'s
//! `trace()` — entry/exit hooks pushing `(state_name, "entry"|"exit")` pairs
//! into one ordered log, used here to assert the literal scenarios named in
//! the spec's testable-properties section as ordered subsequences.

use hsm::{GraphBuilder, HookCtx, NodeId};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<(String, &'static str)>>>);

impl Trace {
    pub fn new() -> Self {
        Trace::default()
    }

    fn record(&self, name: &str, what: &'static str) {
        self.0.lock().unwrap().push((name.to_string(), what));
    }

    pub fn log(&self) -> Vec<(String, &'static str)> {
        self.0.lock().unwrap().clone()
    }

    /// True iff `events` appears, in order, as a (not necessarily
    /// contiguous) subsequence of the recorded log.
    pub fn contains_in_order(&self, events: &[(&str, &'static str)]) -> bool {
        let log = self.log();
        let mut cursor = 0;
        for &(name, what) in events {
            match log[cursor..].iter().position(|(n, w)| n == name && *w == what) {
                Some(offset) => cursor += offset + 1,
                None => return false,
            }
        }
        true
    }

    /// Register entry/exit hooks on `node` that push into this trace under
    /// `name`. Must be called before `GraphBuilder::build`.
    pub fn watch<E>(&self, b: &mut GraphBuilder<E>, node: NodeId, name: &'static str)
    where
        E: Send + Sync + 'static,
    {
        let t1 = self.clone();
        b.node_mut(node).hooks.pre_entry.push(Arc::new(move |_ctx: &HookCtx<E>| {
            t1.record(name, "entry");
        }));
        let t2 = self.clone();
        b.node_mut(node).hooks.pre_exit.push(Arc::new(move |_ctx: &HookCtx<E>| {
            t2.record(name, "exit");
        }));
    }
}
