//! The context object passed to every user-supplied hook/action closure.
//!
//! Grounded in the original implementation's convention of passing `sm` (the
//! per-instance `SMState` proxy) as the first argument to every hook —
//! `h(sm, elt, msg=None)` for entry/exit hooks, `h(sm, t, evt)` for
//! transition actions (see `toysm/tests/sm_trace.py::trace`). `HookCtx`
//! plays that role here: it carries the instance key, the node/transition
//! the hook is attached to, and (for action/event-bearing hooks) the event
//! that triggered the call, plus a handle to post further events.

use crate::graph::NodeId;
use crate::machine::InstanceKey;
use crate::queue::Poster;

/// Which lifecycle phase a node hook is firing for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    PreEntry,
    PostEntry,
    PreExit,
    PostExit,
}

pub struct HookCtx<'a, E> {
    pub instance: &'a InstanceKey,
    pub node: Option<NodeId>,
    pub phase: Option<Phase>,
    pub event: Option<&'a E>,
    poster: &'a Poster<E>,
}

impl<'a, E> HookCtx<'a, E> {
    pub fn new(
        instance: &'a InstanceKey,
        node: Option<NodeId>,
        phase: Option<Phase>,
        event: Option<&'a E>,
        poster: &'a Poster<E>,
    ) -> Self {
        HookCtx {
            instance,
            node,
            phase,
            event,
            poster,
        }
    }

    /// Post a new event back into the owning machine's queue, exactly as a
    /// guard/action running on the run-loop thread is allowed to.
    pub fn post(&self, evt: E)
    where
        E: Send + 'static,
    {
        self.poster.post(evt);
    }
}
