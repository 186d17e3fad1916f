use super::NodeId;
use std::sync::Arc;

/// Discriminates the node variants named in the data model. A single tagged
/// enum rather than trait-object subclassing per node kind: dispatch on
/// `kind` inside the firer/selector instead of virtual calls, so the graph
/// stays a plain arena of values with no dynamic dispatch on the hot path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A plain composite (or leaf, if it has no children) state.
    State,
    /// A composite state whose children are independent orthogonal regions,
    /// each a `State` in its own right, all active simultaneously.
    Parallel,
    /// Initial pseudo-state: exactly one per composite parent, at most one
    /// outgoing transition, never a transition target.
    Initial,
    /// Junction pseudo-state: a branch point in a compound transition,
    /// resolved via guards at each `_step`, no persistent residency.
    Junction,
    /// Shallow history: restores the parent's most recent direct substate.
    History,
    /// Deep history: restores the parent's full nested configuration.
    DeepHistory,
    /// Final pseudo-state (sink): reaching it completes the enclosing region.
    Final,
    /// Terminate pseudo-state (sink): reaching it stops the whole machine.
    Terminate,
    /// Entry pseudo-state: composes an entry chain, never user-triggered.
    Entry,
    /// Exit pseudo-state: composes an exit chain, never user-triggered.
    Exit,
}

impl NodeKind {
    pub fn is_pseudo(self) -> bool {
        !matches!(self, NodeKind::State | NodeKind::Parallel)
    }

    /// Sink pseudo-states may never be the source of a transition.
    pub fn is_sink(self) -> bool {
        matches!(self, NodeKind::Final | NodeKind::Terminate)
    }

    pub fn is_composite(self) -> bool {
        matches!(self, NodeKind::State | NodeKind::Parallel)
    }

    pub fn is_history(self) -> bool {
        matches!(self, NodeKind::History | NodeKind::DeepHistory)
    }
}

/// One hook slot: an ordered list of user callbacks invoked at a lifecycle
/// point. Registration order is preserved for `pre_*`/`post_*` entry hooks;
/// `post_exit` hooks fire in reverse registration order relative to their
/// matching `pre_exit` (see `crate::firer`).
pub type Hook<F> = Vec<F>;

/// The four lifecycle hook slots a [`Node`] may carry. `Arc`-wrapped (not
/// `Box`) so a subtree's hooks survive `GraphBuilder::compose`'s clone.
pub type NodeHook<E> = Arc<dyn Fn(&crate::hooks::HookCtx<E>) + Send + Sync>;

pub struct Hooks<E> {
    pub pre_entry: Hook<NodeHook<E>>,
    pub post_entry: Hook<NodeHook<E>>,
    pub pre_exit: Hook<NodeHook<E>>,
    pub post_exit: Hook<NodeHook<E>>,
}

impl<E> Clone for Hooks<E> {
    fn clone(&self) -> Self {
        Hooks {
            pre_entry: self.pre_entry.clone(),
            post_entry: self.post_entry.clone(),
            pre_exit: self.pre_exit.clone(),
            post_exit: self.post_exit.clone(),
        }
    }
}

impl<E> Default for Hooks<E> {
    fn default() -> Self {
        Hooks {
            pre_entry: Vec::new(),
            post_entry: Vec::new(),
            pre_exit: Vec::new(),
            post_exit: Vec::new(),
        }
    }
}

pub struct Node<E> {
    pub kind: NodeKind,
    pub name: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub initial_child: Option<NodeId>,
    /// Set by `Graph::assign_depths` before the first instance starts; `0`
    /// for the root, `usize::MAX` as a build-time sentinel beforehand.
    pub depth: usize,
    pub hooks: Hooks<E>,
    /// Do-activity closure, only meaningful for `State`/`Parallel` nodes.
    /// Returns `true` to keep running, `false` to mark the activity
    /// complete and post a completion pulse for the owning state.
    pub do_activity: Option<Arc<dyn Fn(&crate::activity::DoActivityHandle<E>) -> bool + Send + Sync>>,
    /// Arbitrary attributes for the read-only visualization interface.
    pub attrs: std::collections::BTreeMap<String, serde_json::Value>,
}

impl<E> Clone for Node<E> {
    fn clone(&self) -> Self {
        Node {
            kind: self.kind,
            name: self.name.clone(),
            parent: self.parent,
            children: self.children.clone(),
            initial_child: self.initial_child,
            depth: self.depth,
            hooks: self.hooks.clone(),
            do_activity: self.do_activity.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

impl<E> Node<E> {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            name: None,
            parent: None,
            children: Vec::new(),
            initial_child: None,
            depth: usize::MAX,
            hooks: Hooks::default(),
            do_activity: None,
            attrs: std::collections::BTreeMap::new(),
        }
    }
}
