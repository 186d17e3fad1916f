use std::sync::Arc;
use std::time::Duration;

/// The four transition kinds named in the data model.
///
/// - `Internal`: no entry/exit of anything, the action runs in place.
/// - `Local`: entry/exit skip the common ancestor (the transition stays
///   "inside" the source's enclosing region when source is an ancestor of
///   target or vice versa).
/// - `External`: entry/exit the outermost element too, including on a
///   self-transition (source == target), which exits and re-enters the
///   state itself.
/// - `Entry`: internal-only, used to compose entry chains; never reachable
///   by user code, only synthesized while building compound entry paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Internal,
    Local,
    External,
    Entry,
}

/// What makes a transition eligible to fire for a given pulse.
#[derive(Clone)]
pub enum Trigger<E> {
    /// Null trigger: matches any external event, and (per the selector's
    /// completion-event rule) a completion pulse too.
    Any,
    /// Matches only the completion pulse signaling a completed region,
    /// never a user event.
    Completion,
    /// Fires iff the posted event equals this value.
    Equals(E),
    /// A user-supplied guard predicate over the event.
    Guard(Guard<E>),
    /// Fires only when the timer armed for this specific transition elapses.
    Timeout(Duration),
}

/// Closures are `Arc`-wrapped (not `Box`) so that `GraphBuilder::compose`
/// can deep-copy a subtree — including its hooks/guards/actions — by
/// cloning the `Arc`, rather than requiring every user closure to be
/// itself `Clone`.
pub type Action<E> = Arc<dyn Fn(&crate::hooks::HookCtx<E>) + Send + Sync>;
pub type Guard<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub type Hook<E> = Arc<dyn Fn(&crate::hooks::HookCtx<E>) + Send + Sync>;

#[derive(Clone)]
pub struct Transition<E> {
    /// Semantic target; `None` for a transition with no state change (a bare
    /// internal action). Structurally this edge's endpoint still points
    /// somewhere (petgraph requires both ends) — for a targetless
    /// transition the edge is a self-loop on the source, which is never
    /// inspected since `target` is what callers consult.
    pub target: Option<super::NodeId>,
    pub kind: Kind,
    pub trigger: Trigger<E>,
    /// Additional guard evaluated after the trigger matches (lets an
    /// `Equals`/`Any`/`Timeout` transition still be conditionally skipped).
    pub guard: Option<Guard<E>>,
    pub action: Option<Action<E>>,
    pub label: Option<String>,
    pub hooks: Vec<Hook<E>>,
}

impl<E> Transition<E> {
    pub fn new(kind: Kind, trigger: Trigger<E>) -> Self {
        Transition {
            target: None,
            kind,
            trigger,
            guard: None,
            action: None,
            label: None,
            hooks: Vec::new(),
        }
    }

    pub fn matches_event(&self, evt: &E) -> bool
    where
        E: PartialEq,
    {
        let trigger_ok = match &self.trigger {
            Trigger::Any => true,
            Trigger::Completion => false,
            Trigger::Equals(v) => v == evt,
            Trigger::Guard(g) => g(evt),
            Trigger::Timeout(_) => false,
        };
        trigger_ok && self.guard.as_ref().map_or(true, |g| g(evt))
    }

    pub fn matches_completion(&self) -> bool {
        matches!(self.trigger, Trigger::Any | Trigger::Completion)
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        match &self.trigger {
            Trigger::Timeout(d) => Some(*d),
            _ => None,
        }
    }
}
