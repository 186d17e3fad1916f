//! Transition Selector: given an instance's active configuration and a
//! pulse (event / completion / timer-fired), returns the ordered list of
//! graph transitions to fire: recurse into the active configuration first,
//! let a descendant's enabled transitions pre-empt its ancestor's at every
//! level on the way down, and resolve any compound transition through
//! pseudo-states before returning.

use crate::graph::{Graph, NodeId, NodeKind, Transition, TransitionId, TransitionKind};
use crate::queue::Pulse;
use crate::store::InstanceStore;

/// Recurse into `node`'s active substate (plain composite) or still-running
/// regions (parallel) first, at every level — not just down to the active
/// leaf — so a transition declared on a mid-level superstate inside a
/// region still gets its chance once its own descendants decline. A
/// non-empty result from a descendant always wins over the ancestor's own
/// transitions.
pub fn select<E: PartialEq>(
    graph: &Graph<E>,
    store: &InstanceStore,
    node: NodeId,
    pulse: &Pulse<E>,
) -> Vec<TransitionId> {
    let n = graph.node(node);

    if n.kind == NodeKind::Parallel {
        let running = store.still_running(node);
        let mut collected = Vec::new();
        for &region in &n.children {
            if !running.contains(&region) {
                continue;
            }
            let r = select(graph, store, region, pulse);
            collected.extend(r);
        }
        if !collected.is_empty() {
            return collected;
        }
    } else if n.kind.is_composite() && !n.children.is_empty() {
        if let Some(active_child) = store.active_substate(node) {
            let r = select(graph, store, active_child, pulse);
            if !r.is_empty() {
                return r;
            }
        }
    }

    scan_own(graph, store, node, pulse)
}

/// The full active configuration at and below `node`, in pre-order, as a
/// plain `Vec`. Used both by deep-history snapshotting (`crate::firer`)
/// and available for instance inspection. Only still-running regions are
/// included: a `Parallel` region that already reached its `Final` and
/// dropped out of `still_running` does not appear here.
pub fn active_states<E>(graph: &Graph<E>, store: &InstanceStore, node: NodeId) -> Vec<NodeId> {
    let mut out = vec![node];
    let n = graph.node(node);
    if n.kind == NodeKind::Parallel {
        let running = store.still_running(node);
        for &child in &n.children {
            if running.contains(&child) {
                out.extend(active_states(graph, store, child));
            }
        }
    } else if n.kind.is_composite() {
        if let Some(active_child) = store.active_substate(node) {
            out.extend(active_states(graph, store, active_child));
        }
    }
    out
}

fn scan_own<E: PartialEq>(
    graph: &Graph<E>,
    store: &InstanceStore,
    node: NodeId,
    pulse: &Pulse<E>,
) -> Vec<TransitionId> {
    for tid in graph.transitions_from(node) {
        let t = graph.transition(tid);
        if t.kind == TransitionKind::Entry {
            continue;
        }
        if !pulse_matches(t, pulse, tid) {
            continue;
        }
        match t.target {
            None => return vec![tid],
            Some(target) => {
                let target_kind = graph.node(target).kind;
                if target_kind.is_pseudo() && !target_kind.is_history() && !target_kind.is_sink() {
                    match resolve_compound(graph, store, target, pulse) {
                        Some(mut chain) => {
                            let mut out = vec![tid];
                            out.append(&mut chain);
                            return out;
                        }
                        None => continue,
                    }
                } else {
                    // Ordinary state, Final, Terminate, or a History node
                    // (History is always transition-terminal: the firer
                    // resolves which concrete node it restores to).
                    return vec![tid];
                }
            }
        }
    }
    Vec::new()
}

fn pulse_matches<E: PartialEq>(t: &Transition<E>, pulse: &Pulse<E>, tid: TransitionId) -> bool {
    match pulse {
        Pulse::Event(e) => t.matches_event(e),
        Pulse::Completion { .. } => t.matches_completion(),
        Pulse::Init { .. } => false,
        Pulse::TimerFired(fired) => *fired == tid,
    }
}

/// Resolve a compound transition through a chain of non-history pseudo
/// states (Junction, Entry, Exit), evaluating guards in declaration order
/// at each hop. Returns `None` if no branch reaches a transition-terminal
/// node (ordinary state, Final, Terminate, or History).
///
/// `pub(crate)` rather than private: [`crate::firer`] reuses this exact
/// walk (with `Pulse::Completion`) to resolve an `InitialState`'s chain
/// down to the real first child it should enter, since initial
/// transitions are unconditional in the same way a completion pulse's
/// matching rule is (no event, guard must be absent to pass).
pub(crate) fn resolve_compound<E: PartialEq>(
    graph: &Graph<E>,
    store: &InstanceStore,
    node: NodeId,
    pulse: &Pulse<E>,
) -> Option<Vec<TransitionId>> {
    for tid in graph.transitions_from(node) {
        let t = graph.transition(tid);
        let guard_ok = match pulse {
            Pulse::Event(e) => t.guard.as_ref().map_or(true, |g| g(e)),
            Pulse::Completion { .. } | Pulse::TimerFired(_) => t.guard.is_none(),
            Pulse::Init { .. } => false,
        };
        if !guard_ok {
            continue;
        }
        match t.target {
            None => return Some(vec![tid]),
            Some(target) => {
                let target_kind = graph.node(target).kind;
                if target_kind.is_pseudo() && !target_kind.is_history() && !target_kind.is_sink() {
                    if let Some(mut chain) = resolve_compound(graph, store, target, pulse) {
                        let mut out = vec![tid];
                        out.append(&mut chain);
                        return Some(out);
                    }
                } else {
                    return Some(vec![tid]);
                }
            }
        }
    }
    None
}
