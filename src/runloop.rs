//! Run Loop: one worker thread per machine. Drains due timers, blocks on
//! the event queue up to the next timer deadline (bounded by
//! [`crate::machine::MAX_STOP_WAIT`]), and dispatches whatever it gets by
//! tier, over this crate's explicit `Shared<E>` rather than module-level
//! state.

use crate::demux;
use crate::firer::{self, Ctx};
use crate::graph::{NodeId, NodeKind};
use crate::machine::{Instance, InstanceKey, Shared};
use crate::queue::{Poster, Pulse};
use crate::selector;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub(crate) fn run<E>(shared: Arc<Shared<E>>)
where
    E: Clone + PartialEq + Send + std::fmt::Debug + 'static,
{
    tracing::info!("run loop starting");
    loop {
        if shared.terminate.load(Ordering::SeqCst) {
            break;
        }

        for (instance_key, tid) in shared.timers.drain_due() {
            if let Some(inst) = shared.instance(&instance_key) {
                if !inst.stopped.load(Ordering::SeqCst) {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        fire_timer(&shared, &instance_key, &inst, tid)
                    }));
                    if let Err(payload) = result {
                        report_panic(&shared, &instance_key, &inst, "timeout", payload);
                    }
                }
            }
            finalize_if_stopped(&shared, &instance_key);
        }

        if shared.terminate.load(Ordering::SeqCst)
            || (shared.demux.is_none() && shared.all_stopped())
        {
            break;
        }

        let wait = match shared.timers.next_deadline() {
            Some(d) => d.min(shared.max_stop_wait),
            None => shared.max_stop_wait,
        };

        let pulse = match shared.queue.get(wait) {
            None => continue,
            Some(p) => p,
        };

        dispatch(&shared, pulse);
    }
    tracing::info!("run loop exiting");
}

fn dispatch<E>(shared: &Arc<Shared<E>>, pulse: Pulse<E>)
where
    E: Clone + PartialEq + Send + std::fmt::Debug + 'static,
{
    match pulse {
        Pulse::Init { instance } => {
            if let Some(inst) = shared.instance(&instance) {
                if !inst.stopped.load(Ordering::SeqCst) {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        do_init(shared, &instance, &inst)
                    }));
                    if let Err(payload) = result {
                        report_panic(shared, &instance, &inst, "init", payload);
                    }
                }
            }
            finalize_if_stopped(shared, &instance);
        }
        Pulse::Completion { instance, state } => {
            if let Some(inst) = shared.instance(&instance) {
                if !inst.stopped.load(Ordering::SeqCst) {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handle_completion(shared, &instance, &inst, state)
                    }));
                    if let Err(payload) = result {
                        report_panic(shared, &instance, &inst, "completion", payload);
                    }
                }
            }
            finalize_if_stopped(shared, &instance);
        }
        Pulse::Event(evt) => {
            let (key, routed) = demux::route(&shared.demux, evt.clone());
            let (inst, is_new) = shared.instance_or_create(&key);
            if is_new {
                tracing::debug!(instance = %key, "routing to newly demuxed instance");
                shared.queue.put_init(key.clone());
                shared.queue.put_event(evt);
            } else if !inst.stopped.load(Ordering::SeqCst) {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    dispatch_event(shared, &key, &inst, routed)
                }));
                if let Err(payload) = result {
                    report_panic(shared, &key, &inst, "event", payload);
                }
            }
            finalize_if_stopped(shared, &key);
        }
        Pulse::TimerFired(_) => {
            unreachable!("timers are drained directly by the run loop, never queued")
        }
    }
}

/// Spec §7's runtime-error path: a guard/action/hook panicking mid-step is
/// caught here rather than taking down the whole worker thread. Logged,
/// handed to the optional `on_error` hook, and the affected instance is
/// stopped — or, with no demux configured, the whole (singleton) machine,
/// since there is only one instance to stop in that case.
fn report_panic<E>(
    shared: &Arc<Shared<E>>,
    key: &InstanceKey,
    inst: &Instance,
    phase: &str,
    payload: Box<dyn std::any::Any + Send>,
) {
    let message = panic_message(&payload);
    tracing::error!(instance = %key, phase, error = %message, "guard/action/hook panicked");
    if let Some(hook) = &shared.on_error {
        hook(key, &message);
    }
    inst.stopped.store(true, Ordering::SeqCst);
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn do_init<E>(shared: &Arc<Shared<E>>, key: &InstanceKey, inst: &Instance)
where
    E: Clone + PartialEq + Send + 'static,
{
    tracing::debug!(instance = %key, "init: entering top state");
    let poster = Poster::new(shared.queue.clone());
    let ctx = Ctx {
        shared,
        instance_key: key,
        inst,
        poster: &poster,
    };
    firer::enter_state(&ctx, None, shared.graph.root());
}

fn dispatch_event<E>(shared: &Arc<Shared<E>>, key: &InstanceKey, inst: &Instance, evt: E)
where
    E: Clone + PartialEq + Send + std::fmt::Debug + 'static,
{
    tracing::debug!(instance = %key, event = ?evt, "dispatching event");
    let poster = Poster::new(shared.queue.clone());
    let ctx = Ctx {
        shared,
        instance_key: key,
        inst,
        poster: &poster,
    };
    let chain = selector::select(&shared.graph, &inst.store, shared.graph.root(), &Pulse::Event(evt.clone()));
    firer::fire_all(&ctx, &chain, Some(&evt));
}

fn handle_completion<E>(shared: &Arc<Shared<E>>, key: &InstanceKey, inst: &Instance, state: NodeId)
where
    E: Clone + PartialEq + Send + 'static,
{
    let poster = Poster::new(shared.queue.clone());
    let ctx = Ctx {
        shared,
        instance_key: key,
        inst,
        poster: &poster,
    };
    let pulse = Pulse::Completion {
        instance: key.clone(),
        state,
    };
    let chain = selector::select(&shared.graph, &inst.store, state, &pulse);
    if !chain.is_empty() {
        firer::fire_all(&ctx, &chain, None);
    }
    child_completed(shared, key, inst, state);
}

/// Notify `state`'s parent that `state` reached a resting/completed
/// configuration. Only a `Parallel` parent does anything interesting with
/// this — it retires the finished region and, once every sibling region
/// has also finished, cascades its own completion up one more level. A
/// plain composite's parent is a no-op here beyond the bookkeeping
/// already done by `exit_state`/`mark_inactive`, unless an explicit
/// `Final` pseudo-state (handled directly in `firer::enter_state`) or a
/// completion-triggered transition (handled by the `select` call above)
/// says otherwise. A `state` with no parent at all is the top-level
/// region: the whole instance is done.
fn child_completed<E>(shared: &Arc<Shared<E>>, key: &InstanceKey, inst: &Instance, state: NodeId) {
    match shared.graph.parent(state) {
        None => {
            tracing::info!(instance = %key, "top-level region completed, stopping instance");
            // The configuration under `state` was already torn down by the
            // ordinary transition that led here (its `exit_state` call on
            // the way to the terminal node); `state`'s own `active_substate`
            // entry is stale at this point (reaching a sink pseudo-state
            // never rewrites its parent's mapping), so re-deriving an exit
            // path from it here would double-fire `pre_exit`/`post_exit`
            // hooks. `finalize_if_stopped` below handles the real teardown
            // (do-activities, armed timers) from the accurate active set.
            inst.stopped.store(true, Ordering::SeqCst);
        }
        Some(parent) => {
            if shared.graph.node(parent).kind == NodeKind::Parallel {
                if inst.store.region_completed(parent, state) {
                    shared.queue.put_completion(key.clone(), parent);
                }
            }
        }
    }
}

fn fire_timer<E>(shared: &Arc<Shared<E>>, key: &InstanceKey, inst: &Instance, tid: crate::graph::TransitionId)
where
    E: Clone + PartialEq + Send + 'static,
{
    tracing::debug!(instance = %key, "timeout fired");
    let poster = Poster::new(shared.queue.clone());
    let ctx = Ctx {
        shared,
        instance_key: key,
        inst,
        poster: &poster,
    };
    firer::fire_all(&ctx, std::slice::from_ref(&tid), None);
}

/// Tear down and evict an instance whose `stopped` flag has been set —
/// whether by a `TerminateState`, by `Machine::stop(Some(key))`, or by the
/// top-level-region-completed path above. Idempotent: a second call after
/// the instance has already been removed from the table is a no-op.
fn finalize_if_stopped<E>(shared: &Arc<Shared<E>>, key: &InstanceKey) {
    let Some(inst) = shared.instance(key) else {
        return;
    };
    if !inst.stopped.load(Ordering::SeqCst) {
        return;
    }
    for node in inst.store.active_configuration() {
        inst.store.stop_activity(node);
        for handle in inst.store.take_armed_timers(node) {
            shared.timers.cancel(handle);
        }
    }
    shared.remove_instance(key);
    if shared.demux.is_none() {
        shared.terminate.store(true, Ordering::SeqCst);
    }
}
