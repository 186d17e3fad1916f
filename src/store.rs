//! Per-instance runtime state: which substate is active under each plain
//! composite, which regions are still running under each parallel state,
//! and history snapshots — everything that varies by instance and must
//! never be written onto the shared, immutable [`crate::graph::Graph`].
//!
//! One [`InstanceStore`] exists per running machine instance (the demux
//! router is what maps many instances onto one graph, see
//! [`crate::demux`]). Grounded in `bpmn-lite-core`'s `Inner` + single-lock
//! wrapper shape (`store_memory.rs`), adapted from `tokio::sync::RwLock` to
//! `std::sync::Mutex` since this engine has no async runtime.

use crate::graph::NodeId;
use crate::timer::TimerHandle;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// What a history pseudo-state saved on its most recent exit.
#[derive(Clone)]
pub enum HistorySnapshot {
    /// Shallow: just the parent's active direct child.
    Shallow(NodeId),
    /// Deep: the full nested configuration below the parent, as a
    /// pre-order list of active nodes (see `Graph::preorder`).
    Deep(Vec<NodeId>),
}

/// The latch a do-activity worker polls/waits on to know it should stop.
/// Grounded in `toysm/core.py`'s `start_do_activity`/`stop_do_activity`
/// "exit_required" `threading.Event`.
#[derive(Clone)]
pub struct ExitLatch(Arc<(Mutex<bool>, Condvar)>);

impl ExitLatch {
    pub fn new() -> Self {
        ExitLatch(Arc::new((Mutex::new(false), Condvar::new())))
    }

    pub fn signal(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().expect("exit latch poisoned") = true;
        cvar.notify_all();
    }

    pub fn should_exit(&self) -> bool {
        *self.0 .0.lock().expect("exit latch poisoned")
    }

    pub fn wait_for_exit(&self, timeout: std::time::Duration) -> bool {
        let (lock, cvar) = &*self.0;
        let guard = lock.lock().expect("exit latch poisoned");
        if *guard {
            return true;
        }
        let (guard, _) = cvar
            .wait_timeout(guard, timeout)
            .expect("exit latch poisoned");
        *guard
    }
}

impl Default for ExitLatch {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveActivity {
    latch: ExitLatch,
    join: std::thread::JoinHandle<()>,
}

struct Inner {
    /// Active direct child of each plain composite state currently active.
    active_substate: HashMap<NodeId, NodeId>,
    /// Regions (direct children of a `Parallel` node) still running.
    still_running: HashMap<NodeId, std::collections::HashSet<NodeId>>,
    /// Most recent history snapshot per history pseudo-state.
    history: HashMap<NodeId, HistorySnapshot>,
    /// Timer handles armed for the currently active state that owns them,
    /// so `_exit` can cancel them (see `crate::firer`).
    armed_timers: HashMap<NodeId, Vec<TimerHandle>>,
    /// Live do-activity worker per active state that declared one.
    activities: HashMap<NodeId, ActiveActivity>,
    /// The full currently-active node set (leaves and their ancestors),
    /// maintained incrementally by the firer for O(1) "is X active" checks.
    active: std::collections::HashSet<NodeId>,
}

pub struct InstanceStore {
    inner: Mutex<Inner>,
}

impl InstanceStore {
    pub fn new() -> Self {
        InstanceStore {
            inner: Mutex::new(Inner {
                active_substate: HashMap::new(),
                still_running: HashMap::new(),
                history: HashMap::new(),
                armed_timers: HashMap::new(),
                activities: HashMap::new(),
                active: std::collections::HashSet::new(),
            }),
        }
    }

    pub fn active_substate(&self, parent: NodeId) -> Option<NodeId> {
        self.inner.lock().expect("store poisoned").active_substate.get(&parent).copied()
    }

    pub fn set_active_substate(&self, parent: NodeId, child: NodeId) {
        self.inner
            .lock()
            .expect("store poisoned")
            .active_substate
            .insert(parent, child);
    }

    pub fn clear_active_substate(&self, parent: NodeId) {
        self.inner.lock().expect("store poisoned").active_substate.remove(&parent);
    }

    pub fn still_running(&self, parent: NodeId) -> std::collections::HashSet<NodeId> {
        self.inner
            .lock()
            .expect("store poisoned")
            .still_running
            .get(&parent)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_still_running(&self, parent: NodeId, regions: std::collections::HashSet<NodeId>) {
        self.inner
            .lock()
            .expect("store poisoned")
            .still_running
            .insert(parent, regions);
    }

    pub fn region_completed(&self, parent: NodeId, region: NodeId) -> bool {
        let mut inner = self.inner.lock().expect("store poisoned");
        if let Some(set) = inner.still_running.get_mut(&parent) {
            set.remove(&region);
            set.is_empty()
        } else {
            false
        }
    }

    pub fn save_history(&self, history_node: NodeId, snapshot: HistorySnapshot) {
        self.inner
            .lock()
            .expect("store poisoned")
            .history
            .insert(history_node, snapshot);
    }

    pub fn take_history(&self, history_node: NodeId) -> Option<HistorySnapshot> {
        self.inner.lock().expect("store poisoned").history.get(&history_node).cloned()
    }

    pub fn arm_timer(&self, state: NodeId, handle: TimerHandle) {
        self.inner
            .lock()
            .expect("store poisoned")
            .armed_timers
            .entry(state)
            .or_default()
            .push(handle);
    }

    pub fn take_armed_timers(&self, state: NodeId) -> Vec<TimerHandle> {
        self.inner
            .lock()
            .expect("store poisoned")
            .armed_timers
            .remove(&state)
            .unwrap_or_default()
    }

    pub fn start_activity(&self, state: NodeId, latch: ExitLatch, join: std::thread::JoinHandle<()>) {
        self.inner
            .lock()
            .expect("store poisoned")
            .activities
            .insert(state, ActiveActivity { latch, join });
    }

    /// Signal and join the do-activity worker for `state`, if any is live.
    pub fn stop_activity(&self, state: NodeId) {
        let activity = self.inner.lock().expect("store poisoned").activities.remove(&state);
        if let Some(activity) = activity {
            activity.latch.signal();
            let _ = activity.join.join();
        }
    }

    pub fn mark_active(&self, node: NodeId) {
        self.inner.lock().expect("store poisoned").active.insert(node);
    }

    pub fn mark_inactive(&self, node: NodeId) {
        self.inner.lock().expect("store poisoned").active.remove(&node);
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        self.inner.lock().expect("store poisoned").active.contains(&node)
    }

    pub fn active_configuration(&self) -> std::collections::HashSet<NodeId> {
        self.inner.lock().expect("store poisoned").active.clone()
    }
}

impl Default for InstanceStore {
    fn default() -> Self {
        Self::new()
    }
}
