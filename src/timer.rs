//! The timer scheduler backing `Timeout` transitions and do-activity
//! deadlines. A min-heap of `(deadline, seq)` behind one `Mutex`, polled
//! non-blockingly by the run loop each iteration (see `crate::runloop`).
//!
//! Grounded in the original's use of `sched.scheduler`, reframed per the
//! redesign notes as an explicit arena of handles rather than a global
//! singleton scheduler instance.

use crate::graph::TransitionId;
use crate::machine::InstanceKey;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

struct Armed {
    deadline: Instant,
    seq: u64,
    handle: TimerHandle,
    /// Which instance's `Timeout` transition this is — the scheduler is
    /// shared across every instance of a machine (spec §4.7), so the
    /// payload must carry enough to route the firing back to the right
    /// `InstanceStore` once it's due.
    instance: InstanceKey,
    transition: TransitionId,
}

impl PartialEq for Armed {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for Armed {}
impl PartialOrd for Armed {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Armed {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

struct Inner {
    heap: BinaryHeap<Reverse<Armed>>,
    next_seq: u64,
    next_handle: u64,
    cancelled: HashSet<u64>,
}

pub struct TimerScheduler {
    inner: Mutex<Inner>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        TimerScheduler {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                next_handle: 0,
                cancelled: HashSet::new(),
            }),
        }
    }

    pub fn schedule(&self, delay: Duration, instance: InstanceKey, transition: TransitionId) -> TimerHandle {
        let mut inner = self.inner.lock().expect("timer mutex poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let id = inner.next_handle;
        inner.next_handle += 1;
        let handle = TimerHandle(id);
        inner.heap.push(Reverse(Armed {
            deadline: Instant::now() + delay,
            seq,
            handle,
            instance,
            transition,
        }));
        handle
    }

    /// Cancel a previously scheduled timer. A no-op if it already fired or
    /// was already cancelled — mirrors `Timeout`'s `exit` hook in the
    /// original, which cancels unconditionally without checking liveness.
    pub fn cancel(&self, handle: TimerHandle) {
        let mut inner = self.inner.lock().expect("timer mutex poisoned");
        inner.cancelled.insert(handle.0);
    }

    /// Pop and return every `(instance, transition)` whose deadline has
    /// passed.
    pub fn drain_due(&self) -> Vec<(InstanceKey, TransitionId)> {
        let mut inner = self.inner.lock().expect("timer mutex poisoned");
        let now = Instant::now();
        let mut due = Vec::new();
        while let Some(Reverse(top)) = inner.heap.peek() {
            if top.deadline > now {
                break;
            }
            let Reverse(armed) = inner.heap.pop().unwrap();
            if inner.cancelled.remove(&armed.handle.0) {
                continue;
            }
            due.push((armed.instance, armed.transition));
        }
        due
    }

    /// Delay until the next still-pending (non-cancelled) deadline, or
    /// `None` if the scheduler holds nothing live. Pops stale (cancelled)
    /// entries off the top before reading the deadline, since `BinaryHeap`
    /// only orders its root, not the full iteration order.
    pub fn next_deadline(&self) -> Option<Duration> {
        let mut inner = self.inner.lock().expect("timer mutex poisoned");
        loop {
            let stale = match inner.heap.peek() {
                Some(Reverse(top)) => inner.cancelled.contains(&top.handle.0),
                None => return None,
            };
            if stale {
                inner.heap.pop();
                continue;
            }
            let Reverse(top) = inner.heap.peek().unwrap();
            return Some(top.deadline.saturating_duration_since(Instant::now()));
        }
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new()
    }
}
