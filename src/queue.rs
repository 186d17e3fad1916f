//! The event queue: three priority tiers (completion > init > standard),
//! FIFO within a tier, blocking `get` with timeout, and a `settle` hook for
//! tests to observe "nothing left to process and the run loop is idle".
//!
//! A `Mutex` + two condition variables guard a binary heap keyed by
//! `(tier, seq)`, where `seq` is a monotonic counter assigned at `put`
//! time so entries within a tier drain in arrival order.
//!
//! One queue is shared by every instance of a demuxed machine (there is
//! one Run Loop thread per machine, not per instance). Only
//! `Pulse::Event` carries an un-demuxed payload; `Completion`/`Init` are
//! raised internally already bound to the instance and state they
//! concern, since the engine itself — not an external caller — produces
//! them.

use crate::graph::NodeId;
use crate::machine::InstanceKey;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// The three standing priority tiers, lowest value dequeues first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Completion = 0,
    Init = 1,
    Standard = 2,
}

/// What was actually queued, plus (for [`Pulse::TimerFired`]) a pulse kind
/// that is never inserted into the heap itself: a due `Timeout` is found
/// and routed to its instance directly by [`crate::runloop`] (spec §4.5
/// step 1 runs before step 2-3's queue poll), and handed to the selector
/// as this same `Pulse` type purely so `crate::selector::pulse_matches`
/// has one uniform match over "what triggered this selection".
pub enum Pulse<E> {
    /// A raw external (or hook-posted) event, not yet routed to an instance.
    Event(E),
    /// `state` reached a resting position with no further enabled
    /// transitions and no children left running; instance already known.
    Completion { instance: InstanceKey, state: NodeId },
    /// Seed event for a newly created (or the singleton) instance.
    Init { instance: InstanceKey },
    /// A specific `Timeout` transition's armed timer has elapsed.
    TimerFired(crate::graph::TransitionId),
}

struct Entry<E> {
    tier: Tier,
    seq: u64,
    payload: Pulse<E>,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.tier == other.tier && self.seq == other.seq
    }
}
impl<E> Eq for Entry<E> {}
impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.tier, self.seq).cmp(&(other.tier, other.seq))
    }
}

struct Inner<E> {
    heap: BinaryHeap<Reverse<Entry<E>>>,
    next_seq: u64,
    consumers: u32,
}

pub struct EventQueue<E> {
    inner: Mutex<Inner<E>>,
    avail: Condvar,
    settled: Condvar,
}

impl<E> EventQueue<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(EventQueue {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                consumers: 0,
            }),
            avail: Condvar::new(),
            settled: Condvar::new(),
        })
    }

    fn put_tier(&self, tier: Tier, payload: Pulse<E>) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(Reverse(Entry { tier, seq, payload }));
        self.avail.notify_one();
    }

    pub fn put_event(&self, evt: E) {
        self.put_tier(Tier::Standard, Pulse::Event(evt));
    }

    pub fn put_init(&self, instance: InstanceKey) {
        self.put_tier(Tier::Init, Pulse::Init { instance });
    }

    pub fn put_completion(&self, instance: InstanceKey, state: NodeId) {
        self.put_tier(Tier::Completion, Pulse::Completion { instance, state });
    }

    /// Blocks up to `timeout` for the next entry, in tier-then-arrival
    /// order. Returns `None` on timeout.
    pub fn get(&self, timeout: Duration) -> Option<Pulse<E>> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.consumers += 1;
        self.settled.notify_all();

        let deadline = Instant::now() + timeout;
        let result = loop {
            if let Some(Reverse(entry)) = inner.heap.pop() {
                break Some(entry.payload);
            }
            let now = Instant::now();
            if now >= deadline {
                break None;
            }
            let (guard, _) = self
                .avail
                .wait_timeout(inner, deadline - now)
                .expect("queue condvar poisoned");
            inner = guard;
        };

        inner.consumers -= 1;
        self.settled.notify_all();
        result
    }

    /// True iff the queue is empty and at least one consumer is currently
    /// parked in `get` — i.e. the run loop has caught up and is waiting.
    pub fn settle(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        let deadline = Instant::now() + timeout;
        loop {
            if inner.heap.is_empty() && inner.consumers > 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return inner.heap.is_empty() && inner.consumers > 0;
            }
            let (guard, timed_out) = self
                .settled
                .wait_timeout(inner, deadline - now)
                .expect("queue condvar poisoned");
            inner = guard;
            if timed_out.timed_out() && inner.heap.is_empty() && inner.consumers == 0 {
                return false;
            }
        }
    }
}

/// A cheap, cloneable handle for posting into a machine's queue from hook/
/// action closures or from do-activity worker threads.
pub struct Poster<E> {
    queue: Arc<EventQueue<E>>,
}

impl<E> Clone for Poster<E> {
    fn clone(&self) -> Self {
        Poster {
            queue: self.queue.clone(),
        }
    }
}

impl<E> Poster<E> {
    pub fn new(queue: Arc<EventQueue<E>>) -> Self {
        Poster { queue }
    }

    pub fn post(&self, evt: E) {
        self.queue.put_event(evt);
    }

    pub fn post_completion(&self, instance: InstanceKey, state: NodeId) {
        self.queue.put_completion(instance, state);
    }
}
