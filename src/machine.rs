//! The public `Machine` facade: owns the frozen [`crate::graph::Graph`],
//! the shared [`EventQueue`], the [`TimerScheduler`], the per-instance
//! store table, and the run-loop thread. A thin wrapper exposing `new`,
//! `start`, `stop`, `join`, `post`, `post_completion`, and `settle`
//! without itself doing any of the stepping.

use crate::error::{Error, Result, UsageError};
use crate::graph::{Graph, NodeId};
use crate::queue::{EventQueue, Poster};
use crate::runloop;
use crate::store::InstanceStore;
use crate::timer::TimerScheduler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shutdown latency bound: the run loop never blocks on the event queue
/// longer than this, so `stop()` is always noticed within one tick.
pub const MAX_STOP_WAIT: Duration = Duration::from_millis(100);

/// Identifies one running instance of a machine. The default key names
/// the implicit singleton instance used when no demux function is
/// configured. Wrapped in `Arc<str>` rather than `String` so cloning a
/// key into every queued pulse and every hook context is cheap.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey(Arc<str>);

impl InstanceKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        InstanceKey(key.into())
    }

    /// The implicit instance used when a machine has no demux function.
    pub fn singleton() -> Self {
        InstanceKey(Arc::from("__singleton__"))
    }

    /// Mint a fresh, globally unique key. For a demux closure whose
    /// incoming events carry no natural correlation id of their own to
    /// route on.
    pub fn generate() -> Self {
        InstanceKey(Arc::from(uuid::Uuid::now_v7().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `demux(event) -> (instance_key, routed_event)`. `None` means no demux
/// is configured: every event routes to [`InstanceKey::singleton`].
pub type DemuxFn<E> = Box<dyn Fn(&E) -> (InstanceKey, E) + Send + Sync>;

/// Invoked when a guard/action/hook/do-activity in a given instance
/// fails; the instance is stopped regardless, this is purely a
/// diagnostic/observability escape hatch.
pub type ErrorHook<E> = Box<dyn Fn(&InstanceKey, &str) + Send + Sync>;

pub(crate) struct Instance {
    pub store: InstanceStore,
    pub stopped: AtomicBool,
}

impl Instance {
    fn new() -> Self {
        Instance {
            store: InstanceStore::new(),
            stopped: AtomicBool::new(false),
        }
    }
}

/// State shared between the public `Machine` handle and the run-loop
/// thread it spawns. Everything here is `Send + Sync`; the graph is
/// read-only after `build()`, so sharing it across the handle and the
/// worker thread needs no additional synchronization beyond the `Arc`.
pub(crate) struct Shared<E> {
    pub graph: Graph<E>,
    pub queue: Arc<EventQueue<E>>,
    pub timers: TimerScheduler,
    pub instances: Mutex<HashMap<InstanceKey, Arc<Instance>>>,
    pub demux: Option<DemuxFn<E>>,
    pub on_error: Option<ErrorHook<E>>,
    pub terminate: AtomicBool,
    pub max_stop_wait: Duration,
}

impl<E> Shared<E> {
    pub(crate) fn instance(&self, key: &InstanceKey) -> Option<Arc<Instance>> {
        self.instances.lock().expect("instance table poisoned").get(key).cloned()
    }

    /// Returns the existing instance for `key`, or creates and registers a
    /// fresh one and reports `true` ("this instance is new, seed it with
    /// INIT") via the second tuple element: the first time a key is seen,
    /// a fresh instance store is created and an INIT pulse is enqueued
    /// for it.
    pub(crate) fn instance_or_create(&self, key: &InstanceKey) -> (Arc<Instance>, bool) {
        let mut table = self.instances.lock().expect("instance table poisoned");
        if let Some(inst) = table.get(key) {
            (inst.clone(), false)
        } else {
            let inst = Arc::new(Instance::new());
            table.insert(key.clone(), inst.clone());
            (inst, true)
        }
    }

    pub(crate) fn remove_instance(&self, key: &InstanceKey) {
        self.instances.lock().expect("instance table poisoned").remove(key);
    }

    pub(crate) fn all_stopped(&self) -> bool {
        let table = self.instances.lock().expect("instance table poisoned");
        table.values().all(|i| i.stopped.load(Ordering::SeqCst))
    }
}

/// A builder-produced, validated statechart bound to a live run loop. One
/// `Machine` drives one dedicated worker thread.
pub struct Machine<E> {
    shared: Arc<Shared<E>>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
    started: AtomicBool,
    /// Set by the run-loop's own thread just before it returns, so
    /// repeated `join(timeout)` calls can all observe completion without
    /// each one having to consume the `JoinHandle`.
    finished: Arc<(Mutex<bool>, Condvar)>,
}

impl<E> Machine<E>
where
    E: Clone + PartialEq + Send + std::fmt::Debug + 'static,
{
    /// Build a machine from an already-validated graph. Pass a demux
    /// closure to fan one event stream into many instances; omit it
    /// (`None`) for a single implicit instance.
    pub fn new(graph: Graph<E>, demux: Option<DemuxFn<E>>) -> Self {
        let shared = Arc::new(Shared {
            graph,
            queue: EventQueue::new(),
            timers: TimerScheduler::new(),
            instances: Mutex::new(HashMap::new()),
            demux,
            on_error: None,
            terminate: AtomicBool::new(false),
            max_stop_wait: MAX_STOP_WAIT,
        });
        Machine {
            shared,
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
            finished: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Install a hook invoked when a guard/action/hook/do-activity in some
    /// instance fails. Must be called before [`Self::start`].
    pub fn on_error(self, hook: ErrorHook<E>) -> Self {
        // `Arc::get_mut` only succeeds before any clone has escaped, which
        // holds here since `new` just constructed `shared`.
        let mut this = self;
        if let Some(shared) = Arc::get_mut(&mut this.shared) {
            shared.on_error = Some(hook);
        }
        this
    }

    /// Override the shutdown-latency bound (`MAX_STOP_WAIT`) for tests
    /// that want a faster `stop()`/`settle()` turnaround.
    pub fn with_max_stop_wait(self, wait: Duration) -> Self {
        let mut this = self;
        if let Some(shared) = Arc::get_mut(&mut this.shared) {
            shared.max_stop_wait = wait;
        }
        this
    }

    pub fn root(&self) -> NodeId {
        self.shared.graph.root()
    }

    /// Read-only access to the underlying graph, for an external
    /// visualization emitter or for tests that inspect structure.
    pub fn graph(&self) -> &Graph<E> {
        &self.shared.graph
    }

    /// Flatten the graph into a serializable [`crate::visualize::GraphSnapshot`]
    /// for an external renderer.
    pub fn snapshot(&self) -> crate::visualize::GraphSnapshot {
        crate::visualize::snapshot(&self.shared.graph)
    }

    /// Start the run-loop worker thread. Without a demux function the
    /// singleton instance is created and seeded with INIT immediately;
    /// with one, instances are created lazily as events are routed to
    /// previously-unseen keys.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Usage(UsageError::AlreadyStarted));
        }
        if self.shared.demux.is_none() {
            let (_, _) = self.shared.instance_or_create(&InstanceKey::singleton());
            self.shared.queue.put_init(InstanceKey::singleton());
        }
        let shared = self.shared.clone();
        let finished = self.finished.clone();
        let handle = std::thread::spawn(move || {
            runloop::run(shared);
            *finished.0.lock().expect("finished mutex poisoned") = true;
            finished.1.notify_all();
        });
        *self.worker.lock().expect("worker mutex poisoned") = Some(handle);
        Ok(())
    }

    /// Post an external event. `instance` is ignored when a demux function
    /// is configured (the demux decides routing); otherwise it must be
    /// `None` or [`InstanceKey::singleton`].
    pub fn post(&self, evt: E) {
        self.shared.queue.put_event(evt);
    }

    /// Advertised for do-activity workers and other internal callers that
    /// need to post a completion pulse directly.
    pub fn post_completion(&self, instance: InstanceKey, state: NodeId) {
        self.shared.queue.put_completion(instance, state);
    }

    /// A cheap, cloneable handle equivalent to [`Self::post`], suitable for
    /// handing to hook/action closures that must not borrow the `Machine`.
    pub fn poster(&self) -> Poster<E> {
        Poster::new(self.shared.queue.clone())
    }

    /// Stop one instance (`Some`), or the whole machine (`None`).
    /// Idempotent: stopping an already-stopped instance, or an
    /// already-terminated machine, is a no-op.
    pub fn stop(&self, instance: Option<InstanceKey>) {
        match instance {
            Some(key) => {
                if let Some(inst) = self.shared.instance(&key) {
                    inst.stopped.store(true, Ordering::SeqCst);
                    for node in inst.store.active_configuration() {
                        inst.store.stop_activity(node);
                        for handle in inst.store.take_armed_timers(node) {
                            self.shared.timers.cancel(handle);
                        }
                    }
                }
                self.shared.remove_instance(&key);
            }
            None => {
                self.shared.terminate.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Block up to `timeout` for the worker thread to exit. Returns
    /// `false` if it is still running at the deadline. Safe to call more
    /// than once, and safe to call before `start()` (in which case it
    /// returns `true` immediately: there is nothing to wait for).
    pub fn join(&self, timeout: Duration) -> bool {
        if !self.started.load(Ordering::SeqCst) {
            return true;
        }
        let (lock, cvar) = &*self.finished;
        let mut done = lock.lock().expect("finished mutex poisoned");
        let deadline = std::time::Instant::now() + timeout;
        while !*done {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = cvar
                .wait_timeout(done, deadline - now)
                .expect("finished condvar poisoned");
            done = guard;
        }
        true
    }

    /// True iff the event queue became empty while a consumer (the run
    /// loop) was parked waiting on it.
    pub fn settle(&self, timeout: Duration) -> bool {
        self.shared.queue.settle(timeout)
    }
}
