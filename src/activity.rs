//! Do-activities: a user closure spawned on its own worker thread when its
//! owning state is entered, and joined when the state is exited. Grounded
//! in `toysm/core.py`'s `start_do_activity`/`stop_do_activity`.

use crate::graph::NodeId;
use crate::machine::InstanceKey;
use crate::queue::Poster;
use crate::store::ExitLatch;
use std::sync::Arc;
use std::time::Duration;

/// Handed to a running do-activity closure so it can cooperate with
/// cancellation and feed events back into the owning instance.
pub struct DoActivityHandle<E> {
    instance: InstanceKey,
    state: NodeId,
    latch: ExitLatch,
    poster: Poster<E>,
}

impl<E> DoActivityHandle<E> {
    pub fn new(instance: InstanceKey, state: NodeId, latch: ExitLatch, poster: Poster<E>) -> Self {
        DoActivityHandle {
            instance,
            state,
            latch,
            poster,
        }
    }

    pub fn instance(&self) -> &InstanceKey {
        &self.instance
    }

    pub fn state(&self) -> NodeId {
        self.state
    }

    pub fn should_exit(&self) -> bool {
        self.latch.should_exit()
    }

    /// Block up to `timeout` for the exit signal; returns `true` if it was
    /// raised. Activities doing real work should call this in a loop
    /// instead of busy-polling `should_exit`.
    pub fn wait_for_exit(&self, timeout: Duration) -> bool {
        self.latch.wait_for_exit(timeout)
    }

    pub fn post(&self, evt: E)
    where
        E: Send + 'static,
    {
        self.poster.post(evt);
    }

    /// Post completion of this activity's own state, used internally when
    /// the activity closure returns `false` on its own (spec §4.8).
    fn post_self_completion(&self) {
        self.poster.post_completion(self.instance.clone(), self.state);
    }
}

/// Start a do-activity worker for `node` (spec §4.8): one dedicated
/// thread, running `activity` in a loop until it returns `false` or the
/// exit latch is signaled, whichever comes first. The worker posts the
/// state's own completion when the activity finishes on its own (not when
/// cancelled by `exit_state`, which already has its own teardown path).
pub(crate) fn spawn<E>(
    ctx: &crate::firer::Ctx<'_, E>,
    node: NodeId,
    activity: Arc<dyn Fn(&DoActivityHandle<E>) -> bool + Send + Sync>,
) where
    E: Send + 'static,
{
    let latch = ExitLatch::new();
    let handle = DoActivityHandle::new(ctx.instance_key.clone(), node, latch.clone(), ctx.poster.clone());
    let join = std::thread::spawn(move || {
        while !handle.should_exit() {
            if !activity(&handle) {
                if !handle.should_exit() {
                    handle.post_self_completion();
                }
                break;
            }
        }
    });
    ctx.inst.store.start_activity(node, latch, join);
}
