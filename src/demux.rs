//! Demux Router (spec §4.10): maps one external event stream onto many
//! machine instances. `route` is the whole of it — instance creation and
//! INIT-seeding live in [`crate::runloop`], which is the only caller with
//! access to the instance table and event queue both.

use crate::machine::{DemuxFn, InstanceKey};

/// Route `evt` to an instance key and the (possibly rewritten) event that
/// instance should see. Without a configured demux function every event
/// goes to the implicit [`InstanceKey::singleton`] unchanged.
pub fn route<E>(demux: &Option<DemuxFn<E>>, evt: E) -> (InstanceKey, E) {
    match demux {
        Some(f) => f(&evt),
        None => (InstanceKey::singleton(), evt),
    }
}
