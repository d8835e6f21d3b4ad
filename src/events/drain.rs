//! Draining a slot's native event queue.
//!
//! Each time the slot's wait primitive is signaled, the pool thread pulls
//! records until the queue reports no more data. Every record is decoded,
//! freed, filtered against the owning entity and handed to the dispatcher.
//! One drain runs per slot at a time; the state lock is taken only around
//! the native dequeue so handlers may subscribe or unsubscribe freely.

use serde::Serialize;

use super::fault_bus::DrainFault;
use super::slot::SlotInner;
use crate::codec::decode_event;
use crate::domain::Notification;
use crate::error::CollabError;
use crate::native::{EventPoll, ScopedData};

/// Result of one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    /// The queue was emptied; this many notifications were dispatched.
    Drained(usize),
    /// The slot lost its registration (torn down or unsubscribed).
    Closed,
}

pub(super) fn drain<N: Notification>(inner: &SlotInner<N>) -> Result<DrainOutcome, CollabError> {
    let _drain = inner.drain_lock.lock();
    let platform = inner.ctx.platform();
    let mut delivered = 0;

    loop {
        let (data, handlers) = {
            let state = inner.state.lock();
            let Some(registration) = state
                .binding
                .as_ref()
                .and_then(|binding| binding.registration.get())
            else {
                return Ok(DrainOutcome::Closed);
            };
            match platform.get_event_data(registration) {
                Ok(EventPoll::NoMoreData) => break,
                Ok(EventPoll::Record(data)) => (data, state.subscribers.snapshot()),
                Err(code) => return Err(CollabError::platform("PeerCollabGetEventData", code)),
            }
        };

        let record = {
            let data = ScopedData::new(&**platform, data);
            let native = platform
                .event_record(data.handle())
                .map_err(|code| CollabError::platform("PeerCollabGetEventData", code))?;
            decode_event(&**platform, &native)?
        };

        let Some(record) = record else {
            tracing::trace!(kind = ?inner.kind, "record without subject skipped");
            continue;
        };
        if !(inner.filter)(&record) {
            continue;
        }
        let Some(notification) = N::from_record(record) else {
            continue;
        };
        delivered += 1;
        inner.ctx.dispatcher().dispatch(handlers, notification);
    }

    Ok(DrainOutcome::Drained(delivered))
}

/// Wait callback body: drains and reports failures.
pub(super) fn on_signal<N: Notification>(inner: &SlotInner<N>) {
    match drain(inner) {
        Ok(DrainOutcome::Drained(delivered)) => {
            tracing::trace!(kind = ?inner.kind, delivered, "slot drained");
        }
        Ok(DrainOutcome::Closed) => {
            tracing::debug!(kind = ?inner.kind, "signal ignored, slot is closed");
        }
        Err(error) => {
            tracing::error!(kind = ?inner.kind, %error, "drain failed");
            inner.ctx.faults().publish(DrainFault::new(inner.kind, error));
        }
    }
}
