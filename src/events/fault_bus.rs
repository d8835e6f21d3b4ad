//! Broadcast channel for drain failures.
//!
//! Wait callbacks run on pool threads with nobody to return an error to.
//! When a drain fails, the failure is logged and published here as a
//! [`DrainFault`]; any number of observers may subscribe.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::CollabError;
use crate::native::CollabEventType;

/// A drain that stopped on an error.
#[derive(Debug, Clone)]
pub struct DrainFault {
    /// Event kind of the slot being drained.
    pub event_type: CollabEventType,
    /// The error that stopped the drain.
    pub error: CollabError,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
}

impl DrainFault {
    /// Creates a fault stamped with the current time.
    #[must_use]
    pub fn new(event_type: CollabEventType, error: CollabError) -> Self {
        Self {
            event_type,
            error,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast bus for [`DrainFault`]s.
///
/// When the ring buffer is full, the oldest faults are dropped for lagging
/// receivers.
#[derive(Debug, Clone)]
pub struct FaultBus {
    sender: broadcast::Sender<DrainFault>,
}

impl FaultBus {
    /// Creates a bus holding up to `capacity` undelivered faults.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a fault. Returns the number of receivers reached.
    pub fn publish(&self, fault: DrainFault) -> usize {
        self.sender.send(fault).unwrap_or(0)
    }

    /// Creates a receiver for all future faults.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DrainFault> {
        self.sender.subscribe()
    }

    /// Returns the current number of receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::native::E_HANDLE;

    fn fault() -> DrainFault {
        DrainFault::new(
            CollabEventType::WatchListChanged,
            CollabError::platform("PeerCollabGetEventData", E_HANDLE),
        )
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = FaultBus::new(16);
        assert_eq!(bus.publish(fault()), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = FaultBus::new(0);
        let _rx = bus.subscribe();
        assert_eq!(bus.publish(fault()), 1);
    }

    #[tokio::test]
    async fn subscriber_receives_fault() {
        let bus = FaultBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(fault());
        let Ok(received) = rx.recv().await else {
            panic!("expected a fault");
        };
        assert_eq!(received.event_type, CollabEventType::WatchListChanged);
        assert_eq!(received.error.os_code(), Some(E_HANDLE));
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = FaultBus::new(4);
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.receiver_count(), 2);
        drop(rx1);
        assert_eq!(bus.receiver_count(), 1);
    }
}
