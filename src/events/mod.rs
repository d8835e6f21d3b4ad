//! Native event registry and notification dispatch.
//!
//! A [`SubscriptionSlot`] lazily binds one event kind to the native
//! subsystem and multiplexes any number of handlers onto that binding.
//! When the platform signals the slot, the queue is drained, each record
//! decoded and filtered, and the resulting notification delivered through
//! the context's [`Dispatcher`]. Drain failures land on the [`FaultBus`].

pub mod context;
pub mod dispatch;
pub mod drain;
pub mod fault_bus;
pub mod slot;
pub mod subscribers;

pub use context::CollabContext;
pub use dispatch::{DispatchJob, Dispatcher, SynchronizingContext, TaskQueue, TaskQueueWorker};
pub use drain::DrainOutcome;
pub use fault_bus::{DrainFault, FaultBus};
pub use slot::{RecordFilter, SlotPhase, SlotScope, SubscriptionSlot};
pub use subscribers::{Handler, SubscriberSet, SubscriptionToken, handler};
