//! Shared services every subscription slot needs.

use std::sync::Arc;

use super::dispatch::{Dispatcher, TaskQueue, TaskQueueWorker};
use super::fault_bus::FaultBus;
use crate::config::{BridgeConfig, DispatchMode};
use crate::native::{CollabPlatform, PEER_COLLAB_VERSION};

/// Default capacity of the [`FaultBus`].
pub const DEFAULT_FAULT_BUS_CAPACITY: usize = 1024;

/// Platform binding, dispatch strategy and fault bus, shared by the slots
/// of every entity created from it. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct CollabContext {
    platform: Arc<dyn CollabPlatform>,
    dispatcher: Dispatcher,
    faults: FaultBus,
    platform_version: u16,
}

impl CollabContext {
    /// Creates a context with direct dispatch and default settings.
    #[must_use]
    pub fn new(platform: Arc<dyn CollabPlatform>) -> Self {
        Self {
            platform,
            dispatcher: Dispatcher::Direct,
            faults: FaultBus::new(DEFAULT_FAULT_BUS_CAPACITY),
            platform_version: PEER_COLLAB_VERSION,
        }
    }

    /// Creates a context from configuration. In queued mode the returned
    /// worker must be run for notifications to be delivered.
    #[must_use]
    pub fn from_config(
        platform: Arc<dyn CollabPlatform>,
        config: &BridgeConfig,
    ) -> (Self, Option<TaskQueueWorker>) {
        let (dispatcher, worker) = match config.dispatch_mode {
            DispatchMode::Direct => (Dispatcher::Direct, None),
            DispatchMode::Queued => {
                let (queue, worker) = TaskQueue::new();
                (Dispatcher::Context(queue), Some(worker))
            }
        };
        let context = Self {
            platform,
            dispatcher,
            faults: FaultBus::new(config.fault_bus_capacity),
            platform_version: config.platform_version,
        };
        (context, worker)
    }

    /// Replaces the dispatch strategy.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Returns the platform binding.
    #[must_use]
    pub fn platform(&self) -> &Arc<dyn CollabPlatform> {
        &self.platform
    }

    /// Returns the dispatch strategy.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the fault bus.
    #[must_use]
    pub fn faults(&self) -> &FaultBus {
        &self.faults
    }

    /// Returns the API version passed to startup.
    #[must_use]
    pub fn platform_version(&self) -> u16 {
        self.platform_version
    }
}
