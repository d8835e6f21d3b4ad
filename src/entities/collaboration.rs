//! Entry point handing out the event sources.

use std::sync::{Arc, OnceLock};

use super::{
    ApplicationEvents, ContactEvents, ContactManager, EndPointEvents, LocalPeerEvents,
    ObjectEvents,
};
use crate::domain::{CollabId, PeerContact, PeerEndPoint};
use crate::events::CollabContext;

/// Root of the collaboration event surface.
///
/// Owns the local peer's event source and lazily creates the single
/// [`ContactManager`]. Per-entity sources are created on demand and owned
/// by the caller.
#[derive(Debug)]
pub struct Collaboration {
    ctx: CollabContext,
    local_peer: LocalPeerEvents,
    contact_manager: OnceLock<Arc<ContactManager>>,
}

impl Collaboration {
    /// Creates the root over a context.
    #[must_use]
    pub fn new(ctx: CollabContext) -> Self {
        Self {
            local_peer: LocalPeerEvents::new(&ctx),
            contact_manager: OnceLock::new(),
            ctx,
        }
    }

    /// Returns the shared context.
    #[must_use]
    pub fn context(&self) -> &CollabContext {
        &self.ctx
    }

    /// Returns the local peer's event source.
    #[must_use]
    pub fn local_peer(&self) -> &LocalPeerEvents {
        &self.local_peer
    }

    /// Returns the contact manager, creating it on first use.
    #[must_use]
    pub fn contact_manager(&self) -> Arc<ContactManager> {
        Arc::clone(
            self.contact_manager
                .get_or_init(|| Arc::new(ContactManager::new(&self.ctx))),
        )
    }

    /// Creates an event source for one contact.
    #[must_use]
    pub fn contact_events(&self, contact: PeerContact) -> ContactEvents {
        ContactEvents::new(&self.ctx, contact)
    }

    /// Creates an event source for one endpoint.
    #[must_use]
    pub fn endpoint_events(&self, endpoint: PeerEndPoint) -> EndPointEvents {
        EndPointEvents::new(&self.ctx, endpoint)
    }

    /// Creates an event source for one application id.
    #[must_use]
    pub fn application_events(&self, id: CollabId) -> ApplicationEvents {
        ApplicationEvents::new(&self.ctx, id)
    }

    /// Creates an event source for one object id.
    #[must_use]
    pub fn object_events(&self, id: CollabId) -> ObjectEvents {
        ObjectEvents::new(&self.ctx, id)
    }

    /// Tears down the local peer source and the contact manager.
    pub fn dispose(&self) {
        self.local_peer.dispose();
        if let Some(manager) = self.contact_manager.get() {
            manager.dispose();
        }
    }
}
