//! Change notifications about the local peer.

use crate::domain::{ApplicationChanged, NameChanged, ObjectChanged, PresenceChanged};
use crate::events::{CollabContext, SubscriptionSlot};
use crate::native::CollabEventType;

const OWNER: &str = "LocalPeerEvents";

/// Changes to the local endpoint, presence, applications and objects.
/// Contacts in these notifications describe the local identity.
#[derive(Debug)]
pub struct LocalPeerEvents {
    name_changed: SubscriptionSlot<NameChanged>,
    presence_changed: SubscriptionSlot<PresenceChanged>,
    application_changed: SubscriptionSlot<ApplicationChanged>,
    object_changed: SubscriptionSlot<ObjectChanged>,
}

impl LocalPeerEvents {
    pub(crate) fn new(ctx: &CollabContext) -> Self {
        Self {
            name_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::MyEndPointChanged,
                OWNER,
            ),
            presence_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::MyPresenceChanged,
                OWNER,
            ),
            application_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::MyApplicationChanged,
                OWNER,
            ),
            object_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::MyObjectChanged,
                OWNER,
            ),
        }
    }

    /// The local endpoint changing its name.
    #[must_use]
    pub fn name_changed(&self) -> &SubscriptionSlot<NameChanged> {
        &self.name_changed
    }

    /// Local presence changes.
    #[must_use]
    pub fn presence_changed(&self) -> &SubscriptionSlot<PresenceChanged> {
        &self.presence_changed
    }

    /// Locally registered applications.
    #[must_use]
    pub fn application_changed(&self) -> &SubscriptionSlot<ApplicationChanged> {
        &self.application_changed
    }

    /// Locally published objects.
    #[must_use]
    pub fn object_changed(&self) -> &SubscriptionSlot<ObjectChanged> {
        &self.object_changed
    }

    /// Tears down every slot. Idempotent.
    pub fn dispose(&self) {
        self.name_changed.teardown();
        self.presence_changed.teardown();
        self.application_changed.teardown();
        self.object_changed.teardown();
    }
}
