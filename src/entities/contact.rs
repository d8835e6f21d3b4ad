//! Change notifications filtered to one contact.

use std::sync::Arc;

use crate::domain::{
    ApplicationChanged, ChangeRecord, Notification, ObjectChanged, PeerContact, PresenceChanged,
};
use crate::events::{CollabContext, SlotScope, SubscriptionSlot};
use crate::native::CollabEventType;

const OWNER: &str = "ContactEvents";

/// Application, object and presence changes published by the endpoints of
/// one contact.
#[derive(Debug)]
pub struct ContactEvents {
    contact: PeerContact,
    application_changed: SubscriptionSlot<ApplicationChanged>,
    object_changed: SubscriptionSlot<ObjectChanged>,
    presence_changed: SubscriptionSlot<PresenceChanged>,
}

fn for_contact<N: Notification>(
    ctx: &CollabContext,
    kind: CollabEventType,
    contact: &PeerContact,
) -> SubscriptionSlot<N> {
    let watched = contact.clone();
    SubscriptionSlot::filtered(
        ctx.clone(),
        kind,
        SlotScope::Global,
        OWNER,
        Arc::new(move |record: &ChangeRecord| record.contact() == Some(&watched)),
    )
}

impl ContactEvents {
    pub(crate) fn new(ctx: &CollabContext, contact: PeerContact) -> Self {
        Self {
            application_changed: for_contact(
                ctx,
                CollabEventType::EndPointApplicationChanged,
                &contact,
            ),
            object_changed: for_contact(ctx, CollabEventType::EndPointObjectChanged, &contact),
            presence_changed: for_contact(
                ctx,
                CollabEventType::EndPointPresenceChanged,
                &contact,
            ),
            contact,
        }
    }

    /// The watched contact.
    #[must_use]
    pub fn contact(&self) -> &PeerContact {
        &self.contact
    }

    /// Applications published by this contact.
    #[must_use]
    pub fn application_changed(&self) -> &SubscriptionSlot<ApplicationChanged> {
        &self.application_changed
    }

    /// Objects published by this contact.
    #[must_use]
    pub fn object_changed(&self) -> &SubscriptionSlot<ObjectChanged> {
        &self.object_changed
    }

    /// Presence changes of this contact's endpoints.
    #[must_use]
    pub fn presence_changed(&self) -> &SubscriptionSlot<PresenceChanged> {
        &self.presence_changed
    }

    /// Tears down every slot. Idempotent.
    pub fn dispose(&self) {
        self.application_changed.teardown();
        self.object_changed.teardown();
        self.presence_changed.teardown();
    }
}
