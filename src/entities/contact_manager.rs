//! Change notifications about the contact store and every remote endpoint.

use crate::domain::{
    ApplicationChanged, NameChanged, ObjectChanged, PresenceChanged, SubscriptionListChanged,
};
use crate::events::{CollabContext, SubscriptionSlot};
use crate::native::CollabEventType;

const OWNER: &str = "ContactManager";

/// Identity-agnostic notifications for the contact store.
///
/// Obtained from [`super::Collaboration::contact_manager`]; there is one per
/// [`super::Collaboration`].
#[derive(Debug)]
pub struct ContactManager {
    subscription_list_changed: SubscriptionSlot<SubscriptionListChanged>,
    name_changed: SubscriptionSlot<NameChanged>,
    presence_changed: SubscriptionSlot<PresenceChanged>,
    application_changed: SubscriptionSlot<ApplicationChanged>,
    object_changed: SubscriptionSlot<ObjectChanged>,
}

impl ContactManager {
    pub(crate) fn new(ctx: &CollabContext) -> Self {
        Self {
            subscription_list_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::WatchListChanged,
                OWNER,
            ),
            name_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::EndPointChanged,
                OWNER,
            ),
            presence_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::EndPointPresenceChanged,
                OWNER,
            ),
            application_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::EndPointApplicationChanged,
                OWNER,
            ),
            object_changed: SubscriptionSlot::global(
                ctx.clone(),
                CollabEventType::EndPointObjectChanged,
                OWNER,
            ),
        }
    }

    /// Contacts entering, leaving or changing in the watch list.
    #[must_use]
    pub fn subscription_list_changed(&self) -> &SubscriptionSlot<SubscriptionListChanged> {
        &self.subscription_list_changed
    }

    /// Remote endpoints changing their name.
    #[must_use]
    pub fn name_changed(&self) -> &SubscriptionSlot<NameChanged> {
        &self.name_changed
    }

    /// Presence changes of remote endpoints.
    #[must_use]
    pub fn presence_changed(&self) -> &SubscriptionSlot<PresenceChanged> {
        &self.presence_changed
    }

    /// Applications published by remote endpoints.
    #[must_use]
    pub fn application_changed(&self) -> &SubscriptionSlot<ApplicationChanged> {
        &self.application_changed
    }

    /// Objects published by remote endpoints.
    #[must_use]
    pub fn object_changed(&self) -> &SubscriptionSlot<ObjectChanged> {
        &self.object_changed
    }

    /// Tears down every slot. Idempotent.
    pub fn dispose(&self) {
        self.subscription_list_changed.teardown();
        self.name_changed.teardown();
        self.presence_changed.teardown();
        self.application_changed.teardown();
        self.object_changed.teardown();
    }
}
