//! Change notifications filtered to one endpoint.

use std::sync::Arc;

use crate::domain::{
    ApplicationChanged, ChangeRecord, NameChanged, Notification, ObjectChanged, PeerEndPoint,
    PresenceChanged,
};
use crate::events::{CollabContext, SlotScope, SubscriptionSlot};
use crate::native::CollabEventType;

const OWNER: &str = "EndPointEvents";

/// Name, presence, application and object changes of one remote endpoint.
#[derive(Debug)]
pub struct EndPointEvents {
    endpoint: PeerEndPoint,
    name_changed: SubscriptionSlot<NameChanged>,
    presence_changed: SubscriptionSlot<PresenceChanged>,
    application_changed: SubscriptionSlot<ApplicationChanged>,
    object_changed: SubscriptionSlot<ObjectChanged>,
}

fn for_endpoint<N: Notification>(
    ctx: &CollabContext,
    kind: CollabEventType,
    endpoint: &PeerEndPoint,
) -> SubscriptionSlot<N> {
    let watched = endpoint.clone();
    SubscriptionSlot::filtered(
        ctx.clone(),
        kind,
        SlotScope::Global,
        OWNER,
        Arc::new(move |record: &ChangeRecord| record.endpoint() == Some(&watched)),
    )
}

impl EndPointEvents {
    pub(crate) fn new(ctx: &CollabContext, endpoint: PeerEndPoint) -> Self {
        Self {
            name_changed: for_endpoint(ctx, CollabEventType::EndPointChanged, &endpoint),
            presence_changed: for_endpoint(
                ctx,
                CollabEventType::EndPointPresenceChanged,
                &endpoint,
            ),
            application_changed: for_endpoint(
                ctx,
                CollabEventType::EndPointApplicationChanged,
                &endpoint,
            ),
            object_changed: for_endpoint(ctx, CollabEventType::EndPointObjectChanged, &endpoint),
            endpoint,
        }
    }

    /// The watched endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &PeerEndPoint {
        &self.endpoint
    }

    /// The endpoint changing its name.
    #[must_use]
    pub fn name_changed(&self) -> &SubscriptionSlot<NameChanged> {
        &self.name_changed
    }

    /// Presence changes of the endpoint.
    #[must_use]
    pub fn presence_changed(&self) -> &SubscriptionSlot<PresenceChanged> {
        &self.presence_changed
    }

    /// Applications published by the endpoint.
    #[must_use]
    pub fn application_changed(&self) -> &SubscriptionSlot<ApplicationChanged> {
        &self.application_changed
    }

    /// Objects published by the endpoint.
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
