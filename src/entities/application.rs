//! Change notifications about one application id.

use std::sync::Arc;

use crate::domain::{ApplicationChanged, ChangeRecord, CollabId};
use crate::events::{CollabContext, SlotScope, SubscriptionSlot};
use crate::native::CollabEventType;

/// Changes to one application, as published by any remote endpoint.
///
/// The native registration carries the id, so only records about this
/// application are queued for the slot.
#[derive(Debug)]
pub struct ApplicationEvents {
    id: CollabId,
    application_changed: SubscriptionSlot<ApplicationChanged>,
}

impl ApplicationEvents {
    pub(crate) fn new(ctx: &CollabContext, id: CollabId) -> Self {
        Self {
            id,
            application_changed: SubscriptionSlot::filtered(
                ctx.clone(),
                CollabEventType::EndPointApplicationChanged,
                SlotScope::Instance(id),
                "ApplicationEvents",
                Arc::new(move |record: &ChangeRecord| record.subject_id() == Some(id)),
            ),
        }
    }

    /// The application id.
    #[must_use]
    pub fn id(&self) -> CollabId {
        self.id
    }

    /// Changes to the application.
    #[must_use]
    pub fn application_changed(&self) -> &SubscriptionSlot<ApplicationChanged> {
        &self.application_changed
    }

    /// Tears down the slot. Idempotent.
    pub fn dispose(&self) {
        self.application_changed.teardown();
    }
}
