//! Change notifications about one object id.

use std::sync::Arc;

use crate::domain::{ChangeRecord, CollabId, ObjectChanged};
use crate::events::{CollabContext, SlotScope, SubscriptionSlot};
use crate::native::CollabEventType;

/// Changes to one object, as published by any remote endpoint.
#[derive(Debug)]
pub struct ObjectEvents {
    id: CollabId,
    object_changed: SubscriptionSlot<ObjectChanged>,
}

impl ObjectEvents {
    pub(crate) fn new(ctx: &CollabContext, id: CollabId) -> Self {
        Self {
            id,
            object_changed: SubscriptionSlot::filtered(
                ctx.clone(),
                CollabEventType::EndPointObjectChanged,
                SlotScope::Instance(id),
                "ObjectEvents",
                Arc::new(move |record: &ChangeRecord| record.subject_id() == Some(id)),
            ),
        }
    }

    /// The object id.
    #[must_use]
    pub fn id(&self) -> CollabId {
        self.id
    }

    /// Changes to the object.
    #[must_use]
    pub fn object_changed(&self) -> &SubscriptionSlot<ObjectChanged> {
        &self.object_changed
    }

    /// Tears down the slot. Idempotent.
    pub fn dispose(&self) {
        self.object_changed.teardown();
    }
}
