//! Lazily registered subscription slots.
//!
//! A [`SubscriptionSlot`] binds one event kind, for one entity, to the
//! native subsystem. The binding (wait primitive, wait registration, event
//! registration) is created by the first subscriber and released when the
//! last one leaves, or when the slot is torn down. Every transition happens
//! under the slot's state lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::context::CollabContext;
use super::drain::{self, DrainOutcome};
use super::subscribers::{Handler, SubscriberSet, SubscriptionToken};
use crate::codec::encode_guid;
use crate::domain::{ChangeRecord, CollabId, Notification};
use crate::error::CollabError;
use crate::init::ensure_initialized;
use crate::native::{
    CollabEventType, EventHandle, EventRegistration, OwnedHandle, RegistrationHandle, WaitCallback,
    WaitHandle,
};

/// Predicate deciding whether a decoded record concerns the owning entity.
pub type RecordFilter = Arc<dyn Fn(&ChangeRecord) -> bool + Send + Sync>;

/// Whether a slot registers for every record of its kind or for one
/// application or object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotScope {
    /// Identity-agnostic registration.
    Global,
    /// Registration carrying the entity id.
    Instance(CollabId),
}

/// Lifecycle of a slot's native binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    /// No native binding.
    Unregistered,
    /// The first subscriber is creating the binding.
    Registering,
    /// The binding is live.
    Active,
    /// The binding is being released.
    Draining,
}

/// Native handles owned by an active slot, in release order.
pub(super) struct SlotBinding {
    wait: OwnedHandle<WaitHandle>,
    pub(super) registration: OwnedHandle<RegistrationHandle>,
    event: OwnedHandle<EventHandle>,
}

impl SlotBinding {
    fn release(mut self, kind: CollabEventType) {
        if let Err(code) = self.wait.release() {
            tracing::warn!(?kind, code, "UnregisterWait failed");
        }
        if let Err(code) = self.registration.release() {
            tracing::warn!(?kind, code, "PeerCollabUnregisterEvent failed");
        }
        if let Err(code) = self.event.release() {
            tracing::warn!(?kind, code, "CloseHandle failed");
        }
    }
}

pub(super) struct SlotState<N> {
    pub(super) phase: SlotPhase,
    pub(super) binding: Option<SlotBinding>,
    pub(super) subscribers: SubscriberSet<N>,
    disposed: bool,
}

pub(super) struct SlotInner<N> {
    pub(super) kind: CollabEventType,
    scope: SlotScope,
    owner: &'static str,
    pub(super) ctx: CollabContext,
    pub(super) filter: RecordFilter,
    pub(super) state: Mutex<SlotState<N>>,
    pub(super) drain_lock: Mutex<()>,
}

/// One event kind of one entity, with its subscribers and native binding.
pub struct SubscriptionSlot<N: Notification> {
    inner: Arc<SlotInner<N>>,
}

impl<N: Notification> SubscriptionSlot<N> {
    /// Creates an identity-agnostic slot that delivers every record of
    /// `kind`.
    #[must_use]
    pub fn global(ctx: CollabContext, kind: CollabEventType, owner: &'static str) -> Self {
        Self::filtered(ctx, kind, SlotScope::Global, owner, Arc::new(|_: &ChangeRecord| true))
    }

    /// Creates a slot delivering only records accepted by `filter`.
    #[must_use]
    pub fn filtered(
        ctx: CollabContext,
        kind: CollabEventType,
        scope: SlotScope,
        owner: &'static str,
        filter: RecordFilter,
    ) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                kind,
                scope,
                owner,
                ctx,
                filter,
                state: Mutex::new(SlotState {
                    phase: SlotPhase::Unregistered,
                    binding: None,
                    subscribers: SubscriberSet::new(),
                    disposed: false,
                }),
                drain_lock: Mutex::new(()),
            }),
        }
    }

    /// Adds a subscriber, registering with the native subsystem first if
    /// this is the first one. Subscribing a handler that is already present
    /// returns its existing token.
    ///
    /// # Errors
    ///
    /// - [`CollabError::Validation`] if the slot is scoped to the empty id.
    /// - [`CollabError::Disposed`] after [`SubscriptionSlot::teardown`].
    /// - [`CollabError::Platform`] if startup or registration fails; any
    ///   handle acquired before the failure is released.
    pub fn subscribe(&self, handler: Handler<N>) -> Result<SubscriptionToken, CollabError> {
        let inner = &self.inner;
        if let SlotScope::Instance(id) = inner.scope
            && id.is_nil()
        {
            return Err(CollabError::validation(format!(
                "{} requires a non-empty id to subscribe",
                inner.owner
            )));
        }
        if inner.state.lock().disposed {
            return Err(CollabError::Disposed(inner.owner));
        }
        ensure_initialized(&**inner.ctx.platform(), inner.ctx.platform_version())?;

        let mut state = inner.state.lock();
        if state.disposed {
            return Err(CollabError::Disposed(inner.owner));
        }
        if state.binding.is_none() {
            state.phase = SlotPhase::Registering;
            match register(inner) {
                Ok(binding) => {
                    state.binding = Some(binding);
                    state.phase = SlotPhase::Active;
                    tracing::debug!(kind = ?inner.kind, owner = inner.owner, "slot registered");
                }
                Err(err) => {
                    state.phase = SlotPhase::Unregistered;
                    tracing::warn!(kind = ?inner.kind, error = %err, "slot registration failed");
                    return Err(err);
                }
            }
        }
        let (token, _) = state.subscribers.insert(handler);
        Ok(token)
    }

    /// Removes a subscriber. Removing the last one releases the native
    /// binding. Returns `false` for an unknown token.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut state = self.inner.state.lock();
        if !state.subscribers.remove(token) {
            return false;
        }
        if state.subscribers.is_empty() {
            self.unbind(&mut state);
        }
        true
    }

    /// Removes a subscriber by handler identity.
    pub fn unsubscribe_handler(&self, handler: &Handler<N>) -> bool {
        let token = self.inner.state.lock().subscribers.find(handler);
        token.is_some_and(|token| self.unsubscribe(token))
    }

    /// Releases the native binding regardless of subscribers and rejects
    /// further subscriptions. Idempotent.
    pub fn teardown(&self) {
        let mut state = self.inner.state.lock();
        if !state.disposed {
            state.disposed = true;
            tracing::debug!(kind = ?self.inner.kind, owner = self.inner.owner, "slot torn down");
        }
        state.subscribers.clear();
        self.unbind(&mut state);
    }

    fn unbind(&self, state: &mut SlotState<N>) {
        if let Some(binding) = state.binding.take() {
            state.phase = SlotPhase::Draining;
            binding.release(self.inner.kind);
        }
        state.phase = SlotPhase::Unregistered;
    }

    /// Returns the event kind.
    #[must_use]
    pub fn kind(&self) -> CollabEventType {
        self.inner.kind
    }

    /// Returns the registration scope.
    #[must_use]
    pub fn scope(&self) -> SlotScope {
        self.inner.scope
    }

    /// Returns the lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SlotPhase {
        self.inner.state.lock().phase
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }

    /// Returns `true` after [`SubscriptionSlot::teardown`].
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Returns the live native registration, if any.
    #[must_use]
    pub fn registration(&self) -> Option<RegistrationHandle> {
        self.inner
            .state
            .lock()
            .binding
            .as_ref()
            .and_then(|binding| binding.registration.get())
    }

    /// Drains pending records on the calling thread, as the wait callback
    /// would.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the drain. Unlike the wait callback,
    /// nothing is published on the fault bus.
    pub fn drain_now(&self) -> Result<DrainOutcome, CollabError> {
        drain::drain(&self.inner)
    }
}

fn register<N: Notification>(inner: &Arc<SlotInner<N>>) -> Result<SlotBinding, CollabError> {
    let platform = inner.ctx.platform();

    let event_handle = platform
        .create_event()
        .map_err(|code| CollabError::platform("CreateEvent", code))?;
    let event = OwnedHandle::active(Arc::clone(platform), event_handle);

    let weak = Arc::downgrade(inner);
    let callback: WaitCallback = Arc::new(move || {
        if let Some(inner) = weak.upgrade() {
            drain::on_signal(&inner);
        }
    });
    let wait = platform
        .register_wait(event_handle, callback)
        .map_err(|code| CollabError::platform("RegisterWaitForSingleObject", code))?;
    let wait = OwnedHandle::active(Arc::clone(platform), wait);

    let registration = EventRegistration {
        event_type: inner.kind,
        instance: match inner.scope {
            SlotScope::Global => None,
            SlotScope::Instance(id) => Some(encode_guid(id.as_uuid())),
        },
    };
    let registration = platform
        .register_event(event_handle, &[registration])
        .map_err(|code| CollabError::platform("PeerCollabRegisterEvent", code))?;

    Ok(SlotBinding {
        wait,
        registration: OwnedHandle::active(Arc::clone(platform), registration),
        event,
    })
}

impl<N: Notification> Drop for SubscriptionSlot<N> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<N: Notification> fmt::Debug for SubscriptionSlot<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SubscriptionSlot")
            .field("kind", &self.inner.kind)
            .field("scope", &self.inner.scope)
            .field("phase", &state.phase)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::codec::encode_event;
    use crate::domain::{
        ApplicationChanged, ChangeType, PeerApplication, PeerPresenceInfo, PeerScope,
        PresenceChanged,
    };
    use crate::events::subscribers::handler;
    use crate::native::{CollabPlatform, E_HANDLE, E_OUTOFMEMORY, LoopbackPlatform, NativeOp};

    fn setup() -> (Arc<LoopbackPlatform>, CollabContext) {
        let loopback = Arc::new(LoopbackPlatform::manual());
        let platform: Arc<dyn CollabPlatform> = Arc::clone(&loopback) as Arc<dyn CollabPlatform>;
        (loopback, CollabContext::new(platform))
    }

    fn app_slot(ctx: &CollabContext) -> SubscriptionSlot<ApplicationChanged> {
        SubscriptionSlot::global(
            ctx.clone(),
            CollabEventType::EndPointApplicationChanged,
            "ContactManager",
        )
    }

    fn post_application(ctx: &CollabContext, loopback: &LoopbackPlatform, id: CollabId) {
        let record = ChangeRecord::Application(ApplicationChanged {
            endpoint: None,
            contact: None,
            change_type: ChangeType::Updated,
            application: PeerApplication::from_parts(id, vec![1, 2], None, PeerScope::All),
            received_at: Utc::now(),
        });
        let Ok(marshaled) = encode_event(
            ctx.platform(),
            CollabEventType::EndPointApplicationChanged,
            &record,
        ) else {
            panic!("encode failed");
        };
        let Ok(_) = loopback.post_event(marshaled.record()) else {
            panic!("post failed");
        };
    }

    fn recorder() -> (
        Arc<Mutex<Vec<CollabId>>>,
        Handler<ApplicationChanged>,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let h = handler(move |event: &ApplicationChanged| sink.lock().push(event.application.id()));
        (seen, h)
    }

    #[test]
    fn duplicate_subscription_registers_once() {
        let (loopback, ctx) = setup();
        let slot = app_slot(&ctx);
        let (_, h) = recorder();

        let Ok(first) = slot.subscribe(Arc::clone(&h)) else {
            panic!("subscribe failed");
        };
        let Ok(second) = slot.subscribe(h) else {
            panic!("subscribe failed");
        };
        assert_eq!(first, second);
        assert_eq!(slot.subscriber_count(), 1);
        assert_eq!(slot.phase(), SlotPhase::Active);
        let stats = loopback.stats();
        assert_eq!(stats.register_event_calls, 1);
        assert_eq!(stats.register_wait_calls, 1);
    }

    #[test]
    fn last_unsubscribe_releases_binding_once() {
        let (loopback, ctx) = setup();
        let slot = app_slot(&ctx);
        let (_, a) = recorder();
        let (_, b) = recorder();
        let (Ok(ta), Ok(tb)) = (slot.subscribe(a), slot.subscribe(b)) else {
            panic!("subscribe failed");
        };

        assert!(slot.unsubscribe(ta));
        assert_eq!(loopback.stats().unregister_event_calls, 0);
        assert!(slot.unsubscribe(tb));
        assert!(!slot.unsubscribe(tb));

        let stats = loopback.stats();
        assert_eq!(stats.unregister_event_calls, 1);
        assert_eq!(stats.live_registrations, 0);
        assert_eq!(stats.live_waits, 0);
        assert_eq!(stats.live_events, 0);
        assert_eq!(slot.phase(), SlotPhase::Unregistered);
    }

    #[test]
    fn unsubscribing_unknown_handler_is_noop() {
        let (loopback, ctx) = setup();
        let slot = app_slot(&ctx);
        let (_, h) = recorder();
        assert!(!slot.unsubscribe_handler(&h));
        assert_eq!(loopback.stats().unregister_event_calls, 0);
    }

    #[test]
    fn three_records_are_delivered_in_order() {
        let (loopback, ctx) = setup();
        let slot = app_slot(&ctx);
        let (seen, h) = recorder();
        let Ok(_) = slot.subscribe(h) else {
            panic!("subscribe failed");
        };

        let ids = [CollabId::new(), CollabId::new(), CollabId::new()];
        for id in ids {
            post_application(&ctx, &loopback, id);
        }
        assert_eq!(loopback.pump(), 1);
        assert_eq!(*seen.lock(), ids.to_vec());
        assert_eq!(loopback.stats().live_records, 0);
        assert_eq!(loopback.stats().live_memory, 0);
        assert_eq!(slot.drain_now().ok(), Some(DrainOutcome::Drained(0)));
    }

    #[test]
    fn teardown_releases_registration_with_live_subscribers() {
        let (loopback, ctx) = setup();
        let slot = app_slot(&ctx);
        let (_, h) = recorder();
        let Ok(_) = slot.subscribe(Arc::clone(&h)) else {
            panic!("subscribe failed");
        };

        slot.teardown();
        slot.teardown();
        let stats = loopback.stats();
        assert_eq!(stats.unregister_event_calls, 1);
        assert_eq!(stats.live_registrations, 0);
        assert_eq!(stats.invalid_releases, 0);
        assert_eq!(slot.subscriber_count(), 0);
        assert!(matches!(slot.subscribe(h), Err(CollabError::Disposed(_))));
        assert_eq!(slot.drain_now().ok(), Some(DrainOutcome::Closed));
    }

    #[test]
    fn nil_instance_is_rejected_before_native_calls() {
        let (loopback, ctx) = setup();
        let slot: SubscriptionSlot<ApplicationChanged> = SubscriptionSlot::filtered(
            ctx,
            CollabEventType::EndPointApplicationChanged,
            SlotScope::Instance(CollabId::nil()),
            "ApplicationEvents",
            Arc::new(|_: &ChangeRecord| true),
        );
        let (_, h) = recorder();
        assert!(matches!(slot.subscribe(h), Err(CollabError::Validation(_))));
        assert_eq!(loopback.stats().register_event_calls, 0);
        assert_eq!(loopback.stats().register_wait_calls, 0);
    }

    #[test]
    fn failed_registration_unwinds_every_handle() {
        let (loopback, ctx) = setup();
        let slot = app_slot(&ctx);
        let (_, h) = recorder();
        loopback.fail_next(NativeOp::RegisterEvent, E_OUTOFMEMORY);

        let Err(err) = slot.subscribe(Arc::clone(&h)) else {
            panic!("subscribe should fail");
        };
        assert_eq!(err.os_code(), Some(E_OUTOFMEMORY));
        let stats = loopback.stats();
        assert_eq!(stats.live_events, 0);
        assert_eq!(stats.live_waits, 0);
        assert_eq!(stats.live_registrations, 0);
        assert_eq!(slot.phase(), SlotPhase::Unregistered);
        assert_eq!(slot.subscriber_count(), 0);

        assert!(slot.subscribe(h).is_ok());
        assert_eq!(slot.phase(), SlotPhase::Active);
    }

    #[test]
    fn drain_failure_is_published_and_slot_stays_active() {
        let (loopback, ctx) = setup();
        let slot = app_slot(&ctx);
        let mut faults = ctx.faults().subscribe();
        let (seen, h) = recorder();
        let Ok(_) = slot.subscribe(h) else {
            panic!("subscribe failed");
        };

        let id = CollabId::new();
        post_application(&ctx, &loopback, id);
        loopback.fail_next(NativeOp::GetEventData, E_HANDLE);
        assert_eq!(loopback.pump(), 1);

        let Ok(fault) = faults.try_recv() else {
            panic!("expected a fault");
        };
        assert_eq!(fault.event_type, CollabEventType::EndPointApplicationChanged);
        assert_eq!(fault.error.os_code(), Some(E_HANDLE));
        assert!(seen.lock().is_empty());
        assert_eq!(slot.phase(), SlotPhase::Active);

        post_application(&ctx, &loopback, CollabId::new());
        assert_eq!(loopback.pump(), 1);
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock().first(), Some(&id));
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let (loopback, ctx) = setup();
        let slot = Arc::new(app_slot(&ctx));
        let token = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0_usize));

        let h = {
            let slot = Arc::clone(&slot);
            let token = Arc::clone(&token);
            let calls = Arc::clone(&calls);
            handler(move |_: &ApplicationChanged| {
                *calls.lock() += 1;
                if let Some(own) = token.lock().take() {
                    slot.unsubscribe(own);
                }
            })
        };
        let Ok(own) = slot.subscribe(h) else {
            panic!("subscribe failed");
        };
        *token.lock() = Some(own);

        post_application(&ctx, &loopback, CollabId::new());
        post_application(&ctx, &loopback, CollabId::new());
        assert_eq!(loopback.pump(), 1);

        assert_eq!(*calls.lock(), 1);
        assert_eq!(slot.phase(), SlotPhase::Unregistered);
        let stats = loopback.stats();
        assert_eq!(stats.live_registrations, 0);
        assert_eq!(stats.live_records, 0);
        slot.teardown();
    }

    #[test]
    fn filter_and_kind_select_notifications() {
        let (loopback, ctx) = setup();
        let wanted = CollabId::new();
        let slot: SubscriptionSlot<ApplicationChanged> = SubscriptionSlot::filtered(
            ctx.clone(),
            CollabEventType::EndPointApplicationChanged,
            SlotScope::Global,
            "ApplicationEvents",
            Arc::new(move |record: &ChangeRecord| record.subject_id() == Some(wanted)),
        );
        let presence: SubscriptionSlot<PresenceChanged> = SubscriptionSlot::global(
            ctx.clone(),
            CollabEventType::EndPointPresenceChanged,
            "ContactManager",
        );
        let (seen, h) = recorder();
        let Ok(_) = slot.subscribe(h) else {
            panic!("subscribe failed");
        };
        let Ok(_) = presence.subscribe(handler(|_: &PresenceChanged| {})) else {
            panic!("subscribe failed");
        };

        post_application(&ctx, &loopback, CollabId::new());
        post_application(&ctx, &loopback, wanted);
        let _ = loopback.pump();
        assert_eq!(*seen.lock(), vec![wanted]);

        let record = ChangeRecord::Presence(PresenceChanged {
            endpoint: None,
            contact: None,
            change_type: ChangeType::Updated,
            presence: PeerPresenceInfo::default(),
            received_at: Utc::now(),
        });
        let Ok(marshaled) =
            encode_event(ctx.platform(), CollabEventType::EndPointPresenceChanged, &record)
        else {
            panic!("encode failed");
        };
        assert_eq!(loopback.post_event(marshaled.record()), Ok(1));
    }
}
