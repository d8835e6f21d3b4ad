//! Per-slot subscriber registry.
//!
//! Tracks the callbacks attached to one subscription slot, in subscription
//! order. A handler is identified by the allocation behind its [`Arc`], so
//! subscribing the same handler twice yields the same token.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Callback invoked with each notification.
pub type Handler<N> = Arc<dyn Fn(&N) + Send + Sync>;

/// Wraps a closure as a [`Handler`].
pub fn handler<N, F>(f: F) -> Handler<N>
where
    F: Fn(&N) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identifies one subscription within a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

/// Ordered set of handlers keyed by [`SubscriptionToken`].
pub struct SubscriberSet<N> {
    next: u64,
    handlers: BTreeMap<SubscriptionToken, Handler<N>>,
}

fn same_handler<N>(a: &Handler<N>, b: &Handler<N>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

impl<N> SubscriberSet<N> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: 0,
            handlers: BTreeMap::new(),
        }
    }

    /// Returns the token of `handler` if it is already subscribed.
    #[must_use]
    pub fn find(&self, handler: &Handler<N>) -> Option<SubscriptionToken> {
        self.handlers
            .iter()
            .find(|(_, existing)| same_handler(existing, handler))
            .map(|(token, _)| *token)
    }

    /// Adds `handler`, or returns its existing token if present. The flag is
    /// `true` when the handler was newly added.
    pub fn insert(&mut self, handler: Handler<N>) -> (SubscriptionToken, bool) {
        if let Some(token) = self.find(&handler) {
            return (token, false);
        }
        self.next += 1;
        let token = SubscriptionToken(self.next);
        self.handlers.insert(token, handler);
        (token, true)
    }

    /// Removes a subscription. Returns `false` for an unknown token.
    pub fn remove(&mut self, token: SubscriptionToken) -> bool {
        self.handlers.remove(&token).is_some()
    }

    /// Removes every subscription.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Returns the number of subscribed handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Clones the current handlers in subscription order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Handler<N>> {
        self.handlers.values().map(Arc::clone).collect()
    }
}

impl<N> Default for SubscriberSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for SubscriberSet<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("tokens", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn empty_set() {
        let set: SubscriberSet<u32> = SubscriberSet::new();
        assert!(set.is_empty());
        assert!(set.snapshot().is_empty());
    }

    #[test]
    fn same_handler_is_deduplicated() {
        let mut set = SubscriberSet::new();
        let h = handler(|_: &u32| {});
        let (first, added) = set.insert(Arc::clone(&h));
        assert!(added);
        let (second, added) = set.insert(h);
        assert!(!added);
        assert_eq!(first, second);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn distinct_closures_are_distinct_handlers() {
        let mut set = SubscriberSet::new();
        set.insert(handler(|_: &u32| {}));
        set.insert(handler(|_: &u32| {}));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn remove_unknown_token_is_noop() {
        let mut set = SubscriberSet::new();
        let (token, _) = set.insert(handler(|_: &u32| {}));
        assert!(set.remove(token));
        assert!(!set.remove(token));
        assert!(set.is_empty());
    }

    #[test]
    fn snapshot_preserves_subscription_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut set = SubscriberSet::new();
        for tag in 0..3_usize {
            let order = Arc::clone(&order);
            set.insert(handler(move |_: &u32| order.lock().push(tag)));
        }
        for h in set.snapshot() {
            h(&0);
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn handler_sees_notification() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let h = handler(move |n: &usize| {
            counter.fetch_add(*n, Ordering::SeqCst);
        });
        h(&5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
