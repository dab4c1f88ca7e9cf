//! # State-change listeners.
//!
//! [`ListenerSet`] is the relay's process-wide "state changed" signal: any number of
//! [`StateListener`]s, each addressed by the [`ListenerId`] returned at registration.
//!
//! ## Rules
//! - Delivery is **synchronous**: [`ListenerSet::notify`] calls every listener on the
//!   caller's context before returning (no queue, no batching).
//! - Listeners are invoked outside the registration lock, so a listener may register or
//!   remove listeners from inside its callback.
//! - A panicking listener is isolated: the panic is caught and logged, the remaining
//!   listeners still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::state::SubscriptionState;

/// Receives every committed [`SubscriptionState`] transition.
///
/// Called on the relay's owner task; keep it short and non-blocking.
pub trait StateListener: Send + Sync + 'static {
    /// Called once per state mutation, after it is applied.
    fn on_state_change(&self, state: &SubscriptionState);
}

impl<F> StateListener for F
where
    F: Fn(&SubscriptionState) + Send + Sync + 'static,
{
    fn on_state_change(&self, state: &SubscriptionState) {
        self(state)
    }
}

/// Registration handle returned by [`ListenerSet::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Registered state listeners.
#[derive(Default)]
pub struct ListenerSet {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn StateListener>)>>,
}

impl ListenerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener; it observes every transition from now on.
    pub fn add(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    /// Removes a listener. Returns `false` if the id was unknown (already removed).
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every registered listener with `state`.
    pub fn notify(&self, state: &SubscriptionState) {
        let snapshot: Vec<Arc<dyn StateListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener.on_state_change(state))).is_err() {
                tracing::error!(%state, "state listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn notifies_every_listener_once() {
        let set = ListenerSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            set.add(Arc::new(move |s: &SubscriptionState| {
                seen.lock().unwrap().push((tag, *s));
            }));
        }

        set.notify(&SubscriptionState::Available { received: 1 });
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("a", SubscriptionState::Available { received: 1 }),
                ("b", SubscriptionState::Available { received: 1 }),
            ]
        );
    }

    #[test]
    fn removed_listener_is_silent() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        let id = set.add(Arc::new(move |_: &SubscriptionState| {
            h.fetch_add(1, Ordering::Relaxed);
        }));

        assert!(set.remove(id));
        assert!(!set.remove(id));
        set.notify(&SubscriptionState::Unavailable);
        assert_eq!(hits.load(Ordering::Relaxed), 0);
        assert!(set.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_starve_others() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicU64::new(0));
        set.add(Arc::new(|_: &SubscriptionState| panic!("boom")));
        let h = Arc::clone(&hits);
        set.add(Arc::new(move |_: &SubscriptionState| {
            h.fetch_add(1, Ordering::Relaxed);
        }));

        set.notify(&SubscriptionState::Establishing);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
