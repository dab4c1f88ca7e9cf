//! # State machine holder.
//!
//! [`StateMachine`] owns the committed [`SubscriptionState`] and announces every
//! mutation.
//!
//! ## Rules
//! - Only the relay's owner task mutates it ([`set`](StateMachine::set),
//!   [`increment`](StateMachine::increment)); anyone may read.
//! - Each mutation notifies every listener **exactly once**, after the new value is
//!   committed, on the mutating context; then a `StateChanged` event is published.
//! - Readers never observe an intermediate value.

use std::sync::{Arc, PoisonError, RwLock};

use crate::events::{Bus, Event, EventKind};
use crate::observers::ListenerSet;

use super::SubscriptionState;

/// Committed subscription state plus its change signal.
pub struct StateMachine {
    state: RwLock<SubscriptionState>,
    listeners: Arc<ListenerSet>,
    bus: Bus,
}

impl StateMachine {
    /// Creates a machine in [`SubscriptionState::Establishing`].
    pub fn new(listeners: Arc<ListenerSet>, bus: Bus) -> Self {
        Self {
            state: RwLock::new(SubscriptionState::default()),
            listeners,
            bus,
        }
    }

    /// Returns the committed state.
    pub fn get(&self) -> SubscriptionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the state and notifies.
    pub fn set(&self, next: SubscriptionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
        self.announce(next);
    }

    /// Counts `by` accepted events (`by` is clamped to at least 1) and notifies.
    ///
    /// Returns the new state.
    pub fn increment(&self, by: u64) -> SubscriptionState {
        let next = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = state.incremented(by.max(1));
            *state
        };
        self.announce(next);
        next
    }

    fn announce(&self, state: SubscriptionState) {
        tracing::debug!(%state, "subscription state changed");
        self.listeners.notify(&state);
        self.bus
            .publish(Event::new(EventKind::StateChanged).with_state(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn machine() -> (StateMachine, Arc<Mutex<Vec<SubscriptionState>>>) {
        let listeners = Arc::new(ListenerSet::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        listeners.add(Arc::new(move |state: &SubscriptionState| {
            s.lock().unwrap().push(*state);
        }));
        (StateMachine::new(listeners, Bus::new(16)), seen)
    }

    #[test]
    fn starts_establishing() {
        let (sm, seen) = machine();
        assert_eq!(sm.get(), SubscriptionState::Establishing);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn every_mutation_notifies_once_after_commit() {
        let (sm, seen) = machine();

        sm.increment(1);
        sm.increment(2);
        sm.set(SubscriptionState::Unavailable);
        sm.increment(4);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SubscriptionState::Available { received: 1 },
                SubscriptionState::Available { received: 3 },
                SubscriptionState::Unavailable,
                SubscriptionState::Available { received: 4 },
            ]
        );
        assert_eq!(sm.get(), SubscriptionState::Available { received: 4 });
    }

    #[test]
    fn setting_same_value_still_notifies() {
        let (sm, seen) = machine();
        sm.set(SubscriptionState::Available { received: 0 });
        sm.set(SubscriptionState::Available { received: 0 });
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn zero_step_counts_as_one() {
        let (sm, _) = machine();
        assert_eq!(sm.increment(0), SubscriptionState::Available { received: 1 });
    }

    #[tokio::test]
    async fn publishes_state_changed() {
        let listeners = Arc::new(ListenerSet::new());
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let sm = StateMachine::new(listeners, bus);

        sm.increment(1);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::StateChanged);
        assert_eq!(ev.state, Some(SubscriptionState::Available { received: 1 }));
    }
}
