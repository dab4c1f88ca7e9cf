//! # Delegate slot.
//!
//! The relay keeps at most one [`RelayDelegate`], held weakly: registering a delegate
//! never extends its lifetime. Once the delegate is dropped (or cleared) delivery is a
//! silent no-op. A panicking delegate is logged and otherwise ignored.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;

/// Receives the raw payload of every event the relay accepts.
pub trait RelayDelegate: Send + Sync + 'static {
    /// Called synchronously, before the event's notification is enriched or delivered.
    fn did_receive(&self, payload: &Value);
}

/// Single optional weak delegate reference.
#[derive(Default)]
pub struct DelegateSlot {
    inner: RwLock<Option<Weak<dyn RelayDelegate>>>,
}

impl DelegateSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current delegate.
    pub fn set<D: RelayDelegate>(&self, delegate: &Arc<D>) {
        let weak: Weak<dyn RelayDelegate> = Arc::downgrade(delegate) as Weak<dyn RelayDelegate>;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    /// Unsets the delegate.
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Returns the delegate if it is set and still alive.
    pub fn get(&self) -> Option<Arc<dyn RelayDelegate>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Forwards `payload` to the delegate. Returns `false` when there was nobody to call.
    pub fn notify(&self, payload: &Value) -> bool {
        match self.get() {
            Some(delegate) => {
                if catch_unwind(AssertUnwindSafe(|| delegate.did_receive(payload))).is_err() {
                    tracing::error!("relay delegate panicked");
                }
                true
            }
            None => false,
        }
    }
}
