//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for observing relay events asynchronously:
//! audit trails, metrics, test recorders.
//!
//! Each subscriber gets a dedicated worker task fed by its own bounded queue
//! (see [`SubscriberSet`](super::SubscriberSet)). A slow subscriber only fills its own
//! queue; on overflow the event is dropped for that subscriber and
//! `EventKind::SubscriberOverflow` is published.
//!
//! Subscribers are distinct from [`StateListener`](crate::StateListener)s: listeners are
//! called synchronously on every state mutation, subscribers see a best-effort stream.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use pushrelay::{Event, EventKind, Subscribe};
//!
//! struct DeliveryAudit;
//!
//! #[async_trait]
//! impl Subscribe for DeliveryAudit {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.is_pipeline_failure() {
//!             // persist ev.notification and ev.reason
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "delivery-audit" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Asynchronous observer of relay events.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally. Panics are caught and reported as `SubscriberPanicked`.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
