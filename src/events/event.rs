//! # Lifecycle events emitted by the relay and its pipelines.
//!
//! The [`EventKind`] enum classifies events across three groups:
//! - **Subscription events**: subscribe/cancel flow and state transitions
//! - **Pipeline events**: per-notification enrichment, delivery and confirmation
//! - **Subscriber events**: overflow and panics of bus subscribers
//!
//! The [`Event`] struct carries the metadata: timestamps, routing key, notification
//! identifier, confirmation id, state, reason, attempt and delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Pipelines of different notifications run concurrently, so use `seq` to restore the
//! publish order.
//!
//! ## Example
//! ```rust
//! use pushrelay::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DeliveryFailed)
//!     .with_notification("evt-1")
//!     .with_reason("sink unavailable");
//!
//! assert_eq!(ev.kind, EventKind::DeliveryFailed);
//! assert_eq!(ev.notification.as_deref(), Some("evt-1"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::state::SubscriptionState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of relay events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscription events ===
    /// A subscribe call was issued.
    ///
    /// Sets: `routing_key`, `attempt` (1 for a fresh routing key, higher for retries)
    SubscribeRequested,

    /// The transport reported the subscription as established.
    ///
    /// Sets: `routing_key`
    SubscriptionEstablished,

    /// The transport denied or failed the subscribe call.
    ///
    /// Sets: `routing_key`, `reason`
    SubscriptionFailed,

    /// An active subscription was released.
    ///
    /// Sets: `routing_key`
    SubscriptionCancelled,

    /// Refresh found no connection for the owning server; nothing was subscribed.
    ///
    /// Sets: `routing_key`, `reason`
    ConnectionUnavailable,

    /// Refresh found the routing key unchanged and did nothing.
    ///
    /// Sets: `routing_key`
    RefreshSkipped,

    /// A failed subscription will be retried after `delay_ms`.
    ///
    /// Sets: `routing_key`, `attempt`, `delay_ms`
    ResubscribeScheduled,

    /// The subscription state was mutated.
    ///
    /// Sets: `state`
    StateChanged,

    // === Pipeline events ===
    /// An inbound event was accepted and counted.
    ///
    /// Sets: `notification`, `confirm_id` (if any)
    EventReceived,

    /// Enrichment failed; the base content is delivered instead.
    ///
    /// Sets: `notification`, `reason`
    EnrichmentFailed,

    /// The notification sink accepted the notification.
    ///
    /// Sets: `notification`
    NotificationDelivered,

    /// The notification sink rejected the notification (terminal for this event).
    ///
    /// Sets: `notification`, `reason`
    DeliveryFailed,

    /// A delivery confirmation was sent back over the connection.
    ///
    /// Sets: `notification`, `confirm_id`, `routing_key`
    ConfirmationSent,

    /// Sending the delivery confirmation failed.
    ///
    /// Sets: `notification`, `confirm_id`, `routing_key`, `reason`
    ConfirmationFailed,

    /// The pipeline for one notification reached its terminal state.
    ///
    /// Sets: `notification`, `reason` (first failure, if any)
    PipelineCompleted,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and "full"/"closed")
    SubscriberOverflow,
}

/// Relay event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Routing identifier of the subscription involved.
    pub routing_key: Option<Arc<str>>,
    /// Identifier of the notification being processed.
    pub notification: Option<Arc<str>>,
    /// Confirmation id carried by the inbound event.
    pub confirm_id: Option<Arc<str>>,
    /// New subscription state (for `StateChanged`).
    pub state: Option<SubscriptionState>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Subscribe attempt for the current routing key (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next resubscribe in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            routing_key: None,
            notification: None,
            confirm_id: None,
            state: None,
            reason: None,
            attempt: None,
            delay_ms: None,
        }
    }

    /// Attaches the routing identifier.
    #[inline]
    pub fn with_routing_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.routing_key = Some(key.into());
        self
    }

    /// Attaches the notification identifier.
    #[inline]
    pub fn with_notification(mut self, id: impl Into<Arc<str>>) -> Self {
        self.notification = Some(id.into());
        self
    }

    /// Attaches a confirmation id.
    #[inline]
    pub fn with_confirm_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.confirm_id = Some(id.into());
        self
    }

    /// Attaches a subscription state.
    #[inline]
    pub fn with_state(mut self, state: SubscriptionState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// True for events describing a pipeline failure (delivery or confirmation).
    #[inline]
    pub fn is_pipeline_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::DeliveryFailed | EventKind::ConfirmationFailed
        )
    }
}
