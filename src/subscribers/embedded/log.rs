//! # LogWriter: relay events as `tracing` records.
//!
//! A small subscriber for demos and debugging. Failures go out at `warn`, the rest at
//! `info`, all under the `pushrelay::events` target.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO pushrelay::events: [subscribe] routing_key="wh-1" attempt=1
//! INFO pushrelay::events: [established] routing_key="wh-1"
//! INFO pushrelay::events: [state] available(1)
//! WARN pushrelay::events: [delivery-failed] notification="n-7" reason="sink closed"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "pushrelay::events";

/// Writes every relay event to the `tracing` pipeline.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let key = e.routing_key.as_deref().unwrap_or("-");
        let id = e.notification.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::SubscribeRequested => {
                tracing::info!(target: TARGET, "[subscribe] routing_key={key:?} attempt={:?}", e.attempt);
            }
            EventKind::SubscriptionEstablished => {
                tracing::info!(target: TARGET, "[established] routing_key={key:?}");
            }
            EventKind::SubscriptionFailed => {
                tracing::warn!(target: TARGET, "[subscribe-failed] routing_key={key:?} reason={reason:?}");
            }
            EventKind::SubscriptionCancelled => {
                tracing::info!(target: TARGET, "[cancelled] routing_key={key:?}");
            }
            EventKind::ConnectionUnavailable => {
                tracing::warn!(target: TARGET, "[no-connection] routing_key={key:?}");
            }
            EventKind::RefreshSkipped => {
                tracing::info!(target: TARGET, "[refresh-skipped] routing_key={key:?}");
            }
            EventKind::ResubscribeScheduled => {
                tracing::info!(
                    target: TARGET,
                    "[resubscribe] routing_key={key:?} attempt={:?} delay_ms={:?}",
                    e.attempt,
                    e.delay_ms
                );
            }
            EventKind::StateChanged => match &e.state {
                Some(state) => tracing::info!(target: TARGET, "[state] {state}"),
                None => tracing::info!(target: TARGET, "[state] unknown"),
            },
            EventKind::EventReceived => {
                tracing::info!(
                    target: TARGET,
                    "[received] notification={id:?} confirm_id={:?}",
                    e.confirm_id.as_deref()
                );
            }
            EventKind::EnrichmentFailed => {
                tracing::warn!(target: TARGET, "[enrich-failed] notification={id:?} reason={reason:?}");
            }
            EventKind::NotificationDelivered => {
                tracing::info!(target: TARGET, "[delivered] notification={id:?}");
            }
            EventKind::DeliveryFailed => {
                tracing::warn!(target: TARGET, "[delivery-failed] notification={id:?} reason={reason:?}");
            }
            EventKind::ConfirmationSent => {
                tracing::info!(target: TARGET, "[confirmed] notification={id:?} routing_key={key:?}");
            }
            EventKind::ConfirmationFailed => {
                tracing::warn!(target: TARGET, "[confirm-failed] notification={id:?} reason={reason:?}");
            }
            EventKind::PipelineCompleted => {
                tracing::info!(target: TARGET, "[completed] notification={id:?} reason={reason:?}");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: TARGET, "[subscriber-overflow] {reason}");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(target: TARGET, "[subscriber-panicked] {reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
