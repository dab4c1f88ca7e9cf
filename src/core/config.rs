//! # Relay configuration.
//!
//! Provides [`RelayConfig`], centralized settings for one relay instance.
//!
//! ## Sentinel values
//! - `resubscribe = None` → failed subscriptions are only retried on the next identity
//!   change or explicit refresh
//! - `bus_capacity`, `command_capacity` → clamped to at least 1

use crate::policies::BackoffPolicy;

/// Settings for one relay instance.
///
/// ## Field semantics
/// - `topic`: event-stream topic passed with every subscribe call
/// - `confirm_command`: command name of the delivery confirmation request
/// - `support_confirm`: advertised to the server in the subscribe call
/// - `bus_capacity`: event bus ring buffer size
/// - `command_capacity`: owner task command queue size
/// - `resubscribe`: optional backoff for retrying failed subscribe calls
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Event-stream topic.
    pub topic: String,

    /// Command used to confirm a delivered notification.
    pub confirm_command: String,

    /// Whether the relay asks the server for confirmable events.
    ///
    /// Events carrying a confirmation id are confirmed regardless of this flag.
    pub support_confirm: bool,

    /// Capacity of the lifecycle event bus.
    ///
    /// Receivers lagging behind more than `bus_capacity` events skip the oldest ones.
    pub bus_capacity: usize,

    /// Capacity of the owner task's command queue (refresh/cancel requests).
    ///
    /// When full, `refresh_subscription()` and `cancel()` wait for room.
    pub command_capacity: usize,

    /// Automatic resubscribe after a failed subscribe call.
    pub resubscribe: Option<BackoffPolicy>,
}

impl RelayConfig {
    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn command_capacity_clamped(&self) -> usize {
        self.command_capacity.max(1)
    }
}

impl Default for RelayConfig {
    /// Default configuration:
    ///
    /// - `topic = "mobile_app/push_notification_channel"`
    /// - `confirm_command = "mobile_app/push_notification_confirm"`
    /// - `support_confirm = true`
    /// - `bus_capacity = 1024`
    /// - `command_capacity = 256`
    /// - `resubscribe = None`
    fn default() -> Self {
        Self {
            topic: "mobile_app/push_notification_channel".to_owned(),
            confirm_command: "mobile_app/push_notification_confirm".to_owned(),
            support_confirm: true,
            bus_capacity: 1024,
            command_capacity: 256,
            resubscribe: None,
        }
    }
}
