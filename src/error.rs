//! Error types used by the relay, its pipeline and its collaborators.
//!
//! - [`RelayError`] errors raised by the relay runtime itself.
//! - [`PipelineError`] terminal failures of a single event pipeline.
//! - [`ServiceError`] failures reported by external collaborators (transport, sink, enricher).
//! - [`EventError`] malformed inbound payloads.
//!
//! All types provide `as_label` for logs/metrics. None of them is fatal to the relay:
//! every failure degrades functionality (no notification, no acknowledgment) instead of
//! stopping the runtime.

use thiserror::Error;

/// # Errors produced by the relay runtime.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The relay's owner task is gone (shut down or all handles dropped).
    #[error("relay closed")]
    Closed,

    /// No connection is available for the owning server.
    #[error("no connection available for server {server}")]
    ConnectionUnavailable {
        /// Identifier of the owning server.
        server: String,
    },

    /// The transport denied or failed the subscribe call.
    #[error("subscribe for {routing_key} failed: {error}")]
    SubscribeFailed {
        /// Routing identifier the subscription was scoped to.
        routing_key: String,
        /// The underlying transport error.
        error: ServiceError,
    },
}

impl RelayError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use pushrelay::RelayError;
    ///
    /// assert_eq!(RelayError::Closed.as_label(), "relay_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RelayError::Closed => "relay_closed",
            RelayError::ConnectionUnavailable { .. } => "relay_connection_unavailable",
            RelayError::SubscribeFailed { .. } => "relay_subscribe_failed",
        }
    }
}

/// # Terminal failures of one event pipeline.
///
/// Enrichment failures never show up here: they are recovered by falling back to
/// the base content.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The notification sink rejected the notification.
    #[error("delivery of {identifier} failed: {error}")]
    Delivery {
        /// Notification identifier.
        identifier: String,
        /// The underlying sink error.
        error: ServiceError,
    },

    /// The notification was delivered but the confirmation could not be sent.
    #[error("confirmation {confirm_id} failed: {error}")]
    Confirmation {
        /// Confirmation id carried by the event.
        confirm_id: String,
        /// The underlying transport error.
        error: ServiceError,
    },
}

impl PipelineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PipelineError::Delivery { .. } => "pipeline_delivery_failed",
            PipelineError::Confirmation { .. } => "pipeline_confirmation_failed",
        }
    }

    /// True when the local notification was already delivered.
    pub fn is_delivered(&self) -> bool {
        matches!(self, PipelineError::Confirmation { .. })
    }
}

/// # Failures reported by external collaborators.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The remote side refused the request.
    #[error("rejected: {reason}")]
    Rejected {
        /// Reason given by the remote side.
        reason: String,
    },

    /// The request failed (I/O, decoding, platform error).
    #[error("failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The connection went away while the request was in flight.
    #[error("disconnected")]
    Disconnected,
}

impl ServiceError {
    /// Shorthand for [`ServiceError::Failed`].
    pub fn failed(error: impl Into<String>) -> Self {
        ServiceError::Failed {
            error: error.into(),
        }
    }

    /// Shorthand for [`ServiceError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        ServiceError::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Rejected { .. } => "service_rejected",
            ServiceError::Failed { .. } => "service_failed",
            ServiceError::Disconnected => "service_disconnected",
        }
    }
}

/// # Malformed inbound payloads.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The payload is not a JSON object.
    #[error("event payload is not an object")]
    NotAnObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = RelayError::SubscribeFailed {
            routing_key: "abc".into(),
            error: ServiceError::Disconnected,
        };
        assert_eq!(err.as_label(), "relay_subscribe_failed");
        assert_eq!(err.to_string(), "subscribe for abc failed: disconnected");

        let err = PipelineError::Delivery {
            identifier: "evt-1".into(),
            error: ServiceError::failed("sink full"),
        };
        assert_eq!(err.as_label(), "pipeline_delivery_failed");
        assert!(!err.is_delivered());
    }

    #[test]
    fn confirmation_failure_counts_as_delivered() {
        let err = PipelineError::Confirmation {
            confirm_id: "c-1".into(),
            error: ServiceError::rejected("unknown id"),
        };
        assert!(err.is_delivered());
        assert_eq!(err.to_string(), "confirmation c-1 failed: rejected: unknown id");
    }
}
