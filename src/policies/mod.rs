//! Resubscribe policy.
//!
//! - [`BackoffPolicy`] how long to wait before retrying a failed subscribe
//! - [`JitterPolicy`]  randomization of that delay
//!
//! Automatic resubscribe is opt-in via
//! [`RelayConfig::resubscribe`](crate::RelayConfig::resubscribe); without it a failed
//! subscription is only retried on the next identity change or explicit refresh.

mod backoff;

pub use backoff::{BackoffPolicy, JitterPolicy};
