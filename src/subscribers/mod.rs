//! # Asynchronous event subscribers.
//!
//! ```text
//! RelayActor / StateMachine / EventPipeline ── publish(Event) ──► Bus
//!                                                                  │
//!                                          subscriber listener ◄───┘
//!                                                  │
//!                                           SubscriberSet::emit
//!                                       ┌──────────┼──────────┐
//!                                       ▼          ▼          ▼
//!                                   LogWriter   Metrics    Custom ...
//! ```
//!
//! - [`Subscribe`] the trait to implement
//! - [`SubscriberSet`] per-subscriber queues, workers and panic isolation
//! - [`LogWriter`] built-in `tracing` writer (feature `logging`)

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod embedded;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
