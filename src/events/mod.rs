//! Relay events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish and
//! observe what the relay does: subscribe/cancel flow, state transitions and the
//! outcome of every notification pipeline.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `RelayActor`, `StateMachine`, `EventPipeline`, `SubscriberSet` workers.
//! - **Consumers**: the subscriber listener (fans out to `SubscriberSet`), and anyone
//!   holding a receiver from [`Relay::bus`](crate::Relay::bus).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
