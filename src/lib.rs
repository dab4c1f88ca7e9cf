//! # pushrelay
//!
//! **pushrelay** keeps one live event-stream subscription per server connection and
//! turns every pushed event into a local notification.
//!
//! A relay subscribes to the server's push channel over an already-established
//! persistent connection, resubscribes whenever the server's routing key changes,
//! tracks the health of the subscription, and runs each inbound event through a
//! short pipeline: build content, enrich it, hand it to the local notification
//! sink, and confirm delivery back to the server when the event asks for it.
//!
//! ## Architecture
//! ```text
//!  ServerIdentity ──changes()──► identity watcher ──┐
//!                                                   ▼
//!  Relay handles ── refresh / cancel ──────► ┌─────────────────────┐
//!                                            │     RelayActor      │  owns: subscription,
//!  Connection ─── StreamHandler ───────────► │    (owner task)     │        StateMachine
//!   (initiated / event callbacks)            └──┬───────────┬──────┘
//!                                               │           │ dispatch(event)
//!                          state mutation ◄─────┘           ▼
//!                           ├─► StateListeners     ┌──────────────────┐
//!                           └─► Bus                │  EventPipeline   │ (one task per event)
//!                                                  │ content ► enrich │
//!                                                  │ ► sink ► confirm │
//!                                                  └────────┬─────────┘
//!                                                           ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Bus (broadcast channel)                     │
//! └─────────────────────────────┬────────────────────────────────────┘
//!                               ▼
//!                     subscriber listener ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ### Subscription lifecycle
//! ```text
//! refresh()
//!   ├─ routing key unchanged           ─► RefreshOutcome::Unchanged
//!   ├─ cancel previous subscription    (always before subscribing again)
//!   ├─ no connection                   ─► RefreshOutcome::ConnectionUnavailable
//!   └─ connection.subscribe(request)   ─► RefreshOutcome::Subscribed
//!         ├─ initiated(Ok)   ─► Available { received: 0 }
//!         ├─ initiated(Err)  ─► Unavailable   (optional resubscribe with backoff)
//!         └─ event(payload)  ─► Available { received: n + 1 } ─► pipeline
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                          |
//! |-----------------|---------------------------------------------------------|---------------------------------------------|
//! | **Relay**       | Subscription ownership, refresh, cancel, shutdown.      | [`Relay`], [`RelayBuilder`], [`RelayConfig`]|
//! | **State**       | Subscription health and its observers.                  | [`SubscriptionState`], [`StateListener`]    |
//! | **Delegate**    | Raw payload of every accepted event, weakly held.       | [`RelayDelegate`]                           |
//! | **Pipeline**    | Content, enrichment, delivery, confirmation.            | [`EventPipeline`], [`NotificationContent`]  |
//! | **Ports**       | Collaborators the embedder provides.                    | [`Connection`], [`NotificationSink`]        |
//! | **Events**      | Lifecycle events on a broadcast bus and subscribers.    | [`Event`], [`Bus`], [`Subscribe`]           |
//! | **Policies**    | Optional automatic resubscribe.                         | [`BackoffPolicy`], [`JitterPolicy`]         |
//! | **Errors**      | Typed errors with stable labels.                        | [`RelayError`], [`ServiceError`]            |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use pushrelay::{
//!     Connection, ConnectionProvider, NotificationRequest, NotificationSink, Relay,
//!     RelayConfig, ServerInfo, ServiceError, SubscriptionState, WatchedServer,
//! };
//!
//! struct Connections;
//! impl ConnectionProvider for Connections {
//!     fn connection(&self, _server: &ServerInfo) -> Option<Arc<dyn Connection>> {
//!         None // hand out the live connection here
//!     }
//! }
//!
//! struct Printer;
//! #[async_trait::async_trait]
//! impl NotificationSink for Printer {
//!     async fn add(&self, request: NotificationRequest) -> Result<(), ServiceError> {
//!         let title = request.content.title.as_deref().unwrap_or("-");
//!         println!("{title}: {}", request.content.body);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = WatchedServer::new(ServerInfo::new("home", "webhook-1", "2024.4.0"));
//!
//!     let relay = Relay::builder(
//!         RelayConfig::default(),
//!         server.clone(),
//!         Arc::new(Connections),
//!         Arc::new(Printer),
//!     )
//!     .with_listener(Arc::new(|state: &SubscriptionState| println!("relay: {state}")))
//!     .build();
//!
//!     let outcome = relay.refresh_subscription().await;
//!     println!("{outcome:?}");
//! }
//! ```

mod core;
mod error;
mod events;
mod observers;
mod pipeline;
mod policies;
mod ports;
mod state;
mod subscribers;

// ---- Public re-exports ----

pub use core::{RefreshOutcome, Relay, RelayBuilder, RelayConfig};
pub use error::{EventError, PipelineError, RelayError, ServiceError};
pub use events::{Bus, Event, EventKind};
pub use observers::{DelegateSlot, ListenerId, ListenerSet, RelayDelegate, StateListener};
pub use pipeline::{
    ActiveRoute, Attachment, Confirmation, Delivered, EventPipeline, InboundEvent,
    NotificationContent, NotificationRequest,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use ports::{
    Connection, ConnectionProvider, ContentEnricher, NotificationSink, PassthroughEnricher,
    Request, Response, ServerIdentity, ServerInfo, StreamHandler, SubscribeRequest,
    WatchedServer,
};
pub use state::{StateDecodeError, StateMachine, SubscriptionState};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in tracing subscriber (demo/reference).
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
