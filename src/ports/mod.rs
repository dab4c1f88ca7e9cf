//! External collaborators, specified only at their interface boundary.
//!
//! - [`ServerIdentity`] / [`WatchedServer`] owning server configuration and its changes
//! - [`Connection`] / [`ConnectionProvider`] persistent connection (subscribe + send)
//! - [`NotificationSink`] local notification delivery
//! - [`ContentEnricher`] attachment/content enrichment

mod connection;
mod server;
mod sink;

pub(crate) use connection::{StreamMessage, StreamMessageKind};
pub use connection::{
    Connection, ConnectionProvider, Request, Response, StreamHandler, SubscribeRequest,
};
pub use server::{ServerIdentity, ServerInfo, WatchedServer};
pub use sink::{ContentEnricher, NotificationSink, PassthroughEnricher};
