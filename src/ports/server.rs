//! # Owning server identity.
//!
//! The relay observes, and never mutates, the configuration of the server it relays
//! for. [`ServerIdentity`] is the seam; [`WatchedServer`] is a ready-made
//! implementation: the current value lives in a [`tokio::sync::watch`] channel and
//! every update is also broadcast as a snapshot.
//!
//! Change notifications are neither de-duplicated nor coalesced: every `update`
//! reaches the relay with the configuration it set, and the relay compares routing
//! keys itself.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

/// Updates buffered per watcher before it starts lagging.
const CHANGE_CAPACITY: usize = 64;

/// Snapshot of the owning server's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Stable server identifier; notification content is bound to it.
    pub id: String,
    /// Routing (webhook) identifier scoping the event-stream subscription.
    pub routing_key: String,
    /// Server version, sent with the subscribe request.
    pub version: String,
}

impl ServerInfo {
    /// Convenience constructor.
    pub fn new(
        id: impl Into<String>,
        routing_key: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            routing_key: routing_key.into(),
            version: version.into(),
        }
    }
}

/// Source of the owning server's identity.
pub trait ServerIdentity: Send + Sync + 'static {
    /// Current configuration.
    fn info(&self) -> ServerInfo;

    /// Change stream: one snapshot per configuration update, in update order.
    fn changes(&self) -> broadcast::Receiver<ServerInfo>;
}

/// [`ServerIdentity`] held in a watch channel.
#[derive(Debug)]
pub struct WatchedServer {
    current: watch::Sender<ServerInfo>,
    changes: broadcast::Sender<ServerInfo>,
}

impl WatchedServer {
    /// Creates the identity with its initial configuration.
    pub fn new(info: ServerInfo) -> Arc<Self> {
        let (current, _) = watch::channel(info);
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Arc::new(Self { current, changes })
    }

    /// Replaces the configuration and notifies watchers (even if nothing changed).
    pub fn update(&self, info: ServerInfo) {
        self.current.send_replace(info.clone());
        // Fails only when nobody watches.
        self.changes.send(info).ok();
    }

    /// Changes only the routing key.
    pub fn set_routing_key(&self, routing_key: impl Into<String>) {
        let mut info = self.info();
        info.routing_key = routing_key.into();
        self.update(info);
    }
}

impl ServerIdentity for WatchedServer {
    fn info(&self) -> ServerInfo {
        self.current.borrow().clone()
    }

    fn changes(&self) -> broadcast::Receiver<ServerInfo> {
        self.changes.subscribe()
    }
}
