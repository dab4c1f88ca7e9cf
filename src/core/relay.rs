//! # Relay: public handle of a running relay.
//!
//! [`Relay`] is a cheap, cloneable handle. All mutating requests go through the
//! owner task ([`RelayActor`](super::actor::RelayActor)); reads are served from
//! shared state without waiting for it.
//!
//! ```text
//! Relay::builder(..).build()
//!   ├─► RelayActor::run()         owns the subscription, writes the state
//!   ├─► identity watcher          server.changes() ─► Command::Refresh { info }
//!   ├─► subscriber listener       Bus ─► SubscriberSet::emit   (only with subscribers)
//!   └─► Command::Refresh          initial subscribe
//!
//! Relay (clone) ─┬─► refresh_subscription() ─► Command::Refresh ─► RefreshOutcome
//!                ├─► cancel()               ─► Command::Cancel
//!                ├─► state()                ─► StateMachine::get
//!                └─► add_listener() / set_delegate() / bus()
//!
//! last Relay dropped  or  shutdown()
//!   └─► runtime token cancelled ─► actor releases the subscription, tasks exit
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use pushrelay::{Relay, RelayConfig, ServerInfo, WatchedServer};
//! # use pushrelay::{ConnectionProvider, NotificationSink};
//! # async fn demo(connections: Arc<dyn ConnectionProvider>, sink: Arc<dyn NotificationSink>) {
//! let server = WatchedServer::new(ServerInfo::new("home", "webhook-1", "2024.4.0"));
//!
//! let relay = Relay::builder(RelayConfig::default(), server.clone(), connections, sink).build();
//! relay.add_listener(Arc::new(|state: &pushrelay::SubscriptionState| {
//!     println!("relay is {state}");
//! }));
//!
//! server.set_routing_key("webhook-2"); // resubscribes on its own
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::RelayError;
use crate::events::{Bus, Event};
use crate::observers::{DelegateSlot, ListenerId, ListenerSet, RelayDelegate, StateListener};
use crate::pipeline::ActiveRoute;
use crate::ports::{ConnectionProvider, NotificationSink, ServerInfo, ServerIdentity};
use crate::state::{StateMachine, SubscriptionState};
use crate::subscribers::SubscriberSet;

use super::actor::{Command, RefreshOutcome};
use super::builder::RelayBuilder;
use super::config::RelayConfig;

/// Handle to a running relay.
///
/// Clones share the same relay. When the last clone is dropped the relay shuts down
/// and cancels its subscription.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) commands: mpsc::Sender<Command>,
    pub(crate) state: Arc<StateMachine>,
    pub(crate) listeners: Arc<ListenerSet>,
    pub(crate) delegate: Arc<DelegateSlot>,
    pub(crate) active: watch::Receiver<Option<ActiveRoute>>,
    pub(crate) server: Arc<dyn ServerIdentity>,
    pub(crate) bus: Bus,
    pub(crate) token: CancellationToken,
    pub(crate) _guard: DropGuard,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("state", &self.state())
            .field("routing_key", &self.active_routing_key())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Relay {
    /// Starts building a relay for `server`.
    pub fn builder(
        config: RelayConfig,
        server: Arc<dyn ServerIdentity>,
        connections: Arc<dyn ConnectionProvider>,
        sink: Arc<dyn NotificationSink>,
    ) -> RelayBuilder {
        RelayBuilder::new(config, server, connections, sink)
    }

    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Reconciles the subscription with the server's current routing key.
    ///
    /// Requests are applied one at a time in arrival order. Called automatically on
    /// every identity change; call it yourself to force a check, e.g. after a
    /// connection became available.
    pub async fn refresh_subscription(&self) -> Result<RefreshOutcome, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Refresh {
            info: None,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| RelayError::Closed)
    }

    /// Cancels the active subscription. Returns `false` if there was none.
    ///
    /// The state is left as is; a later refresh subscribes again.
    pub async fn cancel(&self) -> Result<bool, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Cancel { reply: Some(reply) }).await?;
        rx.await.map_err(|_| RelayError::Closed)
    }

    async fn send(&self, cmd: Command) -> Result<(), RelayError> {
        if self.inner.token.is_cancelled() {
            return Err(RelayError::Closed);
        }
        self.inner
            .commands
            .send(cmd)
            .await
            .map_err(|_| RelayError::Closed)
    }

    /// Current subscription state.
    pub fn state(&self) -> SubscriptionState {
        self.inner.state.get()
    }

    /// Routing key of the active subscription, if any.
    pub fn active_routing_key(&self) -> Option<String> {
        self.inner
            .active
            .borrow()
            .as_ref()
            .map(|route| route.routing_key.clone())
    }

    /// Current configuration of the owning server.
    pub fn server(&self) -> ServerInfo {
        self.inner.server.info()
    }

    /// Registers a state listener; it is called on every subsequent state mutation.
    pub fn add_listener(&self, listener: Arc<dyn StateListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Sets the delegate, replacing any previous one. Only a weak reference is kept.
    pub fn set_delegate<D: RelayDelegate>(&self, delegate: &Arc<D>) {
        self.inner.delegate.set(delegate);
    }

    /// Removes the delegate.
    pub fn clear_delegate(&self) {
        self.inner.delegate.clear();
    }

    /// Lifecycle event bus.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Shortcut for `bus().subscribe()`.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// False once the relay has been shut down.
    pub fn is_running(&self) -> bool {
        !self.inner.token.is_cancelled()
    }

    /// Stops the relay: the active subscription is cancelled and later requests fail
    /// with [`RelayError::Closed`]. Pipelines already in flight run to completion.
    pub fn shutdown(&self) {
        self.inner.token.cancel();
    }
}

/// Turns every identity change into a refresh request carrying that change's snapshot.
///
/// Changes are queued in order, so `a → b → a` resubscribes twice even when the
/// updates land before the owner task gets to them.
pub(crate) fn spawn_identity_watcher(
    mut changes: broadcast::Receiver<ServerInfo>,
    commands: mpsc::Sender<Command>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let info = tokio::select! {
                _ = token.cancelled() => break,
                res = changes.recv() => match res {
                    Ok(info) => {
                        tracing::debug!(routing_key = %info.routing_key, "server identity changed");
                        Some(info)
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Intermediate snapshots are lost; reconcile with the current one.
                        tracing::warn!(skipped, "identity watcher lagged behind server updates");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("server identity dropped, watcher stopped");
                        break;
                    }
                },
            };

            if commands.send(Command::Refresh { info, reply: None }).await.is_err() {
                break;
            }
        }
    });
}

/// Forwards bus events to the subscriber set until the relay stops, then drains it.
pub(crate) fn spawn_subscriber_listener(set: SubscriberSet, bus: &Bus, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        // Flush what is already buffered.
        while let Ok(ev) = rx.try_recv() {
            set.emit(&ev);
        }
        set.shutdown().await;
    });
}
