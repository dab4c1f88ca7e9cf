use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::events::Bus;
use crate::observers::{DelegateSlot, ListenerSet, RelayDelegate, StateListener};
use crate::pipeline::EventPipeline;
use crate::ports::{
    ConnectionProvider, ContentEnricher, NotificationSink, PassthroughEnricher, ServerIdentity,
};
use crate::state::StateMachine;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::actor::{ActorParts, Command, RelayActor};
use super::config::RelayConfig;
use super::relay::{Inner, Relay, spawn_identity_watcher, spawn_subscriber_listener};

/// Builder for a [`Relay`] with optional collaborators.
pub struct RelayBuilder {
    cfg: RelayConfig,
    server: Arc<dyn ServerIdentity>,
    connections: Arc<dyn ConnectionProvider>,
    sink: Arc<dyn NotificationSink>,
    enricher: Arc<dyn ContentEnricher>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    listeners: Arc<ListenerSet>,
    delegate: Arc<DelegateSlot>,
}

impl RelayBuilder {
    /// Creates a builder with the required collaborators.
    pub fn new(
        cfg: RelayConfig,
        server: Arc<dyn ServerIdentity>,
        connections: Arc<dyn ConnectionProvider>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cfg,
            server,
            connections,
            sink,
            enricher: Arc::new(PassthroughEnricher),
            subscribers: Vec::new(),
            listeners: Arc::new(ListenerSet::new()),
            delegate: Arc::new(DelegateSlot::new()),
        }
    }

    /// Sets the content enricher. Default: [`PassthroughEnricher`].
    pub fn with_enricher(mut self, enricher: Arc<dyn ContentEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    /// Sets asynchronous event subscribers.
    ///
    /// Each gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Registers a state listener before the relay starts, so it also sees the
    /// outcome of the initial subscribe.
    pub fn with_listener(self, listener: Arc<dyn StateListener>) -> Self {
        self.listeners.add(listener);
        self
    }

    /// Sets the delegate (held weakly).
    pub fn with_delegate<D: RelayDelegate>(self, delegate: &Arc<D>) -> Self {
        self.delegate.set(delegate);
        self
    }

    /// Starts the relay and requests the initial subscribe.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Relay {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            spawn_subscriber_listener(set, &bus, token.clone());
        }

        let state = Arc::new(StateMachine::new(Arc::clone(&self.listeners), bus.clone()));
        let (active_tx, active_rx) = watch::channel(None);
        let cfg = Arc::new(self.cfg);

        let pipeline = EventPipeline::new(
            Arc::clone(&self.server),
            self.sink,
            self.enricher,
            Arc::clone(&self.delegate),
            active_rx.clone(),
            cfg.confirm_command.as_str(),
            bus.clone(),
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(cfg.command_capacity_clamped());

        spawn_identity_watcher(self.server.changes(), cmd_tx.clone(), token.clone());

        let actor = RelayActor::new(ActorParts {
            config: cfg,
            server: Arc::clone(&self.server),
            connections: self.connections,
            state: Arc::clone(&state),
            pipeline,
            active: active_tx,
            bus: bus.clone(),
        });
        tokio::spawn(actor.run(cmd_rx, token.clone()));

        // The queue is empty here, so this only fails if the actor already exited.
        if let Err(err) = cmd_tx.try_send(Command::Refresh {
            info: None,
            reply: None,
        }) {
            tracing::warn!(error = %err, "initial subscribe request not queued");
        }

        Relay::from_inner(Inner {
            commands: cmd_tx,
            state,
            listeners: self.listeners,
            delegate: self.delegate,
            active: active_rx,
            server: self.server,
            bus,
            _guard: token.clone().drop_guard(),
            token,
        })
    }
}
