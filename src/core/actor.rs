//! # RelayActor: the subscription controller.
//!
//! Single owner of the active subscription and the only writer of the
//! [`StateMachine`]. Every input is serialized through one loop:
//!
//! ```text
//!              ┌──────────── commands (bounded) ◄── Relay handles, identity watcher
//!              │
//! RelayActor ──┼──────────── stream (unbounded) ◄── StreamHandler (transport callbacks)
//!   ::run()    │
//!              └──────────── resubscribe timer   (only if RelayConfig::resubscribe)
//!
//! Refresh (identity snapshot from the watcher, else the server's current one):
//!   routing key == active key ─► RefreshSkipped
//!   otherwise:
//!     release(active)          token.cancel(), active = None          (eager bookkeeping)
//!     provider.connection()    None ─► ConnectionUnavailable, stop
//!     connection.subscribe()   ─► active = {token, key, generation}   (stored immediately)
//!
//! Stream:
//!   Initiated(Ok)   ─► Available{0}                (stale generation: ignored)
//!   Initiated(Err)  ─► Unavailable [+ schedule resubscribe]
//!   Event(payload)  ─► increment(1) ─► pipeline.dispatch(event)  (not awaited)
//! ```
//!
//! ## Rules
//! - At most one subscription is alive; a replaced one is always cancelled first.
//! - Concurrent refreshes are applied one after another, each seeing the previous
//!   one's committed result.
//! - Cancelling is fire-and-forget; a superseded token is never touched again.
//! - Nothing here fails the loop: every error is logged, published and absorbed.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{RelayError, ServiceError};
use crate::events::{Bus, Event, EventKind};
use crate::pipeline::{ActiveRoute, EventPipeline, InboundEvent};
use crate::policies::BackoffPolicy;
use crate::ports::{
    ConnectionProvider, ServerIdentity, ServerInfo, StreamHandler, StreamMessage, StreamMessageKind,
    SubscribeRequest,
};
use crate::state::{StateMachine, SubscriptionState};

use super::config::RelayConfig;

/// Result of one refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The routing key matches the active subscription; nothing was done.
    Unchanged,
    /// A subscribe call was issued for `routing_key`.
    Subscribed {
        /// Routing key of the new subscription.
        routing_key: String,
    },
    /// No connection was available; no subscription exists now.
    ConnectionUnavailable,
}

/// Requests accepted by the owner loop.
pub(crate) enum Command {
    Refresh {
        /// Identity to reconcile with; `None` reads the server's current one.
        info: Option<ServerInfo>,
        reply: Option<oneshot::Sender<RefreshOutcome>>,
    },
    Cancel {
        reply: Option<oneshot::Sender<bool>>,
    },
}

/// The live subscription (token + routing key).
struct Subscription {
    token: CancellationToken,
    routing_key: String,
    generation: u64,
}

/// Pending automatic resubscribe.
struct Retry {
    at: Instant,
    generation: u64,
}

/// Everything the actor needs, wired by the builder.
pub(crate) struct ActorParts {
    pub config: Arc<RelayConfig>,
    pub server: Arc<dyn ServerIdentity>,
    pub connections: Arc<dyn ConnectionProvider>,
    pub state: Arc<StateMachine>,
    pub pipeline: Arc<EventPipeline>,
    pub active: watch::Sender<Option<ActiveRoute>>,
    pub bus: Bus,
}

pub(crate) struct RelayActor {
    config: Arc<RelayConfig>,
    server: Arc<dyn ServerIdentity>,
    connections: Arc<dyn ConnectionProvider>,
    state: Arc<StateMachine>,
    pipeline: Arc<EventPipeline>,
    active: watch::Sender<Option<ActiveRoute>>,
    bus: Bus,

    subscription: Option<Subscription>,
    next_generation: u64,
    /// Consecutive failed subscribe attempts for the current routing key.
    failures: u32,
    retry: Option<Retry>,

    stream_tx: mpsc::UnboundedSender<StreamMessage>,
    stream_rx: mpsc::UnboundedReceiver<StreamMessage>,
}

impl RelayActor {
    pub(crate) fn new(parts: ActorParts) -> Self {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        Self {
            config: parts.config,
            server: parts.server,
            connections: parts.connections,
            state: parts.state,
            pipeline: parts.pipeline,
            active: parts.active,
            bus: parts.bus,
            subscription: None,
            next_generation: 0,
            failures: 0,
            retry: None,
            stream_tx,
            stream_rx,
        }
    }

    /// Runs until `token` is cancelled or every command sender is gone, then releases
    /// the active subscription.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>, token: CancellationToken) {
        loop {
            let retry_at = self.retry.as_ref().map(|r| r.at);

            tokio::select! {
                _ = token.cancelled() => break,

                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },

                Some(msg) = self.stream_rx.recv() => self.handle_stream(msg),

                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.fire_retry();
                }
            }
        }

        self.release();
        tracing::debug!("relay stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Refresh { info, reply } => {
                let info = info.unwrap_or_else(|| self.server.info());
                let outcome = self.refresh(info, false);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::Cancel { reply } => {
                let released = self.release();
                if let Some(reply) = reply {
                    let _ = reply.send(released);
                }
            }
        }
    }

    /// Brings the subscription in line with `info`'s routing key.
    ///
    /// `force` resubscribes even if the key is unchanged (used by automatic retries).
    fn refresh(&mut self, info: ServerInfo, force: bool) -> RefreshOutcome {
        let same_key = self
            .subscription
            .as_ref()
            .is_some_and(|s| s.routing_key == info.routing_key);

        if same_key && !force {
            self.bus
                .publish(Event::new(EventKind::RefreshSkipped).with_routing_key(info.routing_key.as_str()));
            return RefreshOutcome::Unchanged;
        }
        if !same_key {
            self.failures = 0;
        }

        self.release();

        let Some(connection) = self.connections.connection(&info) else {
            let err = RelayError::ConnectionUnavailable { server: info.id };
            tracing::error!(routing_key = %info.routing_key, label = err.as_label(), "{err}, not subscribing");
            self.bus.publish(
                Event::new(EventKind::ConnectionUnavailable)
                    .with_routing_key(info.routing_key.as_str())
                    .with_reason(err.to_string()),
            );
            return RefreshOutcome::ConnectionUnavailable;
        };

        self.next_generation += 1;
        let generation = self.next_generation;
        let request = SubscribeRequest {
            topic: self.config.topic.clone(),
            routing_key: info.routing_key.clone(),
            version: info.version.clone(),
            support_confirm: self.config.support_confirm,
        };
        let handler = StreamHandler::new(generation, self.stream_tx.clone());

        let token = connection.subscribe(request, handler);
        self.subscription = Some(Subscription {
            token,
            routing_key: info.routing_key.clone(),
            generation,
        });
        self.active.send_replace(Some(ActiveRoute {
            routing_key: info.routing_key.clone(),
            connection,
        }));

        tracing::info!(
            routing_key = %info.routing_key,
            version = %info.version,
            attempt = self.failures + 1,
            "subscribing to event stream"
        );
        self.bus.publish(
            Event::new(EventKind::SubscribeRequested)
                .with_routing_key(info.routing_key.as_str())
                .with_attempt(self.failures + 1),
        );

        RefreshOutcome::Subscribed {
            routing_key: info.routing_key,
        }
    }

    /// Cancels the active subscription, if any. Returns whether one was released.
    fn release(&mut self) -> bool {
        self.retry = None;
        let Some(sub) = self.subscription.take() else {
            return false;
        };

        sub.token.cancel();
        self.active.send_replace(None);

        tracing::debug!(routing_key = %sub.routing_key, "subscription cancelled");
        self.bus.publish(
            Event::new(EventKind::SubscriptionCancelled).with_routing_key(sub.routing_key.as_str()),
        );
        true
    }

    fn handle_stream(&mut self, msg: StreamMessage) {
        match msg.kind {
            StreamMessageKind::Initiated(result) => self.on_initiated(msg.generation, result),
            StreamMessageKind::Event(payload) => self.on_event(payload),
        }
    }

    fn on_initiated(&mut self, generation: u64, result: Result<(), ServiceError>) {
        let Some(sub) = self.subscription.as_ref().filter(|s| s.generation == generation) else {
            tracing::debug!(generation, "ignoring outcome of a superseded subscription");
            return;
        };
        let routing_key = sub.routing_key.clone();

        match result {
            Ok(()) => {
                self.failures = 0;
                tracing::info!(%routing_key, "subscription established");
                self.bus.publish(
                    Event::new(EventKind::SubscriptionEstablished).with_routing_key(routing_key.as_str()),
                );
                self.state.set(SubscriptionState::Available { received: 0 });
            }
            Err(error) => {
                let err = RelayError::SubscribeFailed {
                    routing_key: routing_key.clone(),
                    error,
                };
                tracing::error!(label = err.as_label(), "{err}");
                self.bus.publish(
                    Event::new(EventKind::SubscriptionFailed)
                        .with_routing_key(routing_key.as_str())
                        .with_reason(err.to_string()),
                );
                self.state.set(SubscriptionState::Unavailable);

                if let Some(policy) = self.config.resubscribe {
                    self.schedule_retry(policy, generation, &routing_key);
                }
            }
        }
    }

    fn schedule_retry(&mut self, policy: BackoffPolicy, generation: u64, routing_key: &str) {
        let delay = policy.next(self.failures);
        self.failures = self.failures.saturating_add(1);
        self.retry = Some(Retry {
            at: Instant::now() + delay,
            generation,
        });

        tracing::debug!(routing_key, ?delay, attempt = self.failures, "resubscribe scheduled");
        self.bus.publish(
            Event::new(EventKind::ResubscribeScheduled)
                .with_routing_key(routing_key)
                .with_attempt(self.failures)
                .with_delay(delay),
        );
    }

    fn fire_retry(&mut self) {
        let Some(retry) = self.retry.take() else {
            return;
        };
        let current = self.subscription.as_ref().map(|s| s.generation);
        if current == Some(retry.generation) {
            let info = self.server.info();
            self.refresh(info, true);
        }
    }

    fn on_event(&mut self, payload: serde_json::Value) {
        let event = match InboundEvent::from_payload(payload) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(%error, "dropping malformed event");
                return;
            }
        };

        let state = self.state.increment(1);
        tracing::debug!(notification = %event.identifier(), %state, "event received");

        let mut received = Event::new(EventKind::EventReceived).with_notification(event.identifier());
        if let Some(confirm_id) = event.confirm_id() {
            received = received.with_confirm_id(confirm_id);
        }
        self.bus.publish(received);

        // Fire-and-forget: the pipeline reports its own outcome.
        drop(self.pipeline.dispatch(event));
    }
}
