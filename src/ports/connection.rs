//! # Persistent connection seam.
//!
//! The transport is an external collaborator. The relay only needs two primitives:
//!
//! ```text
//! subscribe(SubscribeRequest, StreamHandler) ─► CancellationToken
//!                 │
//!                 ├─► handler.initiated(Ok | Err)   once, when the server answers
//!                 └─► handler.event(payload)        for every matching event
//!
//! send(Request) ─► Result<Response, ServiceError>   (async)
//! ```
//!
//! The returned token is the subscription handle: the transport stops the stream once
//! it is cancelled. Cancelling is idempotent and is only a request; the transport may
//! finish tearing down later.
//!
//! A [`ConnectionProvider`] may have no connection for a server at call time; the relay
//! treats that as a recoverable absence.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

use super::ServerInfo;

/// Subscribe call for the event stream of one routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Stream topic.
    pub topic: String,
    /// Routing (webhook) identifier the stream is scoped to.
    pub routing_key: String,
    /// Owning server's version.
    pub version: String,
    /// Whether the relay will confirm events that carry a confirmation id.
    pub support_confirm: bool,
}

/// One-shot request sent over the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Command name.
    pub command: String,
    /// Command arguments.
    pub payload: Value,
}

impl Request {
    /// Delivery confirmation for `confirm_id`, scoped to `routing_key`.
    pub fn confirmation(command: &str, confirm_id: &str, routing_key: &str) -> Self {
        Self {
            command: command.to_owned(),
            payload: json!({
                "confirm_id": confirm_id,
                "webhook_id": routing_key,
            }),
        }
    }
}

/// Response to a [`Request`].
pub type Response = Value;

/// Transport message routed to the relay's owner task.
#[derive(Debug)]
pub(crate) struct StreamMessage {
    pub(crate) generation: u64,
    pub(crate) kind: StreamMessageKind,
}

#[derive(Debug)]
pub(crate) enum StreamMessageKind {
    Initiated(Result<(), ServiceError>),
    Event(Value),
}

/// Callback side of one subscription, handed to [`Connection::subscribe`].
///
/// Cheap to clone; every call is non-blocking. Calls made after the relay shut down
/// are ignored and return `false`.
#[derive(Debug, Clone)]
pub struct StreamHandler {
    generation: u64,
    tx: mpsc::UnboundedSender<StreamMessage>,
}

impl StreamHandler {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<StreamMessage>) -> Self {
        Self { generation, tx }
    }

    /// Reports the outcome of the subscribe call.
    pub fn initiated(&self, result: Result<(), ServiceError>) -> bool {
        self.push(StreamMessageKind::Initiated(result))
    }

    /// Forwards one event payload.
    pub fn event(&self, payload: Value) -> bool {
        self.push(StreamMessageKind::Event(payload))
    }

    fn push(&self, kind: StreamMessageKind) -> bool {
        self.tx
            .send(StreamMessage {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }
}

/// Persistent connection to the owning server (shared, never owned by the relay).
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Starts a subscription; returns its cancellation handle.
    fn subscribe(&self, request: SubscribeRequest, handler: StreamHandler) -> CancellationToken;

    /// Sends a one-shot request.
    async fn send(&self, request: Request) -> Result<Response, ServiceError>;
}

/// Looks up the connection for a server.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Returns `None` when no connection is available right now.
    fn connection(&self, server: &ServerInfo) -> Option<Arc<dyn Connection>>;
}
