//! # Example: Local Relay
//!
//! An in-process "server" pushes a few events over a loopback connection. The relay
//! turns them into notifications printed on stdout, confirms the ones that ask for it,
//! and resubscribes when the routing key changes.
//!
//! ```text
//! cargo run --example local_relay --features logging
//! RUST_LOG=pushrelay=debug cargo run --example local_relay --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pushrelay::{
    Connection, ConnectionProvider, LogWriter, NotificationRequest, NotificationSink, Relay,
    RelayConfig, Request, Response, ServerInfo, ServiceError, StreamHandler, Subscribe,
    SubscribeRequest, SubscriptionState, WatchedServer,
};

/// Pushes one event every 300ms until the subscription is cancelled.
struct Loopback {
    sequence: Arc<AtomicU32>,
}

#[async_trait]
impl Connection for Loopback {
    fn subscribe(&self, request: SubscribeRequest, handler: StreamHandler) -> CancellationToken {
        let token = CancellationToken::new();
        let stop = token.clone();
        let sequence = Arc::clone(&self.sequence);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handler.initiated(Ok(()));

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(300)) => {
                        let n = sequence.fetch_add(1, Ordering::Relaxed);
                        let mut event = json!({
                            "title": "Loopback",
                            "message": format!("event #{n} via {}", request.routing_key),
                            "data": { "tag": format!("loopback-{n}") },
                        });
                        if n % 2 == 0 {
                            event["confirm_id"] = Value::from(format!("confirm-{n}"));
                        }
                        handler.event(event);
                    }
                }
            }
        });
        token
    }

    async fn send(&self, request: Request) -> Result<Response, ServiceError> {
        println!("[server] {} {}", request.command, request.payload);
        Ok(json!({ "success": true }))
    }
}

struct Connections(Arc<Loopback>);

impl ConnectionProvider for Connections {
    fn connection(&self, _server: &ServerInfo) -> Option<Arc<dyn Connection>> {
        Some(self.0.clone())
    }
}

struct Stdout;

#[async_trait]
impl NotificationSink for Stdout {
    async fn add(&self, request: NotificationRequest) -> Result<(), ServiceError> {
        println!(
            "[notification] {} | {}: {}",
            request.identifier,
            request.content.title.as_deref().unwrap_or("-"),
            request.content.body
        );
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let server = WatchedServer::new(ServerInfo::new("home", "webhook-1", "2024.4.0"));
    let connections = Arc::new(Connections(Arc::new(Loopback {
        sequence: Arc::new(AtomicU32::new(0)),
    })));
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let relay = Relay::builder(RelayConfig::default(), server.clone(), connections, Arc::new(Stdout))
        .with_subscribers(subscribers)
        .with_listener(Arc::new(|state: &SubscriptionState| {
            println!("[state] {state}");
        }))
        .build();

    tokio::time::sleep(Duration::from_secs(1)).await;

    println!("[main] rotating webhook");
    server.set_routing_key("webhook-2");
    tokio::time::sleep(Duration::from_secs(1)).await;

    let outcome = relay.refresh_subscription().await?;
    println!("[main] refresh: {outcome:?}, state: {}", relay.state());

    relay.shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
