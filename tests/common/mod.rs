#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use pushrelay::{
    Connection, ConnectionProvider, ContentEnricher, Event, EventKind, NotificationContent,
    NotificationRequest, NotificationSink, Relay, RelayConfig, Request, Response, ServerInfo,
    ServiceError, StateListener, StreamHandler, SubscribeRequest, SubscriptionState,
    WatchedServer,
};

pub const WAIT: Duration = Duration::from_secs(2);

/// One subscribe call seen by [`MockConnection`].
#[derive(Clone)]
pub struct Subscribed {
    pub request: SubscribeRequest,
    pub handler: StreamHandler,
    pub token: CancellationToken,
    /// Subscriptions still live when this one was requested.
    pub live_before: usize,
}

/// Connection that records subscribe calls and sent requests.
#[derive(Default)]
pub struct MockConnection {
    subscriptions: Mutex<Vec<Subscribed>>,
    sent: Mutex<Vec<Request>>,
    fail_send: AtomicBool,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscriptions(&self) -> Vec<Subscribed> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn cancelled_count(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.token.is_cancelled())
            .count()
    }

    pub fn last(&self) -> Subscribed {
        self.subscriptions
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no subscribe call recorded")
    }

    pub fn sent(&self) -> Vec<Request> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn subscribe(&self, request: SubscribeRequest, handler: StreamHandler) -> CancellationToken {
        let token = CancellationToken::new();
        let mut subs = self.subscriptions.lock().unwrap();
        let live_before = subs.iter().filter(|s| !s.token.is_cancelled()).count();
        subs.push(Subscribed {
            request,
            handler,
            token: token.clone(),
            live_before,
        });
        token
    }

    async fn send(&self, request: Request) -> Result<Response, ServiceError> {
        self.sent.lock().unwrap().push(request);
        if self.fail_send.load(Ordering::SeqCst) {
            Err(ServiceError::failed("socket closed"))
        } else {
            Ok(Value::Null)
        }
    }
}

/// Provider whose connection can be swapped or removed at runtime.
pub struct MockProvider {
    conn: Mutex<Option<Arc<MockConnection>>>,
}

impl MockProvider {
    pub fn with(conn: Option<Arc<MockConnection>>) -> Arc<Self> {
        Arc::new(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn set(&self, conn: Option<Arc<MockConnection>>) {
        *self.conn.lock().unwrap() = conn;
    }
}

impl ConnectionProvider for MockProvider {
    fn connection(&self, _server: &ServerInfo) -> Option<Arc<dyn Connection>> {
        self.conn
            .lock()
            .unwrap()
            .clone()
            .map(|c| c as Arc<dyn Connection>)
    }
}

/// Sink that records every request.
#[derive(Default)]
pub struct RecordingSink {
    added: Mutex<Vec<NotificationRequest>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        Arc::new(sink)
    }

    pub fn added(&self) -> Vec<NotificationRequest> {
        self.added.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn add(&self, request: NotificationRequest) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::rejected("notifications disabled"));
        }
        self.added.lock().unwrap().push(request);
        Ok(())
    }
}

/// Enricher that always fails.
pub struct BrokenEnricher;

#[async_trait]
impl ContentEnricher for BrokenEnricher {
    async fn enrich(&self, _base: NotificationContent) -> Result<NotificationContent, ServiceError> {
        Err(ServiceError::failed("attachment download failed"))
    }
}

/// Records every state the relay reports.
pub fn state_log() -> (Arc<Mutex<Vec<SubscriptionState>>>, Arc<dyn StateListener>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let listener: Arc<dyn StateListener> =
        Arc::new(move |s: &SubscriptionState| sink.lock().unwrap().push(*s));
    (log, listener)
}

/// A relay wired to mocks.
pub struct Harness {
    pub server: Arc<WatchedServer>,
    pub conn: Arc<MockConnection>,
    pub provider: Arc<MockProvider>,
    pub sink: Arc<RecordingSink>,
    pub relay: Relay,
}

pub fn server(routing_key: &str) -> Arc<WatchedServer> {
    WatchedServer::new(ServerInfo::new("home", routing_key, "2024.4.0"))
}

/// Builds a relay on `webhook-a` and waits for the initial subscribe.
pub async fn harness() -> Harness {
    harness_with(RelayConfig::default(), RecordingSink::new()).await
}

pub async fn harness_with(config: RelayConfig, sink: Arc<RecordingSink>) -> Harness {
    let server = server("webhook-a");
    let conn = MockConnection::new();
    let provider = MockProvider::with(Some(conn.clone()));

    let relay = Relay::builder(config, server.clone(), provider.clone(), sink.clone()).build();
    // Serialized behind the initial refresh.
    relay.refresh_subscription().await.unwrap();
    assert_eq!(conn.subscribe_count(), 1);

    Harness {
        server,
        conn,
        provider,
        sink,
        relay,
    }
}

/// Polls `cond` until it holds or [`WAIT`] elapses.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Receives bus events until one of `kind` arrives.
pub async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
}

/// In-memory `tracing` output, installed as the thread's default subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Routes every record emitted on this thread here until the guard drops.
    /// Only meaningful on the current-thread runtime.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
