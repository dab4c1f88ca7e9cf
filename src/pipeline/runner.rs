//! # Per-event delivery pipeline.
//!
//! Turns one [`InboundEvent`] into a delivered local notification and, when asked
//! for, a confirmation back to the server.
//!
//! ## Stages
//! ```text
//! dispatch(event)                                  (owner task, synchronous)
//!   ├─ 1. content   = event.content(server)         infallible
//!   ├─ 2. delegate.did_receive(payload)             before any async work
//!   └─ spawn ───────────────────────────────────────(pipeline task)
//!        ├─ 3. enrich(content)   Err ─► fall back to base content
//!        ├─ 4. sink.add(request) Err ─► DeliveryFailed, stop
//!        ├─ 5. confirm           only if confirm_id AND active subscription
//!        │                       Err ─► ConfirmationFailed (delivery stays)
//!        └─ 6. PipelineCompleted (first failure as reason)
//! ```
//!
//! ## Rules
//! - Stages of one event run strictly in order.
//! - Pipelines of different events run concurrently; completion order is not defined.
//! - No retries inside a pipeline.
//! - A failure is logged once, at warn, when the pipeline completes.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::events::{Bus, Event, EventKind};
use crate::observers::DelegateSlot;
use crate::ports::{Connection, ContentEnricher, NotificationSink, Request, ServerIdentity};

use super::content::{InboundEvent, NotificationContent, NotificationRequest};

/// Active subscription as seen by pipelines: the routing key and the connection
/// backing it.
#[derive(Clone)]
pub struct ActiveRoute {
    /// Routing identifier of the active subscription.
    pub routing_key: String,
    /// Connection the subscription was opened on.
    pub connection: Arc<dyn Connection>,
}

impl std::fmt::Debug for ActiveRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRoute")
            .field("routing_key", &self.routing_key)
            .finish_non_exhaustive()
    }
}

/// What happened at the confirmation stage of a successful pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// A confirmation was sent.
    Sent,
    /// The event carried no confirmation id.
    NotRequested,
    /// No subscription was active when the notification was delivered.
    NoSubscription,
}

/// Successful pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Identifier of the delivered notification.
    pub identifier: String,
    /// Confirmation stage outcome.
    pub confirmation: Confirmation,
}

/// Shared pipeline dependencies; one instance serves every event.
pub struct EventPipeline {
    server: Arc<dyn ServerIdentity>,
    sink: Arc<dyn NotificationSink>,
    enricher: Arc<dyn ContentEnricher>,
    delegate: Arc<DelegateSlot>,
    active: watch::Receiver<Option<ActiveRoute>>,
    confirm_command: Arc<str>,
    bus: Bus,
}

impl EventPipeline {
    /// Creates a pipeline.
    ///
    /// `active` mirrors the relay's active subscription; it is read at confirmation time.
    pub fn new(
        server: Arc<dyn ServerIdentity>,
        sink: Arc<dyn NotificationSink>,
        enricher: Arc<dyn ContentEnricher>,
        delegate: Arc<DelegateSlot>,
        active: watch::Receiver<Option<ActiveRoute>>,
        confirm_command: impl Into<Arc<str>>,
        bus: Bus,
    ) -> Arc<Self> {
        Arc::new(Self {
            server,
            sink,
            enricher,
            delegate,
            active,
            confirm_command: confirm_command.into(),
            bus,
        })
    }

    /// Runs stages 1–2 on the caller, then spawns stages 3–6.
    ///
    /// Callers may drop the handle: the pipeline reports its outcome on the bus and in
    /// the log either way.
    pub fn dispatch(
        self: &Arc<Self>,
        event: InboundEvent,
    ) -> JoinHandle<Result<Delivered, PipelineError>> {
        let base = event.content(&self.server.info());
        self.delegate.notify(event.payload());

        let me = Arc::clone(self);
        tokio::spawn(async move { me.complete(event, base).await })
    }

    async fn complete(
        &self,
        event: InboundEvent,
        base: NotificationContent,
    ) -> Result<Delivered, PipelineError> {
        let res = self.run_stages(&event, base).await;

        let mut done = Event::new(EventKind::PipelineCompleted).with_notification(event.identifier());
        match &res {
            Ok(delivered) => {
                tracing::debug!(
                    notification = %delivered.identifier,
                    confirmation = ?delivered.confirmation,
                    "notification pipeline succeeded"
                );
            }
            Err(err) => {
                tracing::warn!(
                    notification = %event.identifier(),
                    error = %err,
                    label = err.as_label(),
                    "notification pipeline failed"
                );
                done = done.with_reason(err.to_string());
            }
        }
        self.bus.publish(done);
        res
    }

    async fn run_stages(
        &self,
        event: &InboundEvent,
        base: NotificationContent,
    ) -> Result<Delivered, PipelineError> {
        let content = self.enrich(event, base).await;
        self.deliver(event, content).await?;
        let confirmation = self.confirm(event).await?;
        Ok(Delivered {
            identifier: event.identifier().to_owned(),
            confirmation,
        })
    }

    async fn enrich(&self, event: &InboundEvent, base: NotificationContent) -> NotificationContent {
        match self.enricher.enrich(base.clone()).await {
            Ok(content) => content,
            Err(err) => {
                tracing::info!(
                    notification = %event.identifier(),
                    error = %err,
                    "enrichment failed, delivering base content"
                );
                self.bus.publish(
                    Event::new(EventKind::EnrichmentFailed)
                        .with_notification(event.identifier())
                        .with_reason(err.to_string()),
                );
                base
            }
        }
    }

    async fn deliver(
        &self,
        event: &InboundEvent,
        content: NotificationContent,
    ) -> Result<(), PipelineError> {
        let request = NotificationRequest {
            identifier: event.identifier().to_owned(),
            content,
        };

        match self.sink.add(request).await {
            Ok(()) => {
                self.bus.publish(
                    Event::new(EventKind::NotificationDelivered).with_notification(event.identifier()),
                );
                Ok(())
            }
            Err(error) => {
                self.bus.publish(
                    Event::new(EventKind::DeliveryFailed)
                        .with_notification(event.identifier())
                        .with_reason(error.to_string()),
                );
                Err(PipelineError::Delivery {
                    identifier: event.identifier().to_owned(),
                    error,
                })
            }
        }
    }

    async fn confirm(&self, event: &InboundEvent) -> Result<Confirmation, PipelineError> {
        let Some(confirm_id) = event.confirm_id() else {
            return Ok(Confirmation::NotRequested);
        };
        let route = self.active.borrow().clone();
        let Some(route) = route else {
            tracing::debug!(
                notification = %event.identifier(),
                confirm_id,
                "no active subscription, skipping confirmation"
            );
            return Ok(Confirmation::NoSubscription);
        };

        let request = Request::confirmation(&self.confirm_command, confirm_id, &route.routing_key);
        let report = |kind| {
            Event::new(kind)
                .with_notification(event.identifier())
                .with_confirm_id(confirm_id)
                .with_routing_key(route.routing_key.as_str())
        };

        match route.connection.send(request).await {
            Ok(_) => {
                self.bus.publish(report(EventKind::ConfirmationSent));
                Ok(Confirmation::Sent)
            }
            Err(error) => {
                self.bus
                    .publish(report(EventKind::ConfirmationFailed).with_reason(error.to_string()));
                Err(PipelineError::Confirmation {
                    confirm_id: confirm_id.to_owned(),
                    error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::observers::RelayDelegate;
    use crate::ports::{
        PassthroughEnricher, Response, ServerInfo, StreamHandler, SubscribeRequest, WatchedServer,
    };
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Sink {
        fail: bool,
        added: Mutex<Vec<NotificationRequest>>,
    }

    #[async_trait]
    impl NotificationSink for Sink {
        async fn add(&self, request: NotificationRequest) -> Result<(), ServiceError> {
            if self.fail {
                return Err(ServiceError::failed("not authorized"));
            }
            self.added.lock().unwrap().push(request);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Conn {
        fail: bool,
        sent: Mutex<Vec<Request>>,
    }

    #[async_trait]
    impl Connection for Conn {
        fn subscribe(&self, _: SubscribeRequest, _: StreamHandler) -> CancellationToken {
            CancellationToken::new()
        }

        async fn send(&self, request: Request) -> Result<Response, ServiceError> {
            self.sent.lock().unwrap().push(request);
            if self.fail {
                Err(ServiceError::Disconnected)
            } else {
                Ok(Value::Null)
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl ContentEnricher for Broken {
        async fn enrich(&self, mut base: NotificationContent) -> Result<NotificationContent, ServiceError> {
            base.body.push_str(" (partially enriched)");
            Err(ServiceError::failed("attachment download failed"))
        }
    }

    #[derive(Default)]
    struct Delegate(Mutex<Vec<Value>>);

    impl RelayDelegate for Delegate {
        fn did_receive(&self, payload: &Value) {
            self.0.lock().unwrap().push(payload.clone());
        }
    }

    struct Fixture {
        pipeline: Arc<EventPipeline>,
        sink: Arc<Sink>,
        conn: Arc<Conn>,
        active: watch::Sender<Option<ActiveRoute>>,
        bus: Bus,
    }

    fn fixture(sink: Sink, conn: Conn, enricher: Arc<dyn ContentEnricher>) -> Fixture {
        let server = WatchedServer::new(ServerInfo::new("home", "abc", "1"));
        let sink = Arc::new(sink);
        let conn = Arc::new(conn);
        let (active, rx) = watch::channel(Some(ActiveRoute {
            routing_key: "abc".into(),
            connection: conn.clone(),
        }));
        let bus = Bus::new(64);
        let pipeline = EventPipeline::new(
            server,
            sink.clone(),
            enricher,
            Arc::new(DelegateSlot::new()),
            rx,
            "push/confirm",
            bus.clone(),
        );
        Fixture {
            pipeline,
            sink,
            conn,
            active,
            bus,
        }
    }

    fn event(payload: Value) -> InboundEvent {
        InboundEvent::from_payload(payload).unwrap()
    }

    #[tokio::test]
    async fn delivers_and_confirms() {
        let fx = fixture(Sink::default(), Conn::default(), Arc::new(PassthroughEnricher));

        let res = fx
            .pipeline
            .dispatch(event(json!({"message": "hi", "data": {"tag": "evt-1"}, "confirm_id": "c-1"})))
            .await
            .unwrap();

        assert_eq!(
            res,
            Ok(Delivered {
                identifier: "evt-1".into(),
                confirmation: Confirmation::Sent,
            })
        );
        let added = fx.sink.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].identifier, "evt-1");
        let sent = fx.conn.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, json!({"confirm_id": "c-1", "webhook_id": "abc"}));
    }

    #[tokio::test]
    async fn enrichment_failure_delivers_exact_base_content() {
        let fx = fixture(Sink::default(), Conn::default(), Arc::new(Broken));
        let ev = event(json!({"title": "T", "message": "body", "data": {"tag": "evt-2"}}));
        let base = ev.content(&ServerInfo::new("home", "abc", "1"));

        let res = fx.pipeline.dispatch(ev).await.unwrap();
        assert!(res.is_ok());
        assert_eq!(fx.sink.added.lock().unwrap()[0].content, base);
    }

    #[tokio::test]
    async fn delivery_failure_is_terminal() {
        let sink = Sink {
            fail: true,
            ..Sink::default()
        };
        let fx = fixture(sink, Conn::default(), Arc::new(PassthroughEnricher));

        let res = fx
            .pipeline
            .dispatch(event(json!({"data": {"tag": "evt-3"}, "confirm_id": "c-3"})))
            .await
            .unwrap();

        assert!(matches!(res, Err(PipelineError::Delivery { ref identifier, .. }) if identifier == "evt-3"));
        assert!(fx.conn.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_confirm_id_means_no_send() {
        let fx = fixture(Sink::default(), Conn::default(), Arc::new(PassthroughEnricher));
        let res = fx.pipeline.dispatch(event(json!({"message": "x"}))).await.unwrap();

        assert_eq!(res.unwrap().confirmation, Confirmation::NotRequested);
        assert!(fx.conn.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_active_subscription_means_no_send() {
        let fx = fixture(Sink::default(), Conn::default(), Arc::new(PassthroughEnricher));
        fx.active.send_replace(None);

        let res = fx
            .pipeline
            .dispatch(event(json!({"confirm_id": "c-4"})))
            .await
            .unwrap();

        assert_eq!(res.unwrap().confirmation, Confirmation::NoSubscription);
        assert!(fx.conn.sent.lock().unwrap().is_empty());
        assert_eq!(fx.sink.added.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn confirmation_failure_keeps_delivery() {
        let conn = Conn {
            fail: true,
            ..Conn::default()
        };
        let fx = fixture(Sink::default(), conn, Arc::new(PassthroughEnricher));
        let mut rx = fx.bus.subscribe();

        let res = fx
            .pipeline
            .dispatch(event(json!({"data": {"tag": "evt-5"}, "confirm_id": "c-5"})))
            .await
            .unwrap();

        let err = res.unwrap_err();
        assert!(err.is_delivered());
        assert_eq!(fx.sink.added.lock().unwrap().len(), 1);

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::NotificationDelivered,
                EventKind::ConfirmationFailed,
                EventKind::PipelineCompleted,
            ]
        );
    }

    #[tokio::test]
    async fn delegate_runs_before_async_stages() {
        let fx = fixture(Sink::default(), Conn::default(), Arc::new(PassthroughEnricher));
        let delegate = Arc::new(Delegate::default());
        fx.pipeline.delegate.set(&delegate);

        let payload = json!({"message": "hi"});
        let handle = fx.pipeline.dispatch(event(payload.clone()));

        // Seen before the spawned stages had a chance to run.
        assert_eq!(*delegate.0.lock().unwrap(), vec![payload]);
        handle.await.unwrap().unwrap();
    }
}
