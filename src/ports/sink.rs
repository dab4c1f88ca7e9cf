//! # Notification sink and content enrichment seams.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::pipeline::{NotificationContent, NotificationRequest};

/// Platform local-notification delivery.
///
/// Identifier collisions are the sink's business (replace, drop, or stack).
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    /// Schedules one local notification.
    async fn add(&self, request: NotificationRequest) -> Result<(), ServiceError>;
}

/// Resolves external content (attachments, rich media) for a notification.
#[async_trait]
pub trait ContentEnricher: Send + Sync + 'static {
    /// Returns enriched content, or an error if enrichment is not possible.
    ///
    /// The relay falls back to `base` on error, so partial results must not leak
    /// through an `Err`.
    async fn enrich(&self, base: NotificationContent) -> Result<NotificationContent, ServiceError>;
}

/// Enricher that returns the base content unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughEnricher;

#[async_trait]
impl ContentEnricher for PassthroughEnricher {
    async fn enrich(&self, base: NotificationContent) -> Result<NotificationContent, ServiceError> {
        Ok(base)
    }
}
