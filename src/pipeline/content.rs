//! # Inbound events and notification content.
//!
//! [`InboundEvent`] wraps the raw payload delivered by the transport and extracts the
//! few fields the relay consumes:
//!
//! | field              | source                                   | fallback        |
//! |--------------------|------------------------------------------|-----------------|
//! | identifier         | `data.tag`                               | random UUID v4  |
//! | confirmation id    | `confirm_id`, then `hass_confirm_id`     | none            |
//! | title / subtitle   | `title` / `subtitle`                     | none            |
//! | body               | `message`                                | empty string    |
//!
//! Everything else stays opaque and travels untouched in
//! [`NotificationContent::user_info`].

use serde::Serialize;
use serde_json::Value;

use crate::error::EventError;
use crate::ports::ServerInfo;

/// One event received from the remote stream.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    identifier: String,
    confirm_id: Option<String>,
    payload: Value,
}

impl InboundEvent {
    /// Parses a transport payload. Only JSON objects are accepted.
    pub fn from_payload(payload: Value) -> Result<Self, EventError> {
        let obj = payload.as_object().ok_or(EventError::NotAnObject)?;

        let identifier = obj
            .get("data")
            .and_then(|d| d.get("tag"))
            .and_then(Value::as_str)
            .filter(|tag| !tag.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let confirm_id = ["confirm_id", "hass_confirm_id"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .map(str::to_owned);

        Ok(Self {
            identifier,
            confirm_id,
            payload,
        })
    }

    /// Stable identifier, used as the local notification identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Confirmation id, present when the server expects an acknowledgment.
    pub fn confirm_id(&self) -> Option<&str> {
        self.confirm_id.as_deref()
    }

    /// Raw payload as delivered by the transport.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Builds the base notification content bound to `server`.
    pub fn content(&self, server: &ServerInfo) -> NotificationContent {
        let text = |key: &str| {
            self.payload
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        NotificationContent {
            title: text("title"),
            subtitle: text("subtitle"),
            body: text("message").unwrap_or_default(),
            attachments: Vec::new(),
            user_info: self.payload.clone(),
            server: server.id.clone(),
        }
    }
}

/// External content attached by enrichment (image, video, audio…).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Attachment identifier, unique within one notification.
    pub identifier: String,
    /// Local or remote location of the resolved content.
    pub url: String,
    /// MIME type when known.
    pub content_type: Option<String>,
}

/// Platform-neutral notification content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationContent {
    /// Title line.
    pub title: Option<String>,
    /// Secondary line.
    pub subtitle: Option<String>,
    /// Body text.
    pub body: String,
    /// Content resolved by enrichment; empty for base content.
    pub attachments: Vec<Attachment>,
    /// Raw event payload.
    pub user_info: Value,
    /// Identifier of the owning server.
    pub server: String,
}

/// What the relay hands to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    /// Notification identifier (the event identifier).
    pub identifier: String,
    /// Content to present.
    pub content: NotificationContent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server() -> ServerInfo {
        ServerInfo::new("home", "abc", "2024.1.0")
    }

    #[test]
    fn extracts_identifier_and_confirm_id() {
        let ev = InboundEvent::from_payload(json!({
            "message": "Door opened",
            "data": {"tag": "evt-1"},
            "confirm_id": "c-1",
        }))
        .unwrap();

        assert_eq!(ev.identifier(), "evt-1");
        assert_eq!(ev.confirm_id(), Some("c-1"));
    }

    #[test]
    fn legacy_confirm_key_is_accepted() {
        let ev = InboundEvent::from_payload(json!({"hass_confirm_id": "c-9"})).unwrap();
        assert_eq!(ev.confirm_id(), Some("c-9"));
    }

    #[test]
    fn untagged_events_get_distinct_identifiers() {
        let a = InboundEvent::from_payload(json!({"message": "x"})).unwrap();
        let b = InboundEvent::from_payload(json!({"message": "x"})).unwrap();
        assert_ne!(a.identifier(), b.identifier());
        assert!(a.confirm_id().is_none());
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(
            InboundEvent::from_payload(json!(["nope"])),
            Err(EventError::NotAnObject)
        );
    }

    #[test]
    fn content_is_bound_to_server() {
        let payload = json!({
            "title": "Garage",
            "message": "Door opened",
            "data": {"tag": "evt-1"},
        });
        let ev = InboundEvent::from_payload(payload.clone()).unwrap();
        let content = ev.content(&server());

        assert_eq!(content.title.as_deref(), Some("Garage"));
        assert_eq!(content.subtitle, None);
        assert_eq!(content.body, "Door opened");
        assert_eq!(content.server, "home");
        assert_eq!(content.user_info, payload);
        assert!(content.attachments.is_empty());
    }
}
