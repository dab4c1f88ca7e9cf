//! Event pipeline: from inbound event to delivered (and confirmed) notification.
//!
//! - [`InboundEvent`], [`NotificationContent`], [`NotificationRequest`] data model
//! - [`EventPipeline`] staged async execution with enrichment fallback and
//!   conditional confirmation

mod content;
mod runner;

pub use content::{Attachment, InboundEvent, NotificationContent, NotificationRequest};
pub use runner::{ActiveRoute, Confirmation, Delivered, EventPipeline};
