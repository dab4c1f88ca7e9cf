//! Subscription health.
//!
//! - [`SubscriptionState`] pure value type with the `increment` transition rule and a
//!   compact serde representation.
//! - [`StateMachine`] committed state owned by the relay, announcing each mutation to
//!   listeners and the bus.

mod machine;
mod subscription_state;

pub use machine::StateMachine;
pub use subscription_state::{StateDecodeError, SubscriptionState};
