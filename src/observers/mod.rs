//! Delegate/observer bridge.
//!
//! - [`ListenerSet`] broadcasts every state transition, synchronously, to all registered
//!   [`StateListener`]s.
//! - [`DelegateSlot`] forwards each accepted event's raw payload to at most one weakly
//!   held [`RelayDelegate`].
//!
//! Both are invoked on the mutating context: a listener never sees an intermediate
//! state and the delegate runs before any asynchronous pipeline stage.

mod delegate;
mod listener;

pub use delegate::{DelegateSlot, RelayDelegate};
pub use listener::{ListenerId, ListenerSet, StateListener};
