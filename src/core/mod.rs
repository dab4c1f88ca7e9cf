//! Relay core: subscription ownership and lifecycle.
//!
//! The public API from this module is [`Relay`] (plus its builder, configuration and
//! [`RefreshOutcome`]).
//!
//! Internal modules:
//! - [`actor`]: the owner task; serializes refresh, cancel, stream callbacks and retries;
//! - [`relay`]: the public handle, identity watcher and subscriber listener;
//! - [`builder`]: wires collaborators and starts the tasks;
//! - [`config`]: relay settings.

mod actor;
mod builder;
mod config;
mod relay;

pub use actor::RefreshOutcome;
pub use builder::RelayBuilder;
pub use config::RelayConfig;
pub use relay::Relay;
