//! # Built-in subscribers
//!
//! - [`LogWriter`]: writes every event as a `tracing` record (demo/debug).

mod log;

pub use log::LogWriter;
