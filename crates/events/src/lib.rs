//! rigforge event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`AssetEvent`]: the event envelope published for every committed
//!   write and lifecycle transition.
//! - [`EventLog`]: background subscriber that writes events to the log.

pub mod bus;
pub mod log;

pub use bus::{AssetEvent, EventBus};
pub use log::EventLog;
