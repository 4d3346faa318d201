//! Rigging lifecycle orchestration.
//!
//! [`RiggingLifecycle`] is the only component that changes rigging state.
//! It runs the pure transitions from `rigforge_core::rigging` inside the
//! store's per-asset atomic update, publishes an event for every committed
//! change, and answers aggregate queries from fresh store snapshots.
//!
//! [`DeadlineSweeper`] is the background task that fails processing jobs
//! whose deadline has passed.

pub mod manager;
pub mod sweep;

pub use manager::{LifecycleConfig, RiggingLifecycle};
pub use sweep::DeadlineSweeper;
