//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`AssetEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use rigforge_core::rigging::RiggingPhase;
use rigforge_core::types::{AssetId, TaskId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event type names
// ---------------------------------------------------------------------------

/// A full record was written through the store.
pub const ASSET_SAVED: &str = "asset.saved";
pub const RIGGING_ENQUEUED: &str = "rigging.enqueued";
pub const RIGGING_STARTED: &str = "rigging.started";
pub const RIGGING_COMPLETED: &str = "rigging.completed";
pub const RIGGING_FAILED: &str = "rigging.failed";
/// The deadline sweeper failed an overdue job.
pub const RIGGING_EXPIRED: &str = "rigging.expired";

// ---------------------------------------------------------------------------
// AssetEvent
// ---------------------------------------------------------------------------

/// Something that was committed for one asset.
///
/// Constructed via [`AssetEvent::new`] and enriched with
/// [`with_task`](AssetEvent::with_task), [`with_phase`](AssetEvent::with_phase),
/// and [`with_payload`](AssetEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEvent {
    /// Dot-separated event name, e.g. `"rigging.completed"`.
    pub event_type: String,

    pub asset_id: AssetId,

    /// Rigging job the event belongs to, when there is one.
    pub task_id: Option<TaskId>,

    /// Rigging phase after the change.
    pub phase: Option<RiggingPhase>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl AssetEvent {
    pub fn new(event_type: impl Into<String>, asset_id: impl Into<AssetId>) -> Self {
        Self {
            event_type: event_type.into(),
            asset_id: asset_id.into(),
            task_id: None,
            phase: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_phase(mut self, phase: RiggingPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`AssetEvent`].
///
/// # Usage
///
/// ```rust
/// use rigforge_events::bus::{AssetEvent, EventBus, RIGGING_ENQUEUED};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(AssetEvent::new(RIGGING_ENQUEUED, "goblin"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<AssetEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: AssetEvent) {
        // A SendError only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<AssetEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
