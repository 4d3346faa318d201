//! Event log service.
//!
//! [`EventLog`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! writes every received [`AssetEvent`] to the tracing pipeline, giving an
//! audit trail of lifecycle transitions in the service logs. It shuts down
//! when the bus sender is dropped.

use tokio::sync::broadcast;

use crate::bus::AssetEvent;

/// Background service that logs asset events.
pub struct EventLog;

impl EventLog {
    /// Run the logging loop until the channel closes.
    ///
    /// Returns the number of events logged.
    pub async fn run(mut receiver: broadcast::Receiver<AssetEvent>) -> u64 {
        let mut logged = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::record(&event);
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event log lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(logged, "Event bus closed, event log shutting down");
                    break;
                }
            }
        }
        logged
    }

    fn record(event: &AssetEvent) {
        tracing::info!(
            event_type = %event.event_type,
            asset_id = %event.asset_id,
            task_id = event.task_id.as_ref().map(|t| t.as_str()),
            phase = event.phase.map(|p| p.as_str()),
            payload = %event.payload,
            "Asset event",
        );
    }
}
