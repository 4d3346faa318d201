//! The rigging lifecycle manager.

use std::sync::Arc;

use chrono::Utc;
use rigforge_core::error::CoreError;
use rigforge_core::metadata::AssetMetadata;
use rigforge_core::rigging::{self, RigOutcome, RiggingCommand, RiggingPhase, RiggingSnapshot};
use rigforge_core::stats::{AssetFilter, AssetStats};
use rigforge_core::types::{AssetId, TaskId, Timestamp};
use rigforge_db::{AssetStore, StoreError};
use rigforge_events::bus::{
    AssetEvent, EventBus, ASSET_SAVED, RIGGING_COMPLETED, RIGGING_ENQUEUED, RIGGING_EXPIRED,
    RIGGING_FAILED, RIGGING_STARTED,
};

/// Tunables for [`RiggingLifecycle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleConfig {
    /// Deadline applied by `start` when the caller supplies none.
    /// `None` leaves such jobs without a deadline.
    pub processing_timeout: Option<chrono::Duration>,
}

/// Owns every rigging state change for the assets in one store.
pub struct RiggingLifecycle {
    store: Arc<dyn AssetStore>,
    events: Arc<EventBus>,
    config: LifecycleConfig,
}

impl RiggingLifecycle {
    pub fn new(store: Arc<dyn AssetStore>, events: Arc<EventBus>, config: LifecycleConfig) -> Self {
        Self {
            store,
            events,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// `UNRIGGED | FAILED -> PENDING` under a freshly minted task id.
    pub async fn enqueue(&self, asset_id: &str) -> Result<RiggingSnapshot, StoreError> {
        let task_id = TaskId::generate();
        self.transition(asset_id, RiggingCommand::Enqueue { task_id })
            .await
    }

    /// `PENDING -> PROCESSING`.
    ///
    /// `deadline` overrides the configured processing timeout; it must lie
    /// in the future.
    pub async fn start(
        &self,
        asset_id: &str,
        task_id: TaskId,
        deadline: Option<Timestamp>,
    ) -> Result<RiggingSnapshot, StoreError> {
        let now = Utc::now();
        let deadline =
            deadline.or_else(|| self.config.processing_timeout.map(|timeout| now + timeout));

        self.transition(
            asset_id,
            RiggingCommand::Start {
                task_id,
                deadline,
                now,
            },
        )
        .await
    }

    /// `PROCESSING -> COMPLETED` with the job's outputs.
    pub async fn succeed(
        &self,
        asset_id: &str,
        task_id: TaskId,
        outcome: RigOutcome,
    ) -> Result<RiggingSnapshot, StoreError> {
        self.transition(asset_id, RiggingCommand::Succeed { task_id, outcome })
            .await
    }

    /// `PROCESSING -> FAILED`, recording `error`.
    pub async fn fail(
        &self,
        asset_id: &str,
        task_id: TaskId,
        error: impl Into<String>,
    ) -> Result<RiggingSnapshot, StoreError> {
        let error = error.into();
        self.transition(asset_id, RiggingCommand::Fail { task_id, error })
            .await
    }

    /// Fail every processing job whose deadline is at or before `now`.
    ///
    /// Jobs that finish or are superseded between the scan and the
    /// transition are skipped. Returns the ids of the assets that were failed.
    pub async fn expire_overdue(&self, now: Timestamp) -> Result<Vec<AssetId>, StoreError> {
        let processing = self
            .store
            .list(&AssetFilter::in_phase(RiggingPhase::Processing))
            .await?;

        let mut expired = Vec::new();
        for asset in processing {
            let Some(rigging) = asset.rigging.as_ref() else {
                continue;
            };
            let (Some(task_id), Some(deadline)) =
                (rigging.rigging_task_id.clone(), rigging.processing_deadline)
            else {
                continue;
            };
            if deadline > now {
                continue;
            }

            match self
                .transition(&asset.id, RiggingCommand::Expire { task_id, now })
                .await
            {
                Ok(_) => expired.push(asset.id),
                Err(StoreError::Core(
                    CoreError::StaleTask { .. }
                    | CoreError::InvalidTransition { .. }
                    | CoreError::Conflict(_),
                )) => {
                    tracing::debug!(asset_id = %asset.id, "Job changed before it could be expired");
                }
                Err(e) => {
                    tracing::error!(asset_id = %asset.id, error = %e, "Failed to expire rigging job");
                }
            }
        }

        Ok(expired)
    }

    /// Write a whole record on behalf of a producer.
    ///
    /// Descriptive fields may change freely, but rigging status fields must
    /// match what is stored: those only move through the commands above.
    pub async fn save(
        &self,
        asset_id: &str,
        metadata: AssetMetadata,
    ) -> Result<AssetMetadata, StoreError> {
        metadata.validate_for(asset_id)?;

        let saved = self
            .store
            .upsert(
                asset_id,
                Box::new(
                    move |current: Option<&AssetMetadata>| -> Result<AssetMetadata, CoreError> {
                        rigging::ensure_lifecycle_preserved(
                            current.and_then(|asset| asset.rigging.as_ref()),
                            metadata.rigging.as_ref(),
                        )?;
                        Ok(metadata)
                    },
                ),
            )
            .await?;

        tracing::info!(
            asset_id,
            is_placeholder = saved.is_placeholder,
            "Asset metadata saved"
        );
        self.events.publish(
            AssetEvent::new(ASSET_SAVED, asset_id)
                .with_phase(saved.rigging_phase())
                .with_payload(serde_json::json!({ "isPlaceholder": saved.is_placeholder })),
        );

        Ok(saved)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Current phase and rigging record of one asset.
    pub async fn query(&self, asset_id: &str) -> Result<RiggingSnapshot, StoreError> {
        let asset = self.store.get(asset_id).await?;
        Ok(snapshot_of(asset))
    }

    pub async fn total_count(&self) -> Result<i64, StoreError> {
        self.store.count(&AssetFilter::all()).await
    }

    /// Assets that are no longer placeholders.
    pub async fn generated_count(&self) -> Result<i64, StoreError> {
        self.store.count(&AssetFilter::generated()).await
    }

    /// Assets whose rigging completed.
    pub async fn rigged_count(&self) -> Result<i64, StoreError> {
        self.store
            .count(&AssetFilter::in_phase(RiggingPhase::Completed))
            .await
    }

    /// All counters, computed from one snapshot so they agree with each other.
    pub async fn stats(&self) -> Result<AssetStats, StoreError> {
        let records = self.store.list_all().await?;
        Ok(AssetStats::from_records(&records))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn transition(
        &self,
        asset_id: &str,
        command: RiggingCommand,
    ) -> Result<RiggingSnapshot, StoreError> {
        let operation = command.operation();
        let task_id = command.task_id().clone();
        let event_payload = match &command {
            RiggingCommand::Succeed { outcome, .. } => {
                serde_json::json!({ "rigType": outcome.rig_type })
            }
            RiggingCommand::Fail { error, .. } => serde_json::json!({ "error": error }),
            RiggingCommand::Start {
                deadline: Some(deadline),
                ..
            } => serde_json::json!({ "deadline": deadline }),
            _ => serde_json::json!({}),
        };
        let event_type = event_type_for(&command);

        let result = self
            .store
            .update(
                asset_id,
                Box::new(move |current: &AssetMetadata| -> Result<AssetMetadata, CoreError> {
                    let next = rigging::apply(current.rigging.as_ref(), command)?;
                    Ok(AssetMetadata {
                        rigging: Some(next),
                        ..current.clone()
                    })
                }),
            )
            .await;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log_rejection(asset_id, operation, &task_id, &e);
                return Err(e);
            }
        };

        let phase = record.rigging_phase();
        tracing::info!(asset_id, task_id = %task_id, %phase, operation, "Rigging transition committed");

        self.events.publish(
            AssetEvent::new(event_type, asset_id)
                .with_task(task_id)
                .with_phase(phase)
                .with_payload(event_payload),
        );

        Ok(snapshot_of(record))
    }
}

fn event_type_for(command: &RiggingCommand) -> &'static str {
    match command {
        RiggingCommand::Enqueue { .. } => RIGGING_ENQUEUED,
        RiggingCommand::Start { .. } => RIGGING_STARTED,
        RiggingCommand::Succeed { .. } => RIGGING_COMPLETED,
        RiggingCommand::Fail { .. } => RIGGING_FAILED,
        RiggingCommand::Expire { .. } => RIGGING_EXPIRED,
    }
}

fn snapshot_of(asset: AssetMetadata) -> RiggingSnapshot {
    RiggingSnapshot {
        phase: asset.rigging_phase(),
        asset_id: asset.id,
        rigging: asset.rigging,
    }
}

/// Stale tasks are routine under at-least-once delivery; only unexpected
/// failures are logged as errors.
fn log_rejection(asset_id: &str, operation: &str, task_id: &TaskId, err: &StoreError) {
    match err {
        StoreError::Core(CoreError::StaleTask { .. }) => {
            tracing::warn!(asset_id, operation, task_id = %task_id, error = %err, "Stale rigging task rejected");
        }
        StoreError::Core(
            CoreError::InvalidTransition { .. }
            | CoreError::Validation(_)
            | CoreError::NotFound { .. }
            | CoreError::Conflict(_),
        ) => {
            tracing::info!(asset_id, operation, task_id = %task_id, error = %err, "Rigging transition rejected");
        }
        _ => {
            tracing::error!(asset_id, operation, task_id = %task_id, error = %err, "Rigging transition failed");
        }
    }
}
