//! Rigging lifecycle state machine.
//!
//! Every change to an asset's rigging status goes through [`apply`], driven
//! by a [`RiggingCommand`]. `apply` is pure: it takes the current rigging
//! record (if any), returns the next one, and validates it before returning,
//! so callers can commit the result as-is or discard it on error.
//!
//! ```text
//!   UNRIGGED --enqueue--> PENDING --start--> PROCESSING --succeed--> COMPLETED
//!                            ^                   |
//!                            |                 fail / expire
//!                            |                   v
//!                            +-----enqueue---- FAILED
//! ```
//!
//! Job signals (`start`, `succeed`, `fail`, `expire`) carry the task id that
//! was minted by the `enqueue` they belong to. A signal whose id does not
//! match the stored one is rejected with [`CoreError::StaleTask`] before the
//! phase is even looked at, so a superseded job can never overwrite state
//! owned by a newer one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metadata::{
    validate_error_message, validate_height, AnimationSets, RigType, RiggingMetadata,
    RiggingStatus,
};
use crate::types::{AssetId, TaskId, Timestamp};

/// Error recorded when the deadline sweeper fails an overdue job.
pub const DEADLINE_EXCEEDED_ERROR: &str = "rigging job exceeded its processing deadline";

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle phase derived from the persisted `riggingStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiggingPhase {
    Unrigged,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RiggingPhase {
    pub const ALL: [RiggingPhase; 5] = [
        Self::Unrigged,
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unrigged => "unrigged",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// The persisted status for this phase (`None` for unrigged).
    pub fn status(self) -> Option<RiggingStatus> {
        match self {
            Self::Unrigged => None,
            Self::Pending => Some(RiggingStatus::Pending),
            Self::Processing => Some(RiggingStatus::Processing),
            Self::Completed => Some(RiggingStatus::Completed),
            Self::Failed => Some(RiggingStatus::Failed),
        }
    }

    /// Phases from which a new job may be enqueued.
    pub fn can_enqueue(self) -> bool {
        matches!(self, Self::Unrigged | Self::Failed)
    }
}

impl From<Option<RiggingStatus>> for RiggingPhase {
    fn from(status: Option<RiggingStatus>) -> Self {
        match status {
            None => Self::Unrigged,
            Some(RiggingStatus::Pending) => Self::Pending,
            Some(RiggingStatus::Processing) => Self::Processing,
            Some(RiggingStatus::Completed) => Self::Completed,
            Some(RiggingStatus::Failed) => Self::Failed,
        }
    }
}

impl std::fmt::Display for RiggingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiggingPhase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid rigging phase '{s}'. Must be one of: unrigged, pending, processing, completed, failed"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Output of a successful rigging job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RigOutcome {
    pub rig_type: RigType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_height: Option<f64>,
    pub animations: AnimationSets,
    pub rigged_model_path: String,
    pub tpose_model_path: String,
    /// Animation packs this rig can play, merged into the stored set.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub animation_compatibility: BTreeSet<String>,
}

/// A requested lifecycle transition.
#[derive(Debug, Clone, PartialEq)]
pub enum RiggingCommand {
    Enqueue {
        task_id: TaskId,
    },
    /// `deadline`, when given, must lie after `now`.
    Start {
        task_id: TaskId,
        deadline: Option<Timestamp>,
        now: Timestamp,
    },
    Succeed {
        task_id: TaskId,
        outcome: RigOutcome,
    },
    Fail {
        task_id: TaskId,
        error: String,
    },
    /// Fail a processing job whose deadline is at or before `now`.
    Expire {
        task_id: TaskId,
        now: Timestamp,
    },
}

impl RiggingCommand {
    /// Operation name used in errors and events.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Enqueue { .. } => "enqueue",
            Self::Start { .. } => "start",
            Self::Succeed { .. } => "succeed",
            Self::Fail { .. } => "fail",
            Self::Expire { .. } => "expire",
        }
    }

    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::Enqueue { task_id }
            | Self::Start { task_id, .. }
            | Self::Succeed { task_id, .. }
            | Self::Fail { task_id, .. }
            | Self::Expire { task_id, .. } => task_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Transition function
// ---------------------------------------------------------------------------

/// Compute the rigging record that results from applying `command`.
///
/// Returns the validated next record, or the error that rejected the
/// command. The input is never modified.
pub fn apply(
    current: Option<&RiggingMetadata>,
    command: RiggingCommand,
) -> Result<RiggingMetadata, CoreError> {
    let operation = command.operation();
    let phase = current
        .map(RiggingMetadata::phase)
        .unwrap_or(RiggingPhase::Unrigged);

    if !matches!(command, RiggingCommand::Enqueue { .. }) {
        ensure_current_task(current, command.task_id())?;
    }

    let mut next = current.cloned().unwrap_or_default();

    match command {
        RiggingCommand::Enqueue { task_id } => {
            if !phase.can_enqueue() {
                return Err(CoreError::InvalidTransition {
                    operation,
                    state: phase,
                });
            }
            next.rigging_status = Some(RiggingStatus::Pending);
            next.rigging_task_id = Some(task_id);
            next.rigging_attempted = true;
            next.rigging_error = None;
            clear_outputs(&mut next);
        }
        RiggingCommand::Start { deadline, now, .. } => {
            require_phase(phase, RiggingPhase::Pending, operation)?;
            if let Some(deadline) = deadline {
                if deadline <= now {
                    return Err(CoreError::Validation(format!(
                        "Processing deadline {deadline} is not in the future"
                    )));
                }
            }
            next.rigging_status = Some(RiggingStatus::Processing);
            next.processing_deadline = deadline;
        }
        RiggingCommand::Succeed { outcome, .. } => {
            require_phase(phase, RiggingPhase::Processing, operation)?;
            validate_outcome(&outcome)?;
            next.rigging_status = Some(RiggingStatus::Completed);
            next.is_rigged = true;
            next.supports_animation = true;
            next.rig_type = Some(outcome.rig_type);
            next.character_height = outcome.character_height;
            next.animations = Some(outcome.animations);
            next.rigged_model_path = Some(outcome.rigged_model_path);
            next.tpose_model_path = Some(outcome.tpose_model_path);
            next.animation_compatibility
                .extend(outcome.animation_compatibility);
            next.processing_deadline = None;
        }
        RiggingCommand::Fail { error, .. } => {
            // A worker may give up before it ever reports `start`.
            if !matches!(phase, RiggingPhase::Pending | RiggingPhase::Processing) {
                return Err(CoreError::InvalidTransition {
                    operation,
                    state: phase,
                });
            }
            let error = error.trim().to_string();
            validate_error_message(&error)?;
            mark_failed(&mut next, error);
        }
        RiggingCommand::Expire { now, .. } => {
            require_phase(phase, RiggingPhase::Processing, operation)?;
            match next.processing_deadline {
                Some(deadline) if deadline <= now => {}
                Some(deadline) => {
                    return Err(CoreError::Conflict(format!(
                        "Rigging job is not overdue (deadline {deadline})"
                    )))
                }
                None => {
                    return Err(CoreError::Conflict(
                        "Rigging job has no processing deadline".to_string(),
                    ))
                }
            }
            mark_failed(&mut next, DEADLINE_EXCEEDED_ERROR.to_string());
        }
    }

    next.validate()?;
    Ok(next)
}

/// Reject a job signal whose task id is not the asset's current one.
fn ensure_current_task(
    current: Option<&RiggingMetadata>,
    received: &TaskId,
) -> Result<(), CoreError> {
    let expected = current.and_then(|meta| meta.rigging_task_id.as_ref());
    if expected == Some(received) {
        return Ok(());
    }
    Err(CoreError::StaleTask {
        expected: expected.cloned(),
        received: received.clone(),
    })
}

fn require_phase(
    phase: RiggingPhase,
    required: RiggingPhase,
    operation: &'static str,
) -> Result<(), CoreError> {
    if phase == required {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            operation,
            state: phase,
        })
    }
}

fn validate_outcome(outcome: &RigOutcome) -> Result<(), CoreError> {
    validate_height(Some(outcome.rig_type), outcome.character_height)?;
    outcome.animations.validate()?;
    if outcome.rigged_model_path.trim().is_empty() {
        return Err(CoreError::Validation(
            "riggedModelPath must not be empty".to_string(),
        ));
    }
    if outcome.tpose_model_path.trim().is_empty() {
        return Err(CoreError::Validation(
            "tposeModelPath must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn mark_failed(next: &mut RiggingMetadata, error: String) {
    next.rigging_status = Some(RiggingStatus::Failed);
    next.rigging_error = Some(error);
    clear_outputs(next);
}

/// Drop everything that only a completed rig may carry.
fn clear_outputs(next: &mut RiggingMetadata) {
    next.is_rigged = false;
    next.supports_animation = false;
    next.animations = None;
    next.rigged_model_path = None;
    next.tpose_model_path = None;
    next.processing_deadline = None;
}

/// Reject writes that would change lifecycle-owned rigging fields.
///
/// Producers writing whole records may edit the descriptive fields
/// (`rigType`, `characterHeight`, `animationCompatibility`) while the asset
/// is not completed; everything else only moves through [`apply`].
pub fn ensure_lifecycle_preserved(
    existing: Option<&RiggingMetadata>,
    incoming: Option<&RiggingMetadata>,
) -> Result<(), CoreError> {
    let default = RiggingMetadata::default();
    let existing = existing.unwrap_or(&default);
    let incoming = incoming.unwrap_or(&default);

    let lifecycle_view = |meta: &RiggingMetadata| {
        let completed = meta.phase() == RiggingPhase::Completed;
        RiggingMetadata {
            rig_type: if completed { meta.rig_type } else { None },
            character_height: if completed {
                meta.character_height
            } else {
                None
            },
            animation_compatibility: BTreeSet::new(),
            ..meta.clone()
        }
    };

    if lifecycle_view(existing) == lifecycle_view(incoming) {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "Rigging status fields can only change through rigging lifecycle operations"
                .to_string(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Current lifecycle phase plus the full rigging record of one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiggingSnapshot {
    pub asset_id: AssetId,
    pub phase: RiggingPhase,
    pub rigging: Option<RiggingMetadata>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
