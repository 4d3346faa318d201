use crate::rigging::RiggingPhase;
use crate::types::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested lifecycle operation is not legal from the current phase.
    #[error("Cannot {operation} rigging while asset is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: RiggingPhase,
    },

    /// A job signal carried a task id that is not the asset's current one.
    ///
    /// Expected under at-least-once delivery; the stale job should stop retrying.
    #[error("Stale rigging task {received} (current task: {})", display_task(.expected))]
    StaleTask {
        expected: Option<TaskId>,
        received: TaskId,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn display_task(task: &Option<TaskId>) -> &str {
    task.as_ref().map(TaskId::as_str).unwrap_or("none")
}

impl CoreError {
    /// Shorthand for a missing asset.
    pub fn asset_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Asset",
            id: id.into(),
        }
    }
}
