//! Handlers for the rigging lifecycle command surface.
//!
//! Job runners drive an asset through `enqueue -> start -> succeed | fail`,
//! echoing back the task id handed out by `enqueue`. Signals carrying a
//! superseded task id are answered with `409 STALE_TASK` so the runner can
//! stop retrying.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use rigforge_core::rigging::RigOutcome;
use rigforge_core::types::TaskId;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartRiggingRequest {
    #[validate(length(min = 1, message = "taskId must not be empty"))]
    pub task_id: String,
    /// Absolute processing deadline; defaults to the configured timeout.
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SucceedRiggingRequest {
    #[validate(length(min = 1, message = "taskId must not be empty"))]
    pub task_id: String,
    #[serde(flatten)]
    pub outcome: RigOutcome,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FailRiggingRequest {
    #[validate(length(min = 1, message = "taskId must not be empty"))]
    pub task_id: String,
    /// Checked by the lifecycle once the task id is known to be current.
    pub error: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/assets/{id}/rigging
pub async fn get_rigging(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.lifecycle.query(&id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/assets/{id}/rigging/enqueue
///
/// Mints a new task id; the response carries it in `rigging.riggingTaskId`.
pub async fn enqueue_rigging(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.lifecycle.enqueue(&id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/assets/{id}/rigging/start
pub async fn start_rigging(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<StartRiggingRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let snapshot = state
        .lifecycle
        .start(&id, TaskId::from(input.task_id), input.deadline)
        .await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/assets/{id}/rigging/succeed
pub async fn succeed_rigging(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SucceedRiggingRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let snapshot = state
        .lifecycle
        .succeed(&id, TaskId::from(input.task_id), input.outcome)
        .await?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/assets/{id}/rigging/fail
pub async fn fail_rigging(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<FailRiggingRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let snapshot = state
        .lifecycle
        .fail(&id, TaskId::from(input.task_id), input.error)
        .await?;
    Ok(Json(DataResponse { data: snapshot }))
}
