pub mod assets;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /assets                              list (?placeholder=&status=)
/// /assets/stats                        aggregate counters
/// /assets/{id}                         get, put
/// /assets/{id}/rigging                 current phase + rigging record
/// /assets/{id}/rigging/enqueue         UNRIGGED | FAILED -> PENDING
/// /assets/{id}/rigging/start           PENDING -> PROCESSING
/// /assets/{id}/rigging/succeed         PROCESSING -> COMPLETED
/// /assets/{id}/rigging/fail            PENDING | PROCESSING -> FAILED
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/assets", assets::router())
}
