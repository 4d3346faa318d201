//! Route definitions for asset metadata and the rigging lifecycle.
//!
//! All routes are mounted under `/assets`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{assets, rigging};
use crate::state::AppState;

/// Asset routes mounted at `/assets`.
///
/// ```text
/// GET    /                        -> list_assets
/// GET    /stats                   -> asset_stats
/// GET    /{id}                    -> get_asset
/// PUT    /{id}                    -> put_asset
/// GET    /{id}/rigging            -> get_rigging
/// POST   /{id}/rigging/enqueue    -> enqueue_rigging
/// POST   /{id}/rigging/start      -> start_rigging
/// POST   /{id}/rigging/succeed    -> succeed_rigging
/// POST   /{id}/rigging/fail       -> fail_rigging
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(assets::list_assets))
        .route("/stats", get(assets::asset_stats))
        .route("/{id}", get(assets::get_asset).put(assets::put_asset))
        .route("/{id}/rigging", get(rigging::get_rigging))
        .route("/{id}/rigging/enqueue", post(rigging::enqueue_rigging))
        .route("/{id}/rigging/start", post(rigging::start_rigging))
        .route("/{id}/rigging/succeed", post(rigging::succeed_rigging))
        .route("/{id}/rigging/fail", post(rigging::fail_rigging))
}
