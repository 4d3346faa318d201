//! Handlers for the asset metadata query surface and whole-record writes.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use rigforge_core::metadata::AssetMetadata;
use rigforge_core::rigging::RiggingPhase;
use rigforge_core::stats::AssetFilter;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /assets`.
#[derive(Debug, Default, Deserialize)]
pub struct AssetListParams {
    /// `true` for placeholders only, `false` for generated assets only.
    pub placeholder: Option<bool>,
    /// Rigging phase name (`unrigged`, `pending`, ...).
    pub status: Option<String>,
}

impl AssetListParams {
    fn into_filter(self) -> AppResult<AssetFilter> {
        let rigging_phase = self
            .status
            .as_deref()
            .map(str::parse::<RiggingPhase>)
            .transpose()?;
        Ok(AssetFilter {
            is_placeholder: self.placeholder,
            rigging_phase,
        })
    }
}

/// GET /api/assets
///
/// All asset records in insertion order, optionally filtered.
pub async fn list_assets(
    State(state): State<AppState>,
    Query(params): Query<AssetListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    let assets = state.store.list(&filter).await?;

    Ok(Json(DataResponse { data: assets }))
}

/// GET /api/assets/stats
pub async fn asset_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.lifecycle.stats().await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/assets/{id}
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let asset = state.store.get(&id).await?;
    Ok(Json(DataResponse { data: asset }))
}

/// PUT /api/assets/{id}
///
/// Insert or replace a whole record. Rigging status fields must match the
/// stored record; they only change through the rigging endpoints.
pub async fn put_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<AssetMetadata>,
) -> AppResult<impl IntoResponse> {
    let saved = state.lifecycle.save(&id, input).await?;
    Ok(Json(DataResponse { data: saved }))
}
