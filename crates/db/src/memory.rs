//! In-process [`AssetStore`] backend.
//!
//! Records live in an insertion-ordered map of `Arc` snapshots behind a
//! short-lived `RwLock`. Writers additionally hold a per-asset mutex for the
//! whole read-validate-write sequence, so two transitions on the same asset
//! are serialized while writes to different assets only contend on the brief
//! map update.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use rigforge_core::error::CoreError;
use rigforge_core::metadata::AssetMetadata;
use rigforge_core::stats::AssetFilter;
use rigforge_core::types::AssetId;
use tokio::sync::{Mutex, RwLock};

use crate::store::{AssetStore, UpdateFn, UpsertFn};
use crate::StoreError;

/// Memory-backed asset metadata store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<IndexMap<AssetId, Arc<AssetMetadata>>>,
    locks: Mutex<HashMap<AssetId, Arc<Mutex<()>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The write lock for one asset, created on first use.
    async fn asset_lock(&self, asset_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(asset_id.to_string()).or_default())
    }

    async fn snapshot(&self, asset_id: &str) -> Option<Arc<AssetMetadata>> {
        self.records.read().await.get(asset_id).cloned()
    }

    async fn commit(&self, metadata: AssetMetadata) -> AssetMetadata {
        let stored = Arc::new(metadata);
        let mut records = self.records.write().await;
        // `insert` keeps the original position when the key already exists.
        records.insert(stored.id.clone(), Arc::clone(&stored));
        (*stored).clone()
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, asset_id: &str) -> Result<AssetMetadata, StoreError> {
        self.snapshot(asset_id)
            .await
            .map(|record| (*record).clone())
            .ok_or_else(|| CoreError::asset_not_found(asset_id).into())
    }

    async fn put(
        &self,
        asset_id: &str,
        metadata: AssetMetadata,
    ) -> Result<AssetMetadata, StoreError> {
        metadata.validate_for(asset_id)?;

        let lock = self.asset_lock(asset_id).await;
        let _guard = lock.lock().await;

        let stored = self.commit(metadata).await;
        tracing::debug!(asset_id, "Asset metadata stored");
        Ok(stored)
    }

    async fn list(&self, filter: &AssetFilter) -> Result<Vec<AssetMetadata>, StoreError> {
        let snapshot: Vec<Arc<AssetMetadata>> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|record| filter.matches(record))
                .cloned()
                .collect()
        };
        Ok(snapshot.iter().map(|record| (**record).clone()).collect())
    }

    async fn count(&self, filter: &AssetFilter) -> Result<i64, StoreError> {
        let records = self.records.read().await;
        let count = records.values().filter(|record| filter.matches(record)).count();
        Ok(count as i64)
    }

    async fn update(
        &self,
        asset_id: &str,
        apply: UpdateFn<'_>,
    ) -> Result<AssetMetadata, StoreError> {
        let lock = self.asset_lock(asset_id).await;
        let _guard = lock.lock().await;

        let current = self
            .snapshot(asset_id)
            .await
            .ok_or_else(|| CoreError::asset_not_found(asset_id))?;

        let next = apply(current.as_ref())?;
        next.validate_for(asset_id)?;

        Ok(self.commit(next).await)
    }

    async fn upsert(
        &self,
        asset_id: &str,
        apply: UpsertFn<'_>,
    ) -> Result<AssetMetadata, StoreError> {
        let lock = self.asset_lock(asset_id).await;
        let _guard = lock.lock().await;

        let current = self.snapshot(asset_id).await;
        let next = apply(current.as_deref())?;
        next.validate_for(asset_id)?;

        Ok(self.commit(next).await)
    }
}
