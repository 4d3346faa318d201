use async_trait::async_trait;
use rigforge_core::error::CoreError;
use rigforge_core::metadata::AssetMetadata;
use rigforge_core::stats::AssetFilter;

use crate::StoreError;

/// Read-modify-write step run by [`AssetStore::update`] while the asset is locked.
pub type UpdateFn<'a> =
    Box<dyn FnOnce(&AssetMetadata) -> Result<AssetMetadata, CoreError> + Send + 'a>;

/// Like [`UpdateFn`], but also called when the asset does not exist yet.
pub type UpsertFn<'a> =
    Box<dyn FnOnce(Option<&AssetMetadata>) -> Result<AssetMetadata, CoreError> + Send + 'a>;

/// Keyed, validated storage of [`AssetMetadata`].
///
/// Every write validates the full record before committing it, so a
/// stored record always satisfies the metadata invariants. Writes to the
/// same asset are serialized; writes to different assets proceed in
/// parallel. Reads return snapshots and never wait on a writer.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Short backend name for health output and logs.
    fn backend(&self) -> &'static str;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Fetch one record. Missing assets yield `CoreError::NotFound`.
    async fn get(&self, asset_id: &str) -> Result<AssetMetadata, StoreError>;

    /// Insert or replace the record for `asset_id`.
    ///
    /// The record's own `id` must equal `asset_id`. New assets are appended
    /// to the listing order; replaced assets keep their position.
    async fn put(
        &self,
        asset_id: &str,
        metadata: AssetMetadata,
    ) -> Result<AssetMetadata, StoreError>;

    /// Snapshot of matching records in insertion order.
    async fn list(&self, filter: &AssetFilter) -> Result<Vec<AssetMetadata>, StoreError>;

    /// Snapshot of every record in insertion order.
    async fn list_all(&self) -> Result<Vec<AssetMetadata>, StoreError> {
        self.list(&AssetFilter::all()).await
    }

    /// Number of records matching `filter`.
    async fn count(&self, filter: &AssetFilter) -> Result<i64, StoreError>;

    /// Atomically transform an existing record.
    ///
    /// `apply` sees the current record while the asset is locked. Its result
    /// is validated and committed; if `apply` or validation fails nothing is
    /// written and the error is returned.
    async fn update(
        &self,
        asset_id: &str,
        apply: UpdateFn<'_>,
    ) -> Result<AssetMetadata, StoreError>;

    /// Atomically insert or transform a record.
    ///
    /// Same contract as [`update`](AssetStore::update), except that `apply`
    /// receives `None` for an asset that does not exist yet.
    async fn upsert(
        &self,
        asset_id: &str,
        apply: UpsertFn<'_>,
    ) -> Result<AssetMetadata, StoreError>;
}
