//! PostgreSQL [`AssetStore`] backend.
//!
//! Each asset is one row of `asset_metadata` holding the full record as
//! JSONB plus denormalized `is_placeholder` / `rigging_phase` columns for
//! filtering. Read-modify-write runs inside a transaction that takes the
//! row lock with `SELECT ... FOR UPDATE`.

use async_trait::async_trait;
use rigforge_core::error::CoreError;
use rigforge_core::metadata::AssetMetadata;
use rigforge_core::stats::AssetFilter;
use sqlx::types::Json;

use crate::store::{AssetStore, UpdateFn, UpsertFn};
use crate::{DbPool, StoreError};

/// Build the `WHERE` clause for a filter, numbering binds from `$1`.
///
/// Binds must be attached in the same order: `is_placeholder`, then
/// `rigging_phase`.
fn where_clause(filter: &AssetFilter) -> String {
    let mut conditions = Vec::new();

    if filter.is_placeholder.is_some() {
        conditions.push(format!("is_placeholder = ${}", conditions.len() + 1));
    }
    if filter.rigging_phase.is_some() {
        conditions.push(format!("rigging_phase = ${}", conditions.len() + 1));
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// Asset metadata store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgAssetStore {
    pool: DbPool,
}

impl PgAssetStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl AssetStore for PgAssetStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, asset_id: &str) -> Result<AssetMetadata, StoreError> {
        let row: Option<(Json<AssetMetadata>,)> =
            sqlx::query_as("SELECT record FROM asset_metadata WHERE id = $1")
                .bind(asset_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(Json(record),)| record)
            .ok_or_else(|| CoreError::asset_not_found(asset_id).into())
    }

    async fn put(
        &self,
        asset_id: &str,
        metadata: AssetMetadata,
    ) -> Result<AssetMetadata, StoreError> {
        metadata.validate_for(asset_id)?;

        sqlx::query(
            "INSERT INTO asset_metadata (id, is_placeholder, rigging_phase, record) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
                 is_placeholder = EXCLUDED.is_placeholder, \
                 rigging_phase = EXCLUDED.rigging_phase, \
                 record = EXCLUDED.record, \
                 updated_at = NOW()",
        )
        .bind(asset_id)
        .bind(metadata.is_placeholder)
        .bind(metadata.rigging_phase().as_str())
        .bind(Json(&metadata))
        .execute(&self.pool)
        .await?;

        tracing::debug!(asset_id, "Asset metadata stored");
        Ok(metadata)
    }

    async fn list(&self, filter: &AssetFilter) -> Result<Vec<AssetMetadata>, StoreError> {
        let query = format!(
            "SELECT record FROM asset_metadata {} ORDER BY seq",
            where_clause(filter)
        );
        let mut q = sqlx::query_as::<_, (Json<AssetMetadata>,)>(&query);
        if let Some(placeholder) = filter.is_placeholder {
            q = q.bind(placeholder);
        }
        if let Some(phase) = filter.rigging_phase {
            q = q.bind(phase.as_str());
        }

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(Json(record),)| record).collect())
    }

    async fn count(&self, filter: &AssetFilter) -> Result<i64, StoreError> {
        let query = format!(
            "SELECT COUNT(*) FROM asset_metadata {}",
            where_clause(filter)
        );
        let mut q = sqlx::query_as::<_, (i64,)>(&query);
        if let Some(placeholder) = filter.is_placeholder {
            q = q.bind(placeholder);
        }
        if let Some(phase) = filter.rigging_phase {
            q = q.bind(phase.as_str());
        }

        let (count,) = q.fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn update(
        &self,
        asset_id: &str,
        apply: UpdateFn<'_>,
    ) -> Result<AssetMetadata, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Json<AssetMetadata>,)> =
            sqlx::query_as("SELECT record FROM asset_metadata WHERE id = $1 FOR UPDATE")
                .bind(asset_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((Json(current),)) = row else {
            return Err(CoreError::asset_not_found(asset_id).into());
        };

        // Dropping `tx` on the error paths below rolls back and releases the lock.
        let next = apply(&current)?;
        next.validate_for(asset_id)?;

        sqlx::query(
            "UPDATE asset_metadata \
             SET is_placeholder = $2, rigging_phase = $3, record = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(asset_id)
        .bind(next.is_placeholder)
        .bind(next.rigging_phase().as_str())
        .bind(Json(&next))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(next)
    }

    async fn upsert(
        &self,
        asset_id: &str,
        apply: UpsertFn<'_>,
    ) -> Result<AssetMetadata, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(Json<AssetMetadata>,)> =
            sqlx::query_as("SELECT record FROM asset_metadata WHERE id = $1 FOR UPDATE")
                .bind(asset_id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = row.map(|(Json(record),)| record);

        let next = apply(current.as_ref())?;
        next.validate_for(asset_id)?;

        // A new asset has no row to lock. If another writer inserted it in the
        // meantime, `WHERE $5` suppresses the update and no row is affected.
        let result = sqlx::query(
            "INSERT INTO asset_metadata (id, is_placeholder, rigging_phase, record) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
                 is_placeholder = EXCLUDED.is_placeholder, \
                 rigging_phase = EXCLUDED.rigging_phase, \
                 record = EXCLUDED.record, \
                 updated_at = NOW() \
             WHERE $5",
        )
        .bind(asset_id)
        .bind(next.is_placeholder)
        .bind(next.rigging_phase().as_str())
        .bind(Json(&next))
        .bind(current.is_some())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!(
                "Asset {asset_id} was created concurrently"
            ))
            .into());
        }

        tx.commit().await?;
        Ok(next)
    }
}
