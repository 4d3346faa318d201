//! Asset metadata storage.
//!
//! [`AssetStore`] is the storage seam used by the lifecycle manager and the
//! HTTP layer. Two backends implement it:
//!
//! - [`MemoryStore`]: in-process, insertion-ordered, per-asset write locks.
//! - [`PgAssetStore`]: PostgreSQL via sqlx, one JSONB row per asset, row
//!   locks (`SELECT ... FOR UPDATE`) for read-modify-write.

pub mod memory;
pub mod postgres;
pub mod store;

use rigforge_core::error::CoreError;
use sqlx::postgres::PgPoolOptions;

pub use memory::MemoryStore;
pub use postgres::PgAssetStore;
pub use store::{AssetStore, UpdateFn, UpsertFn};

pub type DbPool = sqlx::PgPool;

/// Errors surfaced by an [`AssetStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A domain-level rejection (not found, validation, lifecycle).
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            StoreError::Core(core) => Some(core),
            StoreError::Database(_) => None,
        }
    }
}

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool can reach the server.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
