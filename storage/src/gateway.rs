//! Persistence gateway: owns the pool and hands out units of work.

use crate::error::StorageError;
use crate::namespace::TableNamespace;
use crate::sqlite_pool::{open_pool, PoolSettings};
use crate::unit_of_work::UnitOfWork;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Shared by every dispatch cycle; cloning is cheap (the pool is reference counted).
#[derive(Clone)]
pub struct PersistenceGateway {
    pool: SqlitePool,
    namespace: TableNamespace,
}

impl PersistenceGateway {
    pub async fn connect(
        database_url: &str,
        settings: &PoolSettings,
        namespace: TableNamespace,
    ) -> Result<Self, StorageError> {
        let pool = open_pool(database_url, settings).await?;
        Ok(Self { pool, namespace })
    }

    pub fn from_pool(pool: SqlitePool, namespace: TableNamespace) -> Self {
        Self { pool, namespace }
    }

    /// Takes a connection from the pool (waiting up to the acquire timeout) and opens a
    /// write transaction on it.
    pub async fn acquire(&self) -> Result<UnitOfWork, StorageError> {
        let conn = self.pool.acquire().await.map_err(|e| {
            let err = StorageError::from(e);
            warn!(error = %err, "Failed to acquire connection");
            err
        })?;
        let uow = UnitOfWork::begin(conn, self.namespace.clone()).await?;
        debug!(namespace = %self.namespace, "step: unit of work opened");
        Ok(uow)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn namespace(&self) -> &TableNamespace {
        &self.namespace
    }

    /// Waits for checked-out connections to come back, then closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
