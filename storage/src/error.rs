//! Storage error types.
//!
//! Used by the gateway, the unit of work and the migration reconciler.

use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No pooled connection became free within the acquire timeout. Transient.
    #[error("Connection pool exhausted")]
    PoolExhausted,
    /// Commit, rollback or a query was attempted on a finished unit of work.
    #[error("Unit of work already closed")]
    UnitOfWorkAlreadyClosed,
    #[error("Invalid table namespace: {0}")]
    InvalidNamespace(String),
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StorageError::PoolExhausted,
            other => StorageError::Database(other),
        }
    }
}

impl From<StorageError> for dbot_core::DbotError {
    fn from(err: StorageError) -> Self {
        dbot_core::DbotError::Database(err.to_string())
    }
}

/// Reconciliation failures. Every variant is fatal: the process must not start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("migration history out of order: expected version {expected}, found {found}")]
    OutOfOrder { expected: i64, found: i64 },
    #[error("database records version {version}, newer than known head {head}")]
    UnknownVersion { version: i64, head: i64 },
    #[error("existing table {table} does not match head schema: missing column(s) {missing:?}")]
    SchemaMismatch { table: String, missing: Vec<String> },
}
