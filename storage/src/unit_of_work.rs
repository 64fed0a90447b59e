//! Unit of work: one write transaction on one pooled connection, bound to one dispatch cycle.
//!
//! `commit` and `rollback` are the only terminal operations and each unit of work accepts exactly
//! one of them. A unit of work dropped while still open is rolled back before its connection
//! goes back to the pool.

use crate::error::StorageError;
use crate::namespace::TableNamespace;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};
use tracing::{debug, error, warn};

pub struct UnitOfWork {
    conn: Option<PoolConnection<Sqlite>>,
    namespace: TableNamespace,
}

impl UnitOfWork {
    /// `BEGIN IMMEDIATE` takes SQLite's write lock up front, so concurrent units of work queue on
    /// the busy timeout instead of failing on lock upgrade.
    pub(crate) async fn begin(
        mut conn: PoolConnection<Sqlite>,
        namespace: TableNamespace,
    ) -> Result<Self, StorageError> {
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self {
            conn: Some(conn),
            namespace,
        })
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn namespace(&self) -> &TableNamespace {
        &self.namespace
    }

    pub fn users_table(&self) -> String {
        self.namespace.users_table()
    }

    /// Raw connection inside the open transaction, for handler queries.
    pub fn connection(&mut self) -> Result<&mut SqliteConnection, StorageError> {
        self.conn
            .as_deref_mut()
            .ok_or(StorageError::UnitOfWorkAlreadyClosed)
    }

    pub async fn commit(&mut self) -> Result<(), StorageError> {
        let mut conn = self
            .conn
            .take()
            .ok_or(StorageError::UnitOfWorkAlreadyClosed)?;
        if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
            error!(error = %e, "Commit failed, rolling back");
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                error!(error = %rollback_err, "Rollback after failed commit failed, discarding connection");
                drop(conn.detach());
            }
            return Err(e.into());
        }
        debug!("step: unit of work committed");
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<(), StorageError> {
        let mut conn = self
            .conn
            .take()
            .ok_or(StorageError::UnitOfWorkAlreadyClosed)?;
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            // A connection with an unknown transaction state never re-enters the pool.
            error!(error = %e, "Rollback failed, discarding connection");
            drop(conn.detach());
            return Err(e.into());
        }
        debug!("step: unit of work rolled back");
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        warn!("Unit of work dropped while open, rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        error!(error = %e, "Deferred rollback failed, discarding connection");
                        drop(conn.detach());
                    }
                });
            }
            // Closing the raw connection makes SQLite discard the open transaction.
            Err(_) => drop(conn.detach()),
        }
    }
}
