//! Startup reconciliation of schema version bookkeeping against the actual catalog.
//!
//! Probe → one of Fresh / UnmanagedExisting / Tracked → Ready, or Failed with a
//! [`StorageError`]. The whole run holds SQLite's write lock (`BEGIN IMMEDIATE`) on one
//! connection, so duplicate instances sharing the database file reconcile one after another
//! and the later ones find a Tracked, up-to-date history.

use super::{head_version, ManagedTable, Migration, Step, MANAGED_TABLES, MIGRATIONS};
use crate::error::{MigrationError, StorageError};
use crate::gateway::PersistenceGateway;
use crate::namespace::TableNamespace;
use chrono::Utc;
use sqlx::{Row, SqliteConnection};
use std::collections::BTreeSet;
use tracing::{error, info, instrument, warn};

/// Schema bookkeeping as found by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    /// Recorded versions in the order they were appended.
    pub applied_versions: Vec<i64>,
    /// Sorted, comma-joined names of the managed tables present in the catalog.
    pub schema_fingerprint: String,
}

impl MigrationState {
    pub fn has_managed_tables(&self) -> bool {
        !self.schema_fingerprint.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePath {
    /// No managed tables: the full sequence was applied from empty.
    Fresh,
    /// Managed tables without history: head was stamped without running DDL.
    UnmanagedExisting,
    /// History present: only newer versions were applied.
    Tracked,
}

#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub path: ReconcilePath,
    /// State found by the probe, before any change.
    pub state: MigrationState,
    /// Versions executed (or stamped) by this run; empty when already at head.
    pub applied: Vec<i64>,
    pub head_version: i64,
}

/// Proof that reconciliation reached Ready. Only [`Reconciler::run`] creates one, and the
/// dispatcher requires it, so no update can be dispatched against an unreconciled schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaReady {
    _private: (),
}

pub struct Reconciler<'a> {
    gateway: &'a PersistenceGateway,
    migrations: &'a [Migration],
    tables: &'a [ManagedTable],
}

impl<'a> Reconciler<'a> {
    pub fn new(gateway: &'a PersistenceGateway) -> Self {
        Self {
            gateway,
            migrations: MIGRATIONS,
            tables: MANAGED_TABLES,
        }
    }

    /// Uses a custom catalogue, e.g. an older prefix of [`MIGRATIONS`] during a staged rollout.
    /// `tables` must describe the head of `migrations`.
    pub fn with_catalogue(
        gateway: &'a PersistenceGateway,
        migrations: &'a [Migration],
        tables: &'a [ManagedTable],
    ) -> Self {
        Self {
            gateway,
            migrations,
            tables,
        }
    }

    #[instrument(skip(self), fields(namespace = %self.gateway.namespace()))]
    pub async fn run(&self) -> Result<(SchemaReady, ReconcileReport), StorageError> {
        let mut conn = self.gateway.pool().acquire().await?;
        info!("step: reconcile waiting for schema lock");
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match self.reconcile_locked(&mut conn).await {
            Ok(report) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                info!(
                    path = ?report.path,
                    applied = ?report.applied,
                    head_version = report.head_version,
                    fingerprint = %report.state.schema_fingerprint,
                    "step: reconcile ready"
                );
                Ok((SchemaReady { _private: () }, report))
            }
            Err(e) => {
                if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    error!(error = %rollback_err, "Rollback of failed reconcile failed");
                }
                error!(error = %e, "step: reconcile failed");
                Err(e)
            }
        }
    }

    async fn reconcile_locked(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<ReconcileReport, StorageError> {
        let ns = self.gateway.namespace();
        let state = probe(conn, ns, self.tables).await?;
        let path = classify(&state);
        let head = head_version(self.migrations);
        info!(
            path = ?path,
            applied_versions = ?state.applied_versions,
            fingerprint = %state.schema_fingerprint,
            "step: reconcile probe done"
        );

        let applied = match path {
            ReconcilePath::Fresh => {
                ensure_history_table(conn, ns).await?;
                for migration in self.migrations {
                    apply(conn, ns, migration).await?;
                }
                self.migrations.iter().map(|m| m.version).collect()
            }
            ReconcilePath::UnmanagedExisting => {
                for table in self.tables {
                    verify_head_shape(conn, ns, table).await?;
                }
                warn!(
                    head_version = head,
                    "Managed tables exist without migration history; stamping head without running DDL"
                );
                ensure_history_table(conn, ns).await?;
                for migration in self.migrations {
                    record(conn, ns, migration).await?;
                }
                self.migrations.iter().map(|m| m.version).collect()
            }
            ReconcilePath::Tracked => {
                let done = validate_history(&state.applied_versions, self.migrations)?;
                let pending = &self.migrations[done..];
                for migration in pending {
                    apply(conn, ns, migration).await?;
                }
                pending.iter().map(|m| m.version).collect()
            }
        };

        Ok(ReconcileReport {
            path,
            state,
            applied,
            head_version: head,
        })
    }
}

/// Picks the reconciliation path from the probed state.
pub fn classify(state: &MigrationState) -> ReconcilePath {
    if !state.applied_versions.is_empty() {
        ReconcilePath::Tracked
    } else if state.has_managed_tables() {
        ReconcilePath::UnmanagedExisting
    } else {
        ReconcilePath::Fresh
    }
}

/// Checks that `applied` is exactly the first k versions of `catalogue`, in order; returns k.
pub fn validate_history(applied: &[i64], catalogue: &[Migration]) -> Result<usize, MigrationError> {
    let head = head_version(catalogue);
    for (i, &version) in applied.iter().enumerate() {
        if version > head {
            return Err(MigrationError::UnknownVersion { version, head });
        }
        let Some(expected) = catalogue.get(i).map(|m| m.version) else {
            return Err(MigrationError::OutOfOrder {
                expected: head + 1,
                found: version,
            });
        };
        if version != expected {
            return Err(MigrationError::OutOfOrder {
                expected,
                found: version,
            });
        }
    }
    Ok(applied.len())
}

async fn probe(
    conn: &mut SqliteConnection,
    ns: &TableNamespace,
    tables: &[ManagedTable],
) -> Result<MigrationState, StorageError> {
    let existing: BTreeSet<String> =
        sqlx::query_scalar::<_, String>("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let managed: BTreeSet<String> = tables
        .iter()
        .map(|t| ns.table(t.suffix))
        .filter(|name| existing.contains(name))
        .collect();
    let schema_fingerprint = managed.into_iter().collect::<Vec<_>>().join(",");

    let applied_versions = if existing.contains(&ns.migrations_table()) {
        sqlx::query_scalar::<_, i64>(&format!(
            "SELECT version FROM {} ORDER BY seq",
            ns.migrations_table()
        ))
        .fetch_all(&mut *conn)
        .await?
    } else {
        Vec::new()
    };

    Ok(MigrationState {
        applied_versions,
        schema_fingerprint,
    })
}

async fn ensure_history_table(
    conn: &mut SqliteConnection,
    ns: &TableNamespace,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        ns.migrations_table()
    ))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn table_columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<String>, StorageError> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(StorageError::from))
        .collect()
}

async fn verify_head_shape(
    conn: &mut SqliteConnection,
    ns: &TableNamespace,
    table: &ManagedTable,
) -> Result<(), StorageError> {
    let name = ns.table(table.suffix);
    let columns = table_columns(conn, &name).await?;
    let missing: Vec<String> = table
        .head_columns
        .iter()
        .filter(|c| !columns.iter().any(|existing| existing == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MigrationError::SchemaMismatch {
            table: name,
            missing,
        }
        .into());
    }
    Ok(())
}

async fn apply(
    conn: &mut SqliteConnection,
    ns: &TableNamespace,
    migration: &Migration,
) -> Result<(), StorageError> {
    info!(version = migration.version, name = migration.name, "step: applying migration");
    for step in migration.steps {
        match step {
            Step::Sql(template) => {
                sqlx::query(&ns.render(template)).execute(&mut *conn).await?;
            }
            Step::AddColumn {
                table,
                column,
                definition,
            } => {
                let table = ns.table(table);
                let columns = table_columns(conn, &table).await?;
                if !columns.iter().any(|c| c == column) {
                    sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))
                        .execute(&mut *conn)
                        .await?;
                }
            }
        }
    }
    record(conn, ns, migration).await
}

async fn record(
    conn: &mut SqliteConnection,
    ns: &TableNamespace,
    migration: &Migration,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        "INSERT OR IGNORE INTO {} (version, name, applied_at) VALUES (?, ?, ?)",
        ns.migrations_table()
    ))
    .bind(migration.version)
    .bind(migration.name)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
