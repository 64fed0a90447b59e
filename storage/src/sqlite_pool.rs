//! SQLite connection pool construction for the storage crate.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Bounds of the shared pool.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Hard upper bound on open connections.
    pub max_connections: u32,
    /// How long `acquire` waits for a free connection before `PoolExhausted`.
    pub acquire_timeout: Duration,
    /// How long a statement waits on SQLite's write lock held by another connection or process.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Opens a pool for `database_url` (`sqlite://path.db`, `sqlite::memory:`); creates the file if missing.
pub async fn open_pool(database_url: &str, settings: &PoolSettings) -> Result<SqlitePool, sqlx::Error> {
    info!(
        database_url = %database_url,
        max_connections = settings.max_connections,
        "Initializing SQLite pool"
    );

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(settings.busy_timeout);

    SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(options)
        .await
}
