//! Shared helpers: file-backed SQLite databases in a temp dir.

#![allow(dead_code)]

use std::time::Duration;
use storage::{PersistenceGateway, PoolSettings, Reconciler, TableNamespace};
use tempfile::TempDir;

pub struct TestDb {
    pub dir: TempDir,
    pub url: String,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", dir.path().join("bot.db").display());
        Self { dir, url }
    }

    pub async fn gateway(&self, namespace: &str) -> PersistenceGateway {
        self.gateway_with(namespace, PoolSettings::default()).await
    }

    pub async fn gateway_with(&self, namespace: &str, settings: PoolSettings) -> PersistenceGateway {
        PersistenceGateway::connect(
            &self.url,
            &settings,
            TableNamespace::new(namespace).expect("valid namespace"),
        )
        .await
        .expect("Failed to connect")
    }

    /// Gateway with the schema reconciled to head.
    pub async fn ready_gateway(&self, namespace: &str, settings: PoolSettings) -> PersistenceGateway {
        let gateway = self.gateway_with(namespace, settings).await;
        Reconciler::new(&gateway)
            .run()
            .await
            .expect("Failed to reconcile");
        gateway
    }
}

pub fn small_pool(max_connections: u32) -> PoolSettings {
    PoolSettings {
        max_connections,
        acquire_timeout: Duration::from_millis(300),
        busy_timeout: Duration::from_secs(5),
    }
}

pub async fn table_names(gateway: &PersistenceGateway) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') ORDER BY name",
    )
    .fetch_all(gateway.pool())
    .await
    .expect("Failed to list tables")
}
