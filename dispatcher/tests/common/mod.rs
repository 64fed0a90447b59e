//! Shared fixtures: temp-file databases, a recording bot and scriptable handlers.

#![allow(dead_code)]

use async_trait::async_trait;
use dbot_core::{Bot, DbotError, HandlerError, HandlerResponse, Update};
use dispatcher::{CommandHandler, Dispatcher, HandlerRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{PersistenceGateway, PoolSettings, Reconciler, TableNamespace, UnitOfWork, UserRecord};
use tempfile::TempDir;

pub struct TestDb {
    pub dir: TempDir,
    pub gateway: PersistenceGateway,
}

impl TestDb {
    pub async fn new(settings: PoolSettings) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", dir.path().join("bot.db").display());
        let gateway = PersistenceGateway::connect(
            &url,
            &settings,
            TableNamespace::new("bot").expect("valid namespace"),
        )
        .await
        .expect("Failed to connect");
        Self { dir, gateway }
    }

    /// Reconciles the schema and builds a dispatcher over `registry`.
    pub async fn dispatcher(&self, registry: HandlerRegistry) -> Dispatcher {
        let (ready, _) = Reconciler::new(&self.gateway)
            .run()
            .await
            .expect("Failed to reconcile");
        Dispatcher::new(registry, self.gateway.clone(), ready)
    }

    pub async fn user_count(&self) -> i64 {
        let mut uow = self.gateway.acquire().await.expect("Failed to acquire");
        let count = uow.count_users().await.expect("Failed to count");
        uow.rollback().await.expect("Failed to roll back");
        count
    }
}

pub fn small_pool(max_connections: u32) -> PoolSettings {
    PoolSettings {
        max_connections,
        acquire_timeout: Duration::from_millis(300),
        busy_timeout: Duration::from_secs(5),
    }
}

pub fn text_update(source_id: &str, chat_id: &str, sender_id: &str, text: &str) -> Update {
    Update::new(source_id, chat_id, sender_id).with_text(text)
}

/// Records every reply instead of sending it.
#[derive(Default)]
pub struct RecordingBot {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingBot {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Polls until at least `n` replies were recorded or `timeout` elapses.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> Vec<(String, String)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= n || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Bot for RecordingBot {
    async fn reply(&self, chat_id: &str, text: &str) -> dbot_core::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Greets the sender by display name.
pub struct GreetHandler;

#[async_trait]
impl CommandHandler for GreetHandler {
    async fn handle(
        &self,
        _update: &Update,
        user: &UserRecord,
        _uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        Ok(HandlerResponse::Reply(format!("Hello, {}", user.label())))
    }
}

/// Writes a second user row, then fails.
pub struct FailingHandler {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CommandHandler for FailingHandler {
    async fn handle(
        &self,
        _update: &Update,
        _user: &UserRecord,
        uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        uow.ensure_user("side-effect", Some("partial")).await?;
        Err(HandlerError::State("boom".to_string()).into())
    }
}

/// Commits on its own, which the dispatcher must treat as a failure.
pub struct SelfCommittingHandler;

#[async_trait]
impl CommandHandler for SelfCommittingHandler {
    async fn handle(
        &self,
        _update: &Update,
        _user: &UserRecord,
        uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        uow.commit().await.map_err(DbotError::from)?;
        Ok(HandlerResponse::Stop)
    }
}

/// Appends `start:<arg>` and `end:<arg>` around a sleep of `delay`.
pub struct TracingHandler {
    pub events: Arc<Mutex<Vec<String>>>,
    pub delay: Duration,
}

#[async_trait]
impl CommandHandler for TracingHandler {
    async fn handle(
        &self,
        update: &Update,
        _user: &UserRecord,
        _uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        let arg = update.arguments().unwrap_or_default().to_string();
        self.events.lock().unwrap().push(format!("start:{arg}"));
        tokio::time::sleep(self.delay).await;
        self.events.lock().unwrap().push(format!("end:{arg}"));
        Ok(HandlerResponse::Reply(arg))
    }
}

/// Writes a user row, then panics mid-cycle.
pub struct PanickingHandler;

#[async_trait]
impl CommandHandler for PanickingHandler {
    async fn handle(
        &self,
        _update: &Update,
        _user: &UserRecord,
        uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        uow.ensure_user("half-written", Some("partial")).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
        panic!("handler exploded");
    }
}
