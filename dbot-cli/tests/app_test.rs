//! End-to-end tests of the binary's wiring without Telegram: config from env, `migrate`, and the
//! shipped command table dispatching against a fresh temp-file database.

use dbot_cli::{build_registry, migrate, open_storage, BotConfig};
use dbot_core::Update;
use dispatcher::{DispatchOutcome, Dispatcher};
use serial_test::serial;
use storage::{ReconcilePath, Reconciler};
use tempfile::TempDir;

fn config_for_temp_db() -> (TempDir, BotConfig) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    std::env::set_var(
        "DATABASE_URL",
        format!("sqlite://{}", dir.path().join("bot.db").display()),
    );
    std::env::set_var("BOT_NAMESPACE", "hello_bot");
    std::env::remove_var("BOT_MODE");
    std::env::remove_var("DB_POOL_SIZE");
    let config = BotConfig::load(Some("test_token".to_string())).expect("Failed to load config");
    (dir, config)
}

/// **Test: `migrate` on a fresh database reconciles from scratch; a second run is a no-op.**
#[tokio::test]
#[serial]
async fn test_migrate_is_idempotent() {
    let (_dir, config) = config_for_temp_db();

    let first = migrate(&config).await.expect("first migrate failed");
    assert_eq!(first.path, ReconcilePath::Fresh);
    assert_eq!(first.applied, vec![1, 2]);

    let second = migrate(&config).await.expect("second migrate failed");
    assert_eq!(second.path, ReconcilePath::Tracked);
    assert!(second.applied.is_empty());
}

/// **Test: Fresh database + `/start` from u1 in c1.**
///
/// **Setup:** Empty database, shipped registry.
/// **Action:** Reconcile, dispatch `/start`, then `/stats` and `/help`.
/// **Expected:** Greeting with the display name; one known user; help lists the commands.
#[tokio::test]
#[serial]
async fn test_start_greets_new_user() {
    let (_dir, config) = config_for_temp_db();
    let gateway = open_storage(&config).await.expect("Failed to open storage");
    let (ready, _) = Reconciler::new(&gateway).run().await.expect("Failed to reconcile");
    let dispatcher = Dispatcher::new(build_registry().unwrap(), gateway.clone(), ready);

    let start = Update::new("1", "c1", "u1")
        .with_text("/start")
        .with_sender_name("@ann");
    assert_eq!(
        dispatcher.dispatch(start).await,
        DispatchOutcome::Success {
            reply: Some("Hello! Welcome to the bot, @ann".to_string())
        }
    );

    let stats = Update::new("2", "c1", "u1").with_text("/stats");
    assert_eq!(
        dispatcher.dispatch(stats).await,
        DispatchOutcome::Success {
            reply: Some("Known users: 1".to_string())
        }
    );

    let help = Update::new("3", "c1", "u1").with_text("/help");
    let bound = dispatcher.registry().commands();
    assert_eq!(bound, vec!["/help", "/start", "/stats"]);
    assert_eq!(
        dispatcher.dispatch(help).await,
        DispatchOutcome::Success {
            reply: Some(format!("Available commands: {}", bound.join(", ")))
        }
    );

    let chatter = Update::new("4", "c1", "u1").with_text("how are you?");
    assert_eq!(dispatcher.dispatch(chatter).await, DispatchOutcome::Unhandled);
}
