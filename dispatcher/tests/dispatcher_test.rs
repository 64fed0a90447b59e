//! Integration tests for [`dispatcher::Dispatcher`].
//!
//! Covers: the first-contact `/start` cycle, unhandled commands opening no unit of work,
//! rollback on handler failure, handlers closing their own unit of work, and pool exhaustion.

mod common;

use common::{
    small_pool, text_update, FailingHandler, GreetHandler, SelfCommittingHandler, TestDb,
};
use dispatcher::{DispatchOutcome, HandlerRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storage::PoolSettings;

fn greet_registry() -> HandlerRegistry {
    HandlerRegistry::new()
        .register("/start", Arc::new(GreetHandler))
        .expect("Failed to register /start")
}

/// **Test: Fresh database + `/start` from a new sender.**
///
/// **Setup:** Empty database, registry with `/start`.
/// **Action:** Dispatch `/start` from u1 in c1.
/// **Expected:** Success with a greeting; exactly one user row (u1).
#[tokio::test]
async fn test_start_creates_user_and_replies() {
    let db = TestDb::new(PoolSettings::default()).await;
    let dispatcher = db.dispatcher(greet_registry()).await;

    let update = text_update("1", "c1", "u1", "/start").with_sender_name("@ann");
    let outcome = dispatcher.dispatch(update).await;

    assert_eq!(
        outcome,
        DispatchOutcome::Success {
            reply: Some("Hello, @ann".to_string())
        }
    );
    assert_eq!(db.user_count().await, 1);

    let mut uow = db.gateway.acquire().await.unwrap();
    let user = uow.find_user("u1").await.unwrap().expect("u1 should exist");
    uow.rollback().await.unwrap();
    assert_eq!(user.display_name.as_deref(), Some("@ann"));
}

/// **Test: Command variants with a bot suffix and mixed case resolve to the same handler.**
#[tokio::test]
async fn test_command_token_is_normalized_before_lookup() {
    let db = TestDb::new(PoolSettings::default()).await;
    let dispatcher = db.dispatcher(greet_registry()).await;

    let outcome = dispatcher
        .dispatch(text_update("1", "c1", "u1", "/Start@HelloBot please"))
        .await;
    assert!(outcome.is_success());
}

/// **Test: Unknown commands and plain text are Unhandled and touch no data.**
///
/// **Setup:** Pool of one connection held by the test.
/// **Action:** Dispatch `/unknown` and plain text.
/// **Expected:** Both Unhandled (not Unavailable, so no acquire was attempted); no user rows.
#[tokio::test]
async fn test_unknown_command_is_unhandled_without_unit_of_work() {
    let db = TestDb::new(small_pool(1)).await;
    let dispatcher = db.dispatcher(greet_registry()).await;

    let mut held = db.gateway.acquire().await.unwrap();
    assert_eq!(
        dispatcher.dispatch(text_update("1", "c1", "u1", "/unknown")).await,
        DispatchOutcome::Unhandled
    );
    assert_eq!(
        dispatcher.dispatch(text_update("2", "c1", "u1", "hello")).await,
        DispatchOutcome::Unhandled
    );
    held.rollback().await.unwrap();
    drop(held);

    assert_eq!(db.user_count().await, 0);
}

/// **Test: A failing handler rolls back everything and returns its connection.**
///
/// **Setup:** Pool of one connection; handler writes a row, then errors.
/// **Action:** Dispatch, then dispatch `/start` on the same pool.
/// **Expected:** HandlerFailed; no rows from the failed cycle (sender nor side effect); the
/// follow-up cycle acquires the single connection and succeeds.
#[tokio::test]
async fn test_handler_failure_rolls_back_and_releases_connection() {
    let db = TestDb::new(small_pool(1)).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = greet_registry()
        .register(
            "/fail",
            Arc::new(FailingHandler {
                calls: calls.clone(),
            }),
        )
        .unwrap();
    let dispatcher = db.dispatcher(registry).await;

    let outcome = dispatcher.dispatch(text_update("1", "c1", "u1", "/fail")).await;
    match outcome {
        DispatchOutcome::HandlerFailed { cause } => assert!(cause.contains("boom"), "{cause}"),
        other => panic!("expected HandlerFailed, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(db.user_count().await, 0);

    let outcome = dispatcher.dispatch(text_update("2", "c1", "u2", "/start")).await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(db.user_count().await, 1);
}

/// **Test: A handler that commits its own unit of work fails the cycle.**
#[tokio::test]
async fn test_handler_closing_unit_of_work_is_a_failure() {
    let db = TestDb::new(PoolSettings::default()).await;
    let registry = HandlerRegistry::new()
        .register("/commit", Arc::new(SelfCommittingHandler))
        .unwrap();
    let dispatcher = db.dispatcher(registry).await;

    let outcome = dispatcher.dispatch(text_update("1", "c1", "u1", "/commit")).await;
    assert!(matches!(outcome, DispatchOutcome::HandlerFailed { .. }), "{outcome:?}");
}

/// **Test: Pool exhaustion yields Unavailable and the handler never runs.**
///
/// **Setup:** Pool of one connection, held by the test.
/// **Action:** Dispatch `/fail` (counts invocations).
/// **Expected:** Unavailable; invocation count 0.
#[tokio::test]
async fn test_pool_exhaustion_is_unavailable() {
    let db = TestDb::new(small_pool(1)).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = HandlerRegistry::new()
        .register(
            "/fail",
            Arc::new(FailingHandler {
                calls: calls.clone(),
            }),
        )
        .unwrap();
    let dispatcher = db.dispatcher(registry).await;

    let mut held = db.gateway.acquire().await.unwrap();
    let outcome = dispatcher.dispatch(text_update("1", "c1", "u1", "/fail")).await;
    held.rollback().await.unwrap();

    assert!(matches!(outcome, DispatchOutcome::Unavailable { .. }), "{outcome:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
