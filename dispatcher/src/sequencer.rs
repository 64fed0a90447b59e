//! Per-chat sequencing: one FIFO queue and at most one worker task per active chat.
//!
//! Updates of one chat are dispatched strictly in arrival order, each reaching commit or rollback
//! before the next begins. Different chats run in parallel. Queues live in a sharded `DashMap`
//! so submitters never contend on one global lock.

use crate::dispatcher::Dispatcher;
use crate::error::SubmitError;
use crate::outcome::DispatchOutcome;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dbot_core::{Bot, Update};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// What to send back for outcomes that carry no handler reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPolicy {
    /// Sent for [`DispatchOutcome::Unhandled`] text messages; `None` stays silent.
    pub fallback: Option<String>,
    /// Sent for [`DispatchOutcome::HandlerFailed`] and [`DispatchOutcome::Unavailable`].
    pub failure: Option<String>,
}

impl Default for ReplyPolicy {
    fn default() -> Self {
        Self {
            fallback: Some("Send /start to get a greeting!".to_string()),
            failure: Some("Something went wrong, please try again later.".to_string()),
        }
    }
}

impl ReplyPolicy {
    pub fn silent() -> Self {
        Self {
            fallback: None,
            failure: None,
        }
    }

    /// `has_text` gates the fallback: stickers, photos and service messages stay unanswered.
    pub fn reply_for(&self, outcome: &DispatchOutcome, has_text: bool) -> Option<String> {
        match outcome {
            DispatchOutcome::Success { reply } => reply.clone(),
            DispatchOutcome::Unhandled if has_text => self.fallback.clone(),
            DispatchOutcome::Unhandled => None,
            DispatchOutcome::HandlerFailed { .. } | DispatchOutcome::Unavailable { .. } => {
                self.failure.clone()
            }
        }
    }
}

#[derive(Clone)]
pub struct ChatSequencer {
    inner: Arc<Inner>,
}

struct Inner {
    dispatcher: Dispatcher,
    bot: Arc<dyn Bot>,
    policy: ReplyPolicy,
    queues: DashMap<String, mpsc::UnboundedSender<Update>>,
    tracker: TaskTracker,
    closed: AtomicBool,
    idle_timeout: Duration,
}

impl ChatSequencer {
    pub fn new(dispatcher: Dispatcher, bot: Arc<dyn Bot>, policy: ReplyPolicy) -> Self {
        Self::with_idle_timeout(dispatcher, bot, policy, DEFAULT_IDLE_TIMEOUT)
    }

    /// Workers with no queued update for `idle_timeout` retire.
    pub fn with_idle_timeout(
        dispatcher: Dispatcher,
        bot: Arc<dyn Bot>,
        policy: ReplyPolicy,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                dispatcher,
                bot,
                policy,
                queues: DashMap::new(),
                tracker: TaskTracker::new(),
                closed: AtomicBool::new(false),
                idle_timeout,
            }),
        }
    }

    /// Queues `update` behind earlier updates of its chat. Never blocks.
    ///
    /// The send happens while the chat's map entry is held, so a retiring worker cannot remove
    /// its queue between lookup and send.
    pub fn submit(&self, update: Update) -> Result<(), SubmitError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SubmitError::Closed);
        }
        let chat_id = update.chat_id().to_string();
        debug!(chat_id = %chat_id, source_id = %update.source_id(), "step: update queued");

        match self.inner.queues.entry(chat_id.clone()) {
            Entry::Occupied(mut entry) => {
                if let Err(mpsc::error::SendError(update)) = entry.get().send(update) {
                    // Worker died; start a fresh one for this chat.
                    warn!(chat_id = %chat_id, "Chat worker gone, respawning");
                    let tx = self.spawn_worker(chat_id);
                    tx.send(update).map_err(|_| SubmitError::Closed)?;
                    entry.insert(tx);
                }
            }
            Entry::Vacant(entry) => {
                let tx = self.spawn_worker(chat_id);
                tx.send(update).map_err(|_| SubmitError::Closed)?;
                entry.insert(tx);
            }
        }
        Ok(())
    }

    /// Chats that currently have a worker.
    pub fn active_chats(&self) -> usize {
        self.inner.queues.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Stops accepting updates and waits up to `grace` for queued and in-flight cycles to reach
    /// commit or rollback. Returns `true` when every worker finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.inner.closed.store(true, Ordering::SeqCst);
        // Dropping the senders lets each worker drain its queue and exit.
        self.inner.queues.clear();
        self.inner.tracker.close();

        let pending = self.inner.tracker.len();
        info!(pending_workers = pending, grace_ms = grace.as_millis() as u64, "step: sequencer draining");
        let drained = tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_ok();
        if drained {
            info!("step: sequencer drained");
        } else {
            warn!(
                remaining_workers = self.inner.tracker.len(),
                "Shutdown grace elapsed with dispatch cycles still running"
            );
        }
        drained
    }

    fn spawn_worker(&self, chat_id: String) -> mpsc::UnboundedSender<Update> {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(chat_id = %chat_id, "step: chat worker started");
        self.inner
            .tracker
            .spawn(run_worker(self.inner.clone(), chat_id, rx));
        tx
    }
}

async fn run_worker(inner: Arc<Inner>, chat_id: String, mut rx: mpsc::UnboundedReceiver<Update>) {
    loop {
        match tokio::time::timeout(inner.idle_timeout, rx.recv()).await {
            Ok(Some(update)) => inner.process(&chat_id, update).await,
            Ok(None) => break,
            Err(_) => {
                // Removal only when nothing is queued; submitters send under the same shard lock.
                if inner
                    .queues
                    .remove_if(&chat_id, |_, _| rx.is_empty())
                    .is_some()
                {
                    break;
                }
            }
        }
    }
    debug!(chat_id = %chat_id, "step: chat worker retired");
}

impl Inner {
    async fn process(&self, chat_id: &str, update: Update) {
        let source_id = update.source_id().to_string();
        let has_text = update.text().is_some();
        // A panicking handler fails its own cycle only; the open unit of work rolls back on drop
        // and the worker goes on with the rest of the chat's queue.
        let outcome = match AssertUnwindSafe(self.dispatcher.dispatch(update))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                let cause = format!("handler panicked: {}", panic_message(panic.as_ref()));
                error!(chat_id = %chat_id, source_id = %source_id, cause = %cause, "Dispatch cycle panicked");
                DispatchOutcome::HandlerFailed { cause }
            }
        };
        info!(
            chat_id = %chat_id,
            source_id = %source_id,
            outcome = outcome.kind(),
            "step: dispatch finished"
        );
        if let DispatchOutcome::HandlerFailed { cause } | DispatchOutcome::Unavailable { cause } = &outcome {
            debug!(chat_id = %chat_id, cause = %cause, "Dispatch did not succeed");
        }

        let Some(text) = self.policy.reply_for(&outcome, has_text) else {
            return;
        };
        if let Err(e) = self.bot.reply(chat_id, &text).await {
            error!(chat_id = %chat_id, source_id = %source_id, error = %e, "Failed to send reply");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
