//! Long-polling transport.
//!
//! One cooperative task fetches batches with `offset = last handed-out id + 1` and fetches again
//! only after the previous batch was handed out. Transient fetch errors are retried with
//! exponential backoff and never escalate.

use crate::adapters::telegram_update_to_core;
use crate::backoff::Backoff;
use crate::config::PollingConfig;
use crate::source::UpdateSource;
use async_trait::async_trait;
use dbot_core::Update;
use std::collections::VecDeque;
use std::time::Duration;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::requests::Requester;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One fetched provider update. `update` is `None` for kinds the core does not route; the
/// cursor still moves past them.
#[derive(Debug, Clone)]
pub struct RawUpdate {
    pub update_id: i64,
    pub update: Option<Update>,
}

/// Fetches update batches from the provider.
#[async_trait]
pub trait UpdateProvider: Send {
    async fn fetch(&mut self, offset: i64, timeout: Duration) -> anyhow::Result<Vec<RawUpdate>>;
}

/// `getUpdates` through teloxide.
pub struct TeloxideProvider {
    bot: teloxide::Bot,
}

impl TeloxideProvider {
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl UpdateProvider for TeloxideProvider {
    async fn fetch(&mut self, offset: i64, timeout: Duration) -> anyhow::Result<Vec<RawUpdate>> {
        let offset = i32::try_from(offset)?;
        let timeout = u32::try_from(timeout.as_secs())?;
        let updates = self.bot.get_updates().offset(offset).timeout(timeout).await?;
        Ok(updates
            .iter()
            .map(|update| RawUpdate {
                update_id: i64::from(update.id.0),
                update: telegram_update_to_core(update),
            })
            .collect())
    }
}

pub struct PollingSource<P> {
    provider: P,
    config: PollingConfig,
    offset: i64,
    pending: VecDeque<RawUpdate>,
    backoff: Backoff,
    shutdown: CancellationToken,
}

impl<P: UpdateProvider> PollingSource<P> {
    pub fn new(provider: P, config: PollingConfig, shutdown: CancellationToken) -> Self {
        let backoff = Backoff::new(config.initial_backoff, config.backoff_ceiling);
        Self {
            provider,
            config,
            offset: 0,
            pending: VecDeque::new(),
            backoff,
            shutdown,
        }
    }

    /// Offset the next fetch will use.
    pub fn offset(&self) -> i64 {
        self.offset
    }
}

/// Sleeps unless shutdown fires first; returns `false` on shutdown.
async fn pause(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[async_trait]
impl<P: UpdateProvider> UpdateSource for PollingSource<P> {
    async fn next_update(&mut self) -> Option<Update> {
        loop {
            if self.shutdown.is_cancelled() {
                info!(offset = self.offset, "step: polling stopped");
                return None;
            }

            while let Some(raw) = self.pending.pop_front() {
                self.offset = self.offset.max(raw.update_id + 1);
                match raw.update {
                    Some(update) => return Some(update),
                    None => debug!(update_id = raw.update_id, "Skipping non-message update"),
                }
            }

            let fetched = tokio::select! {
                _ = self.shutdown.cancelled() => continue,
                result = self.provider.fetch(self.offset, self.config.poll_timeout) => result,
            };

            match fetched {
                Ok(batch) if batch.is_empty() => {
                    self.backoff.reset();
                    if !pause(&self.shutdown, self.config.idle_backoff).await {
                        continue;
                    }
                }
                Ok(batch) => {
                    self.backoff.reset();
                    debug!(count = batch.len(), offset = self.offset, "step: polled batch");
                    self.pending.extend(batch);
                }
                Err(e) => {
                    let delay = self.backoff.next_delay();
                    warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Polling failed, backing off");
                    if !pause(&self.shutdown, delay).await {
                        continue;
                    }
                }
            }
        }
    }
}
