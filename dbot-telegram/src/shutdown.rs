//! One shutdown signal with one grace budget, shared by every stage that drains.
//!
//! The webhook source, the webhook server, the sequencer and the pool close all wait against
//! the same [`Shutdown::deadline`], so stopping takes at most one grace period in total.

use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
    grace: Duration,
    deadline: Arc<OnceLock<Instant>>,
}

impl Shutdown {
    pub fn new(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace,
            deadline: Arc::new(OnceLock::new()),
        }
    }

    /// Token cancelled by [`Shutdown::trigger`]; handed to sources that only need the signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Starts the grace period and signals every stage.
    pub fn trigger(&self) {
        self.deadline();
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await;
    }

    /// When the grace budget runs out. Fixed by [`Shutdown::trigger`], or on first read when a
    /// transport closed on its own.
    pub fn deadline(&self) -> Instant {
        *self.deadline.get_or_init(|| Instant::now() + self.grace)
    }

    /// Grace left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_is_fixed_at_trigger() {
        let shutdown = Shutdown::new(Duration::from_secs(10));
        let stage = shutdown.clone();
        assert!(!stage.is_triggered());

        shutdown.trigger();
        let deadline = shutdown.deadline();
        assert!(stage.is_triggered());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stage.deadline(), deadline);
        let remaining = stage.remaining();
        assert!(remaining <= Duration::from_millis(9_950), "{remaining:?}");
        assert!(remaining > Duration::from_secs(9), "{remaining:?}");
    }

    #[tokio::test]
    async fn test_remaining_is_zero_after_deadline() {
        let shutdown = Shutdown::new(Duration::from_millis(10));
        shutdown.trigger();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(shutdown.remaining(), Duration::ZERO);
    }
}
