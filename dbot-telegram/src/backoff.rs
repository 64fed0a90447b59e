use std::time::Duration;

/// Exponential backoff: `initial`, doubling each failure, capped at `ceiling`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    ceiling: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, ceiling: Duration) -> Self {
        Self {
            initial,
            ceiling,
            current: None,
        }
    }

    /// Delay before the next retry.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.initial.min(self.ceiling),
            Some(current) => current.saturating_mul(2).min(self.ceiling),
        };
        self.current = Some(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
