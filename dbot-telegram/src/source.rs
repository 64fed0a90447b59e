use async_trait::async_trait;
use dbot_core::Update;

/// A lazy, unbounded stream of inbound updates.
#[async_trait]
pub trait UpdateSource: Send {
    /// Next update; `None` once the source is closed (shutdown or end of input).
    async fn next_update(&mut self) -> Option<Update>;
}
