//! Reply abstraction.
//!
//! [`Bot`] is transport-agnostic; dbot-telegram implements it via teloxide, tests use recording fakes.

use crate::error::Result;
use async_trait::async_trait;

/// Sends replies back to a conversation. Implementations map to a transport (e.g. Telegram).
#[async_trait]
pub trait Bot: Send + Sync {
    /// Sends `text` to the conversation identified by `chat_id`.
    async fn reply(&self, chat_id: &str, text: &str) -> Result<()>;
}
