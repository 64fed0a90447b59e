//! # dbot-telegram
//!
//! Telegram transports for the dispatcher: a long-polling source, a webhook endpoint and source,
//! the [`dbot_core::Bot`] implementation for replies, and the run loop feeding the per-chat
//! sequencer. No persistence or command logic lives here.

mod adapters;
mod backoff;
mod bot_adapter;
mod config;
mod polling;
mod runner;
mod shutdown;
mod source;
mod webhook;

pub use adapters::{
    telegram_update_to_core, telegram_update_to_core_with_payload, TelegramMessageWrapper,
    TelegramUserWrapper,
};
pub use backoff::Backoff;
pub use bot_adapter::TelegramBotAdapter;
pub use config::{PollingConfig, WebhookConfig};
pub use polling::{PollingSource, RawUpdate, TeloxideProvider, UpdateProvider};
pub use runner::run_transport;
pub use shutdown::Shutdown;
pub use source::UpdateSource;
pub use webhook::{router, serve_webhook, webhook, WebhookSource, SECRET_TOKEN_HEADER};
