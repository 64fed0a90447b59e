//! Wraps teloxide::Bot and implements [`dbot_core::Bot`]. Production code replies via Telegram;
//! tests substitute a recording Bot.

use async_trait::async_trait;
use dbot_core::{Bot as CoreBot, DbotError, Result};
use teloxide::{prelude::*, types::ChatId};
use tracing::info;

pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

impl TelegramBotAdapter {
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }

    /// Returns the underlying teloxide::Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }

    /// Points Telegram at `url`; Telegram then sends `secret_token` in every webhook request.
    pub async fn register_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| DbotError::Config(format!("Invalid WEBHOOK_URL {url}: {e}")))?;
        let mut request = self.bot.set_webhook(url.clone());
        if let Some(secret) = secret_token {
            request = request.secret_token(secret.to_string());
        }
        request.await.map_err(|e| DbotError::Bot(e.to_string()))?;
        info!(url = %url, "Webhook registered");
        Ok(())
    }

    /// Removes any webhook so `getUpdates` can be used.
    pub async fn clear_webhook(&self) -> Result<()> {
        self.bot
            .delete_webhook()
            .await
            .map_err(|e| DbotError::Bot(e.to_string()))?;
        info!("Webhook cleared");
        Ok(())
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn reply(&self, chat_id: &str, text: &str) -> Result<()> {
        let id: i64 = chat_id
            .parse()
            .map_err(|_| DbotError::Bot(format!("Invalid Telegram chat id: {chat_id}")))?;
        self.bot
            .send_message(ChatId(id), text.to_string())
            .await
            .map_err(|e| DbotError::Bot(e.to_string()))?;
        Ok(())
    }
}
