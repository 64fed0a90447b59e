//! Bot configuration, read from the environment once at startup and passed down by reference.
//!
//! Load `.env` (dotenvy) before calling [`BotConfig::load`].

use anyhow::{anyhow, bail, Result};
use dbot_telegram::{PollingConfig, WebhookConfig};
use dispatcher::ReplyPolicy;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use storage::PoolSettings;

/// How updates reach the bot. Read from `BOT_MODE`, overridable with `--mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportMode {
    Polling,
    Webhook,
}

impl FromStr for TransportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" => Ok(TransportMode::Polling),
            "webhook" => Ok(TransportMode::Webhook),
            other => Err(anyhow!("expected polling or webhook, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Required for `run`; `migrate` works without it.
    pub bot_token: Option<String>,
    pub database_url: String,
    pub log_file: String,
    /// Table prefix of this bot in a shared database.
    pub namespace: String,
    pub mode: TransportMode,
    pub db_pool_size: u32,
    pub db_pool_timeout: Duration,
    pub webhook_url: Option<String>,
    pub webhook_secret_token: Option<String>,
    pub webhook_path: String,
    pub webhook_host: String,
    pub webhook_port: u16,
    pub poll_timeout: Duration,
    pub poll_backoff_ceiling: Duration,
    pub shutdown_grace: Duration,
    /// Reply to messages no command handles; empty disables it.
    pub fallback_reply: Option<String>,
    pub failure_reply: Option<String>,
    /// Optional Bot API base URL (e.g. a local mock server).
    /// Env: `TELEGRAM_API_URL` or `TELOXIDE_API_URL`.
    pub telegram_api_url: Option<String>,
}

impl BotConfig {
    /// Reads the environment; `token` overrides `BOT_TOKEN`.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = token.or_else(|| env_opt("BOT_TOKEN"));
        let mode = env_parse("BOT_MODE", TransportMode::Polling)?;
        let policy = ReplyPolicy::default();

        Ok(Self {
            bot_token,
            database_url: env_or("DATABASE_URL", "sqlite://telegram_bot.db"),
            log_file: env_or("LOG_FILE", "logs/telegram-bot.log"),
            namespace: env_or("BOT_NAMESPACE", "bot"),
            mode,
            db_pool_size: env_parse("DB_POOL_SIZE", 5)?,
            db_pool_timeout: Duration::from_secs(env_parse("DB_POOL_TIMEOUT_SECS", 30)?),
            webhook_url: env_opt("WEBHOOK_URL"),
            webhook_secret_token: env_opt("WEBHOOK_SECRET_TOKEN"),
            webhook_path: env_or("WEBHOOK_PATH", "/webhook"),
            webhook_host: env_or("WEBHOOK_HOST", "0.0.0.0"),
            webhook_port: env_parse("WEBHOOK_PORT", 8000)?,
            poll_timeout: Duration::from_secs(env_parse("POLL_TIMEOUT_SECS", 10)?),
            poll_backoff_ceiling: Duration::from_secs(env_parse("POLL_BACKOFF_CEILING_SECS", 60)?),
            shutdown_grace: Duration::from_secs(env_parse("SHUTDOWN_GRACE_SECS", 10)?),
            fallback_reply: reply_setting("FALLBACK_REPLY", policy.fallback),
            failure_reply: reply_setting("FAILURE_REPLY", policy.failure),
            telegram_api_url: env_opt("TELEGRAM_API_URL").or_else(|| env_opt("TELOXIDE_API_URL")),
        })
    }

    pub fn with_mode(mut self, mode: Option<TransportMode>) -> Self {
        if let Some(mode) = mode {
            self.mode = mode;
        }
        self
    }

    /// Checks what `run` needs: a token, and a public URL in webhook mode.
    pub fn validate_for_run(&self) -> Result<()> {
        if self.bot_token.as_deref().map_or(true, str::is_empty) {
            bail!("BOT_TOKEN not set");
        }
        if self.mode == TransportMode::Webhook && self.webhook_url.is_none() {
            bail!("WEBHOOK_URL is required when BOT_MODE=webhook");
        }
        if self.db_pool_size == 0 {
            bail!("DB_POOL_SIZE must be at least 1");
        }
        Ok(())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_pool_size,
            acquire_timeout: self.db_pool_timeout,
            ..PoolSettings::default()
        }
    }

    pub fn polling_config(&self) -> PollingConfig {
        PollingConfig {
            poll_timeout: self.poll_timeout,
            backoff_ceiling: self.poll_backoff_ceiling,
            ..PollingConfig::default()
        }
    }

    pub fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            path: self.webhook_path.clone(),
            secret_token: self.webhook_secret_token.clone(),
        }
    }

    pub fn reply_policy(&self) -> ReplyPolicy {
        ReplyPolicy {
            fallback: self.fallback_reply.clone(),
            failure: self.failure_reply.clone(),
        }
    }

    pub fn webhook_bind_addr(&self) -> String {
        format!("{}:{}", self.webhook_host, self.webhook_port)
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}

/// Unset keeps the default; set-but-empty disables the reply.
fn reply_setting(key: &str, default: Option<String>) -> Option<String> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => None,
        Ok(value) => Some(value),
        Err(_) => default,
    }
}
