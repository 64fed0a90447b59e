//! Transport settings. Built by the binary from its environment config.

use std::time::Duration;

/// Long-polling settings.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Server-side wait passed to `getUpdates`; keep it below the HTTP client timeout.
    pub poll_timeout: Duration,
    /// Pause after an empty batch.
    pub idle_backoff: Duration,
    pub initial_backoff: Duration,
    pub backoff_ceiling: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(10),
            idle_backoff: Duration::from_millis(500),
            initial_backoff: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(60),
        }
    }
}

/// Webhook endpoint settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub path: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`; `None` accepts every request.
    pub secret_token: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: "/webhook".to_string(),
            secret_token: None,
        }
    }
}

impl WebhookConfig {
    /// Path with a leading `/`.
    pub fn route_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }
}
