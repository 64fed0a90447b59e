//! Core types: the normalized inbound update and the handler response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound event from the chat provider, normalized for dispatch.
///
/// Identifiers are opaque strings; the provider payload is kept verbatim in `raw_payload`.
/// Fields are read-only once built: construct with [`Update::new`] and the `with_*` builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    source_id: String,
    chat_id: String,
    sender_id: String,
    sender_name: Option<String>,
    command_token: Option<String>,
    text: Option<String>,
    raw_payload: serde_json::Value,
    received_at: DateTime<Utc>,
}

impl Update {
    pub fn new(
        source_id: impl Into<String>,
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            sender_name: None,
            command_token: None,
            text: None,
            raw_payload: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    /// Sets the message text and derives the command token from it.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.command_token = parse_command_token(&text);
        self.text = Some(text);
        self
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    pub fn with_payload(mut self, raw_payload: serde_json::Value) -> Self {
        self.raw_payload = raw_payload;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn sender_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    /// Normalized command (`/start`), if the text begins with one.
    pub fn command_token(&self) -> Option<&str> {
        self.command_token.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Text after the command token, trimmed. `None` when there is no text.
    pub fn arguments(&self) -> Option<&str> {
        let text = self.text.as_deref()?;
        if self.command_token.is_none() {
            return Some(text.trim());
        }
        Some(
            text.trim_start()
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or(""),
        )
    }

    pub fn raw_payload(&self) -> &serde_json::Value {
        &self.raw_payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Extracts the command token from message text.
///
/// The first word must start with `/`; an `@botname` suffix is dropped and the result is
/// lower-cased, so `"/Start@MyBot now"` yields `"/start"`.
pub fn parse_command_token(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let command = first.split('@').next().unwrap_or(first);
    if command.len() < 2 {
        return None;
    }
    Some(command.to_lowercase())
}

/// What a command handler produced. `Reply(text)` is sent back to the chat after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Nothing to send.
    Stop,
    /// Reply text for the originating chat.
    Reply(String),
}

impl HandlerResponse {
    pub fn into_reply(self) -> Option<String> {
        match self {
            HandlerResponse::Stop => None,
            HandlerResponse::Reply(text) => Some(text),
        }
    }
}
