//! Adapters from Telegram (teloxide) types to [`dbot_core::Update`].
//!
//! Only new messages carry something the dispatcher can route. Edits and every other update kind
//! convert to `None` and are skipped by the transports, so editing `/start` does not re-run it.

use dbot_core::Update;
use teloxide::types::{UpdateKind, User};

/// Wraps a teloxide User for identity and display-name extraction.
pub struct TelegramUserWrapper<'a>(pub &'a User);

impl<'a> TelegramUserWrapper<'a> {
    pub fn identity_key(&self) -> String {
        self.0.id.0.to_string()
    }

    /// `@username` when set, otherwise first and last name.
    pub fn display_name(&self) -> String {
        if let Some(username) = &self.0.username {
            return format!("@{username}");
        }
        match &self.0.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.0.first_name, last),
            _ => self.0.first_name.clone(),
        }
    }
}

/// Wraps a teloxide Message for conversion to a core [`Update`].
pub struct TelegramMessageWrapper<'a>(pub &'a teloxide::types::Message);

impl<'a> TelegramMessageWrapper<'a> {
    pub fn to_core(&self, source_id: String) -> Update {
        let chat_id = self.0.chat.id.0.to_string();
        // Channel posts have no sender; the chat stands in for it.
        let mut update = match self.0.from.as_ref() {
            Some(user) => {
                let user = TelegramUserWrapper(user);
                Update::new(source_id, chat_id, user.identity_key())
                    .with_sender_name(user.display_name())
            }
            None => Update::new(source_id, chat_id.clone(), chat_id),
        };
        if let Some(text) = self.0.text() {
            update = update.with_text(text);
        }
        update
    }
}

/// Converts a Telegram update; `None` for anything but new messages.
pub fn telegram_update_to_core(update: &teloxide::types::Update) -> Option<Update> {
    let payload = serde_json::to_value(update).unwrap_or(serde_json::Value::Null);
    telegram_update_to_core_with_payload(update, payload)
}

/// Same as [`telegram_update_to_core`], keeping `payload` (the JSON as received) verbatim.
pub fn telegram_update_to_core_with_payload(
    update: &teloxide::types::Update,
    payload: serde_json::Value,
) -> Option<Update> {
    let message = match &update.kind {
        UpdateKind::Message(message) => message,
        _ => return None,
    };
    let source_id = update.id.0.to_string();
    Some(
        TelegramMessageWrapper(message)
            .to_core(source_id)
            .with_payload(payload),
    )
}
