//! Explicit command table: each command token binds to exactly one handler.

use crate::error::RegistryError;
use crate::handler::CommandHandler;
use dbot_core::parse_command_token;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    bindings: HashMap<String, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `token` (`"start"` or `"/start"`, any case) to `handler`.
    pub fn register(
        mut self,
        token: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<Self, RegistryError> {
        let token = normalize(token)?;
        if self.bindings.contains_key(&token) {
            return Err(RegistryError::DuplicateCommand(token));
        }
        self.bindings.insert(token, handler);
        Ok(self)
    }

    /// Handler bound to `token`, if any.
    pub fn resolve(&self, token: &str) -> Option<Arc<dyn CommandHandler>> {
        let token = normalize(token).ok()?;
        self.bindings.get(&token).cloned()
    }

    /// Bound tokens, sorted.
    pub fn commands(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.bindings.keys().cloned().collect();
        tokens.sort();
        tokens
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn normalize(token: &str) -> Result<String, RegistryError> {
    let trimmed = token.trim();
    let with_slash = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    match parse_command_token(&with_slash) {
        Some(normalized) if normalized == with_slash.to_lowercase() => Ok(normalized),
        _ => Err(RegistryError::InvalidCommand(token.to_string())),
    }
}
