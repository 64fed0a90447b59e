//! Per-bot table prefix.
//!
//! Several bots may share one database file; each owns only the tables under its prefix.
//! The prefix is formatted into SQL, so it is validated once here.

use crate::error::StorageError;
use std::fmt;

const MAX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNamespace(String);

impl TableNamespace {
    /// Accepts `[a-z][a-z0-9_]*`, at most 32 characters.
    pub fn new(prefix: impl Into<String>) -> Result<Self, StorageError> {
        let prefix = prefix.into();
        let mut chars = prefix.chars();
        let valid_head = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid_head || !valid_tail || prefix.len() > MAX_LEN {
            return Err(StorageError::InvalidNamespace(prefix));
        }
        Ok(Self(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified name of a managed table, e.g. `users` → `mybot_users`.
    pub fn table(&self, suffix: &str) -> String {
        format!("{}_{}", self.0, suffix)
    }

    pub fn users_table(&self) -> String {
        self.table("users")
    }

    pub fn migrations_table(&self) -> String {
        self.table("schema_migrations")
    }

    /// Replaces `{ns}` placeholders in a SQL template.
    pub fn render(&self, template: &str) -> String {
        template.replace("{ns}", &self.0)
    }
}

impl fmt::Display for TableNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
