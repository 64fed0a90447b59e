//! User row model.
//!
//! Maps to the `<ns>_users` table and is returned by [`UnitOfWork::ensure_user`](crate::UnitOfWork::ensure_user).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    /// External identity (the update's sender id); unique per namespace.
    pub identity_key: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// `NULL` for rows created before the activity migration.
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Best name to address the user by.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| format!("User{}", self.identity_key))
    }
}
