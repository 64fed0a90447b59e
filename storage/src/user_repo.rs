//! User persistence inside a unit of work.
//!
//! External: SQLite via sqlx; the dispatcher calls `ensure_user` once per dispatch cycle.

use crate::error::StorageError;
use crate::models::UserRecord;
use crate::unit_of_work::UnitOfWork;
use chrono::Utc;
use tracing::info;

const USER_COLUMNS: &str = "id, identity_key, display_name, is_active, created_at, updated_at";

impl UnitOfWork {
    /// Returns the user row for `identity_key`, creating it when absent.
    ///
    /// Insert-on-conflict-do-nothing followed by a read: concurrent first contacts from the same
    /// identity all resolve to the one row. When a later update carries a different display
    /// name the stored one is refreshed.
    pub async fn ensure_user(
        &mut self,
        identity_key: &str,
        display_name: Option<&str>,
    ) -> Result<UserRecord, StorageError> {
        let table = self.users_table();
        let now = Utc::now();
        let conn = self.connection()?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO {table} (identity_key, display_name, is_active, created_at, updated_at) \
             VALUES (?, ?, 1, ?, ?) ON CONFLICT(identity_key) DO NOTHING"
        ))
        .bind(identity_key)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let mut user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM {table} WHERE identity_key = ?"
        ))
        .bind(identity_key)
        .fetch_one(&mut *conn)
        .await?;

        if inserted > 0 {
            info!(identity_key = %identity_key, user_id = user.id, "Created new user");
            return Ok(user);
        }

        if let Some(name) = display_name {
            if user.display_name.as_deref() != Some(name) {
                sqlx::query(&format!(
                    "UPDATE {table} SET display_name = ?, updated_at = ? WHERE id = ?"
                ))
                .bind(name)
                .bind(now)
                .bind(user.id)
                .execute(&mut *conn)
                .await?;
                info!(identity_key = %identity_key, user_id = user.id, "Updated user info");
                user.display_name = Some(name.to_string());
                user.updated_at = Some(now);
            }
        }

        Ok(user)
    }

    pub async fn find_user(&mut self, identity_key: &str) -> Result<Option<UserRecord>, StorageError> {
        let table = self.users_table();
        let conn = self.connection()?;
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM {table} WHERE identity_key = ?"
        ))
        .bind(identity_key)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    pub async fn count_users(&mut self) -> Result<i64, StorageError> {
        let table = self.users_table();
        let conn = self.connection()?;
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}
