//! Schema migrations for the namespace's managed tables, and the startup reconciler.
//!
//! Versions are strictly increasing integers starting at 1. Every step is safe to re-run, so an
//! interrupted startup can always reconcile again.

mod reconciler;

pub use reconciler::{
    classify, validate_history, MigrationState, ReconcilePath, ReconcileReport, Reconciler,
    SchemaReady,
};

/// One idempotent schema change. SQL templates use `{ns}` for the table prefix.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Sql(&'static str),
    /// `ALTER TABLE ADD COLUMN`, skipped when the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub steps: &'static [Step],
}

/// A managed table and the columns it has at head.
#[derive(Debug, Clone, Copy)]
pub struct ManagedTable {
    pub suffix: &'static str,
    pub head_columns: &'static [&'static str],
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        steps: &[Step::Sql(
            "CREATE TABLE IF NOT EXISTS {ns}_users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity_key TEXT NOT NULL UNIQUE,
                display_name TEXT,
                created_at TEXT NOT NULL
            )",
        )],
    },
    Migration {
        version: 2,
        name: "user_activity",
        steps: &[
            Step::AddColumn {
                table: "users",
                column: "is_active",
                definition: "INTEGER NOT NULL DEFAULT 1",
            },
            Step::AddColumn {
                table: "users",
                column: "updated_at",
                definition: "TEXT",
            },
            Step::Sql(
                "CREATE INDEX IF NOT EXISTS {ns}_users_active_created ON {ns}_users (is_active, created_at)",
            ),
        ],
    },
];

pub static MANAGED_TABLES: &[ManagedTable] = &[ManagedTable {
    suffix: "users",
    head_columns: &[
        "id",
        "identity_key",
        "display_name",
        "created_at",
        "is_active",
        "updated_at",
    ],
}];

/// Highest version in `catalogue`, 0 when empty.
pub fn head_version(catalogue: &[Migration]) -> i64 {
    catalogue.last().map(|m| m.version).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_versions_are_contiguous_from_one() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as i64 + 1, "{}", migration.name);
        }
        assert_eq!(head_version(MIGRATIONS), MIGRATIONS.len() as i64);
        assert_eq!(head_version(&[]), 0);
    }
}
