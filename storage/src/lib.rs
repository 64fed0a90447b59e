//! Storage crate: persistence gateway, unit of work and schema reconciliation.
//!
//! ## Modules
//!
//! - [`error`] – StorageError, MigrationError
//! - [`gateway`] – PersistenceGateway (bounded pool, `acquire`)
//! - [`unit_of_work`] – UnitOfWork (single commit/rollback)
//! - [`migrations`] – migration catalogue and Reconciler
//! - [`namespace`] – per-bot table prefix
//! - [`models`] – UserRecord

mod error;
mod gateway;
pub mod migrations;
mod models;
mod namespace;
mod sqlite_pool;
mod unit_of_work;
mod user_repo;

pub use error::{MigrationError, StorageError};
pub use gateway::PersistenceGateway;
pub use migrations::{MigrationState, ReconcilePath, ReconcileReport, Reconciler, SchemaReady};
pub use models::UserRecord;
pub use namespace::TableNamespace;
pub use sqlite_pool::{open_pool, PoolSettings};
pub use unit_of_work::UnitOfWork;
