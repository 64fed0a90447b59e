//! Command handler trait.

use async_trait::async_trait;
use dbot_core::{HandlerResponse, Result, Update};
use storage::{UnitOfWork, UserRecord};

/// Business logic for one command.
///
/// The dispatcher owns the unit of work: it has already upserted `user` and will commit when the
/// handler returns `Ok`, or roll back on `Err`. Handlers must not call `commit`/`rollback`
/// themselves; a unit of work closed early turns the cycle into a failure.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        update: &Update,
        user: &UserRecord,
        uow: &mut UnitOfWork,
    ) -> Result<HandlerResponse>;
}
