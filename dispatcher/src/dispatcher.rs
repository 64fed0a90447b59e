//! The dispatch cycle: resolve → acquire → upsert sender → handle → commit or roll back.
//!
//! Each cycle consumes exactly one unit of work, and only after a handler was resolved.

use crate::handler::CommandHandler;
use crate::outcome::DispatchOutcome;
use crate::registry::HandlerRegistry;
use dbot_core::Update;
use std::sync::Arc;
use storage::{PersistenceGateway, SchemaReady, StorageError, UnitOfWork};
use tracing::{error, info, instrument, warn};

/// Cheap to clone; the registry is shared read-only.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    gateway: PersistenceGateway,
}

impl Dispatcher {
    /// `SchemaReady` can only come from a successful reconcile, so no update is dispatched
    /// against an unreconciled schema.
    pub fn new(registry: HandlerRegistry, gateway: PersistenceGateway, _ready: SchemaReady) -> Self {
        info!(commands = ?registry.commands(), "Dispatcher ready");
        Self {
            registry: Arc::new(registry),
            gateway,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    #[instrument(skip(self, update), fields(chat_id = %update.chat_id(), source_id = %update.source_id()))]
    pub async fn dispatch(&self, update: Update) -> DispatchOutcome {
        let Some(command) = update.command_token() else {
            info!(sender_id = %update.sender_id(), "step: no command token, unhandled");
            return DispatchOutcome::Unhandled;
        };
        let Some(handler): Option<Arc<dyn CommandHandler>> = self.registry.resolve(command) else {
            info!(sender_id = %update.sender_id(), command = %command, "step: no handler bound, unhandled");
            return DispatchOutcome::Unhandled;
        };

        let mut uow = match self.gateway.acquire().await {
            Ok(uow) => uow,
            Err(e) => {
                warn!(command = %command, error = %e, "step: persistence unavailable, handler skipped");
                return DispatchOutcome::Unavailable {
                    cause: e.to_string(),
                };
            }
        };

        let user = match uow
            .ensure_user(update.sender_id(), update.sender_name())
            .await
        {
            Ok(user) => user,
            Err(e) => {
                error!(sender_id = %update.sender_id(), error = %e, "step: user upsert failed");
                rollback(&mut uow).await;
                return DispatchOutcome::Unavailable {
                    cause: e.to_string(),
                };
            }
        };

        info!(
            sender_id = %update.sender_id(),
            user_id = user.id,
            command = %command,
            "step: handler processing"
        );
        let response = handler.handle(&update, &user, &mut uow).await;

        match response {
            Ok(response) => match uow.commit().await {
                Ok(()) => {
                    let reply = response.into_reply();
                    info!(
                        user_id = user.id,
                        command = %command,
                        reply_len = ?reply.as_ref().map(String::len),
                        "step: dispatch committed"
                    );
                    DispatchOutcome::Success { reply }
                }
                Err(StorageError::UnitOfWorkAlreadyClosed) => {
                    error!(command = %command, "step: handler closed its unit of work");
                    DispatchOutcome::HandlerFailed {
                        cause: StorageError::UnitOfWorkAlreadyClosed.to_string(),
                    }
                }
                Err(e) => {
                    error!(command = %command, error = %e, "step: commit failed");
                    DispatchOutcome::Unavailable {
                        cause: e.to_string(),
                    }
                }
            },
            Err(e) => {
                warn!(user_id = user.id, command = %command, error = %e, "step: handler failed, rolling back");
                rollback(&mut uow).await;
                DispatchOutcome::HandlerFailed {
                    cause: e.to_string(),
                }
            }
        }
    }
}

async fn rollback(uow: &mut UnitOfWork) {
    match uow.rollback().await {
        Ok(()) | Err(StorageError::UnitOfWorkAlreadyClosed) => {}
        Err(e) => error!(error = %e, "Rollback failed"),
    }
}
