//! Command handlers shipped with the binary.

use async_trait::async_trait;
use dbot_core::{HandlerResponse, Update};
use dispatcher::CommandHandler;
use storage::{UnitOfWork, UserRecord};
use tracing::info;

/// `/start`: greets the sender. The dispatcher has already created or refreshed their row.
pub struct StartHandler;

#[async_trait]
impl CommandHandler for StartHandler {
    async fn handle(
        &self,
        _update: &Update,
        user: &UserRecord,
        _uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        let name = user.label();
        info!(user_id = user.id, display_name = %name, command = "start", "Sent greeting to user");
        Ok(HandlerResponse::Reply(format!(
            "Hello! Welcome to the bot, {name}"
        )))
    }
}

/// `/help`: lists the bound commands.
pub struct HelpHandler {
    commands: Vec<String>,
}

impl HelpHandler {
    pub fn new(commands: Vec<String>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(
        &self,
        _update: &Update,
        _user: &UserRecord,
        _uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        Ok(HandlerResponse::Reply(format!(
            "Available commands: {}",
            self.commands.join(", ")
        )))
    }
}

/// `/stats`: number of known users.
pub struct StatsHandler;

#[async_trait]
impl CommandHandler for StatsHandler {
    async fn handle(
        &self,
        _update: &Update,
        _user: &UserRecord,
        uow: &mut UnitOfWork,
    ) -> dbot_core::Result<HandlerResponse> {
        let count = uow.count_users().await?;
        Ok(HandlerResponse::Reply(format!("Known users: {count}")))
    }
}
