//! Errors crossing crate boundaries: handlers return [`DbotError`], storage converts into it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbotError {
    /// Persistence failure, already rendered by the storage crate.
    #[error("Database error: {0}")]
    Database(String),

    /// Outbound reply could not be delivered.
    #[error("Bot error: {0}")]
    Bot(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures a command handler reports about its own input or state.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("State error: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, DbotError>;
