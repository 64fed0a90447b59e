use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two handlers bound to one command token. Fatal at startup.
    #[error("Command {0} is already registered")]
    DuplicateCommand(String),
    #[error("Invalid command token: {0:?}")]
    InvalidCommand(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Sequencer is shut down")]
    Closed,
}
