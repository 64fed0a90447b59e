//! # Dispatcher
//!
//! Routes each inbound [`dbot_core::Update`] to exactly one command handler inside one unit of
//! work, and keeps updates of the same chat strictly sequential.
//!
//! ## Modules
//!
//! - [`handler`] – CommandHandler trait
//! - [`registry`] – HandlerRegistry (command token → handler, immutable after init)
//! - [`dispatcher`] – Dispatcher and the dispatch cycle
//! - [`outcome`] – DispatchOutcome
//! - [`sequencer`] – ChatSequencer (per-chat FIFO workers) and ReplyPolicy

pub mod dispatcher;
mod error;
pub mod handler;
pub mod outcome;
pub mod registry;
pub mod sequencer;

pub use dispatcher::Dispatcher;
pub use error::{RegistryError, SubmitError};
pub use handler::CommandHandler;
pub use outcome::DispatchOutcome;
pub use registry::HandlerRegistry;
pub use sequencer::{ChatSequencer, ReplyPolicy};
