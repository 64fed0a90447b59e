//! # dbot-core
//!
//! Core types and traits for the bot scaffold: the normalized inbound [`Update`], the
//! [`HandlerResponse`] a command handler returns, the transport-agnostic [`Bot`] reply trait,
//! error types and tracing initialization. Used by storage, dispatcher and dbot-telegram.

pub mod bot;
pub mod error;
pub mod logger;
pub mod types;

pub use bot::Bot;
pub use error::{DbotError, HandlerError, Result};
pub use logger::init_tracing;
pub use types::{parse_command_token, HandlerResponse, Update};
