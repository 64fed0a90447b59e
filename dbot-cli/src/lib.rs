//! # dbot-cli
//!
//! The `dbot` binary's library half: argument parsing, environment config, the shipped command
//! handlers and the startup/shutdown wiring.

pub mod app;
pub mod cli;
pub mod config;
pub mod handlers;

pub use app::{build_registry, migrate, open_storage, run_bot};
pub use cli::{Cli, Commands};
pub use config::{BotConfig, TransportMode};
