//! CLI parser.

use crate::config::TransportMode;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dbot")]
#[command(about = "Telegram bot: dispatch updates to command handlers over a shared database", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (config from env; token overrides BOT_TOKEN, mode overrides BOT_MODE).
    Run {
        #[arg(short, long)]
        token: Option<String>,
        #[arg(short, long, value_enum)]
        mode: Option<TransportMode>,
    },
    /// Reconcile the database schema and exit.
    Migrate,
}
