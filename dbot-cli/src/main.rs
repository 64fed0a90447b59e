//! dbot: run the bot or reconcile its schema. Config from env (`.env` supported) and CLI args.

use anyhow::Result;
use clap::Parser;
use dbot_cli::{migrate, run_bot, BotConfig, Cli, Commands};
use dbot_core::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token, mode } => {
            let config = BotConfig::load(token)?.with_mode(mode);
            init_tracing(&config.log_file)?;
            run_bot(config).await
        }
        Commands::Migrate => {
            let config = BotConfig::load(None)?;
            init_tracing(&config.log_file)?;
            let report = migrate(&config).await?;
            info!(path = ?report.path, applied = ?report.applied, "Migration finished");
            println!(
                "schema ready: path={:?} applied={:?} head={}",
                report.path, report.applied, report.head_version
            );
            Ok(())
        }
    }
}
