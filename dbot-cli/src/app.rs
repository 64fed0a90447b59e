//! Wiring: storage → reconcile → registry → dispatcher → sequencer → transport, plus shutdown.

use crate::config::{BotConfig, TransportMode};
use crate::handlers::{HelpHandler, StartHandler, StatsHandler};
use anyhow::{Context, Result};
use dbot_telegram::{
    run_transport, serve_webhook, webhook, PollingSource, Shutdown, TeloxideProvider,
    TelegramBotAdapter,
};
use dispatcher::{ChatSequencer, Dispatcher, HandlerRegistry, RegistryError};
use std::sync::Arc;
use storage::{PersistenceGateway, ReconcileReport, Reconciler, TableNamespace};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, instrument, warn};

/// The command table. A duplicate binding is a startup error.
///
/// `/help` is bound last and lists whatever the registry holds at that point, itself included.
pub fn build_registry() -> Result<HandlerRegistry, RegistryError> {
    let registry = HandlerRegistry::new()
        .register("/start", Arc::new(StartHandler))?
        .register("/stats", Arc::new(StatsHandler))?;
    let mut commands = registry.commands();
    commands.push("/help".to_string());
    commands.sort();
    registry.register("/help", Arc::new(HelpHandler::new(commands)))
}

pub async fn open_storage(config: &BotConfig) -> Result<PersistenceGateway> {
    let namespace = TableNamespace::new(&config.namespace).context("Invalid BOT_NAMESPACE")?;
    PersistenceGateway::connect(&config.database_url, &config.pool_settings(), namespace)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))
}

/// `dbot migrate`: reconcile the schema and report what was done.
pub async fn migrate(config: &BotConfig) -> Result<ReconcileReport> {
    let gateway = open_storage(config).await?;
    let (_, report) = Reconciler::new(&gateway)
        .run()
        .await
        .context("Schema reconciliation failed")?;
    gateway.close().await;
    Ok(report)
}

pub fn build_teloxide_bot(config: &BotConfig) -> Result<teloxide::Bot> {
    let token = config.bot_token.clone().context("BOT_TOKEN not set")?;
    let mut bot = teloxide::Bot::new(token);
    if let Some(url) = &config.telegram_api_url {
        let url = reqwest::Url::parse(url).with_context(|| format!("Invalid TELEGRAM_API_URL {url}"))?;
        info!(api_url = %url, "Using custom Telegram API URL");
        bot = bot.set_api_url(url);
    }
    Ok(bot)
}

/// `dbot run`: startup aborts on reconcile failure or a duplicate command binding; afterwards
/// the bot runs until SIGINT/SIGTERM, then drains in-flight dispatch cycles. Webhook drain,
/// sequencer drain and pool close share one `SHUTDOWN_GRACE_SECS` deadline.
#[instrument(skip(config), fields(mode = ?config.mode, namespace = %config.namespace))]
pub async fn run_bot(config: BotConfig) -> Result<()> {
    config.validate_for_run()?;

    let gateway = open_storage(&config).await?;
    let (ready, report) = Reconciler::new(&gateway)
        .run()
        .await
        .context("Schema reconciliation failed")?;
    info!(path = ?report.path, applied = ?report.applied, "step: schema ready");

    let registry = build_registry().context("Failed to build command registry")?;
    let dispatcher = Dispatcher::new(registry, gateway.clone(), ready);

    let bot = build_teloxide_bot(&config)?;
    let adapter = Arc::new(TelegramBotAdapter::new(bot.clone()));
    let sequencer = ChatSequencer::new(dispatcher, adapter.clone(), config.reply_policy());

    let shutdown = Shutdown::new(config.shutdown_grace);
    let signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal.trigger();
    });

    let drained = match config.mode {
        TransportMode::Polling => {
            if let Err(e) = adapter.clear_webhook().await {
                warn!(error = %e, "Failed to clear webhook before polling");
            }
            info!("Starting in polling mode");
            let source = PollingSource::new(
                TeloxideProvider::new(bot),
                config.polling_config(),
                shutdown.token(),
            );
            run_transport(source, sequencer, &shutdown).await
        }
        TransportMode::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .context("WEBHOOK_URL is required when BOT_MODE=webhook")?;
            adapter
                .register_webhook(url, config.webhook_secret_token.as_deref())
                .await?;
            info!(url = %url, "Starting in webhook mode");

            let (router, source) = webhook(&config.webhook_config(), shutdown.clone());
            let addr = config.webhook_bind_addr();
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind webhook server on {addr}"))?;
            let server = tokio::spawn(serve_webhook(listener, router, shutdown.clone()));

            let drained = run_transport(source, sequencer, &shutdown).await;
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Webhook server failed"),
                Err(e) => error!(error = %e, "Webhook server task panicked"),
            }
            drained
        }
    };

    if tokio::time::timeout_at(shutdown.deadline(), gateway.close())
        .await
        .is_err()
    {
        warn!("Database pool did not close before the shutdown deadline");
    }
    info!(drained, "Bot stopped");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
