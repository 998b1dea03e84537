pub mod config;
pub mod error;
pub mod notify;
pub mod pool;
pub mod subscribers;
pub mod telegram;
pub mod watchers;

use clap::Parser;
use config::{Cli, Config};
use error::AppError;
use notify::Notifier;
use pool::{BlockSource, HttpBlockSource};
use std::sync::Arc;
use std::time::Duration;
use subscribers::SubscriberStore;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use watchers::{BlockWatcher, SubscriptionWatcher};

const UPDATES_POLL_TIMEOUT: Duration = Duration::from_secs(60);

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load config, start both watchers and run until Ctrl-C.
pub async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let (config, config_path) = Config::load(cli.config.as_deref())?;

    init_tracing(config.debug);
    tracing::info!("Loaded config from {}", config_path.display());
    tracing::debug!("{config:?}");

    let store = Arc::new(SubscriberStore::open(&config.subscribers_file).await?);

    let client = Arc::new(TelegramClient::new(
        config.api_key.clone(),
        config.request_timeout,
    )?);
    let me = client.get_me().await?;
    tracing::info!(
        "Authorized on account {}",
        me.username.as_deref().unwrap_or(&me.first_name)
    );

    let source = HttpBlockSource::new(config.blocks_url.clone(), config.request_timeout)?;
    tracing::info!("Watching {}", source.url());
    let source: Arc<dyn BlockSource> = Arc::new(source);

    let notifier = Notifier::new(client.clone(), config.fanout_concurrency);
    let block_watcher = BlockWatcher::new(
        source,
        Arc::clone(&store),
        notifier,
        config.notify_interval,
    );
    let subscription_watcher =
        SubscriptionWatcher::new(client, Arc::clone(&store), UPDATES_POLL_TIMEOUT);

    let cancel = CancellationToken::new();
    let blocks = tokio::spawn(block_watcher.run(cancel.clone()));
    let inbound = tokio::spawn(subscription_watcher.run(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully...");
    cancel.cancel();

    blocks
        .await
        .map_err(|e| AppError::Internal(format!("Block watcher task failed: {e}")))?;
    inbound
        .await
        .map_err(|e| AppError::Internal(format!("Subscription watcher task failed: {e}")))?;

    Ok(())
}
