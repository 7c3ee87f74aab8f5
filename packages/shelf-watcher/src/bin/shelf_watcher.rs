// Main entry point for the shelf watcher

use anyhow::{Context, Result};
use shelf_watcher::{Config, CwaAcquisition, HttpFeedSource, SqliteDedupStore, TracingLogger, Watcher};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shelf_watcher=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Goodreads shelf watcher");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        feed_configured = config.feed_url.is_some(),
        cwa_url = %config.cwa_url,
        db_path = %config.db_path.display(),
        "Configuration loaded"
    );

    let store = SqliteDedupStore::open(&config.db_path)
        .await
        .with_context(|| format!("Failed to prepare {}", config.db_path.display()))?;

    let feed = config
        .feed_url
        .as_deref()
        .map(HttpFeedSource::new)
        .transpose()
        .context("Failed to build feed client")?;

    let acquisition = CwaAcquisition::new(config.cwa_url.clone(), config.credentials.clone());

    let watcher = Watcher::new(config, feed, store, acquisition, Arc::new(TracingLogger));
    watcher
        .run()
        .await
        .context("Failed to initialize dedup store")?;

    Ok(())
}
