//! fio-watch: Fio bank balance watcher
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores item states from disk, and runs the refresh service until
//! Ctrl+C.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use fio_watch::bank::fio::FioClient;
use fio_watch::config;
use fio_watch::engine::{activate, Activation, PollScheduler, RetryingPoller};
use fio_watch::items::ItemTable;
use fio_watch::storage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    info!(
        refresh_ms = cfg.fio.refresh,
        base_url = %cfg.fio.base_url,
        items = cfg.items.len(),
        "fio-watch starting up"
    );

    // -- Item table ------------------------------------------------------

    let state_file = cfg.storage.state_file.clone();
    let items = Arc::new(match &state_file {
        Some(path) => ItemTable::with_state_file(path.clone()),
        None => ItemTable::new(),
    });
    for binding in &cfg.items {
        items.bind(&binding.name, &binding.account_id);
    }

    if let Some(path) = state_file.as_deref() {
        match storage::load_states(Path::new(path)) {
            Ok(Some(states)) => items.restore(states),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable state file"),
        }
    }

    // -- Refresh service -------------------------------------------------

    let activation = activate(cfg.fio.resolve_token(), |token| {
        let client = FioClient::new(token, &cfg.fio.base_url)?;
        let poller = RetryingPoller::new(Arc::new(client))
            .with_retry_delay(cfg.fio.retry_backoff());
        Ok(Arc::new(
            PollScheduler::new(poller, items.clone(), items.clone())
                .with_refresh(cfg.fio.refresh_interval()),
        ))
    })?;

    if !activation.is_active() {
        warn!(
            token_env = %cfg.fio.token_env,
            "Set the token variable and restart to enable polling"
        );
    }

    info!("Running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received.");

    if let Activation::Active(handle) = activation {
        handle.stop().await;
    }

    if let Some(path) = state_file.as_deref() {
        storage::save_states(&items.snapshot(), Path::new(path))?;
    }
    info!("fio-watch shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fio_watch=info"));

    let json_logging = std::env::var("FIO_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
