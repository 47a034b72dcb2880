//! Hookline webhook delivery service.
//!
//! Composition root: builds the delivery stores, dispatcher, retry
//! scheduler, and inbound receiver, then coordinates graceful startup and
//! shutdown. All process-wide services are explicit instances constructed
//! here and injected downward; nothing is a module-level singleton.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use hookline_api::{AppState, ReceiverConfig};
use hookline_core::RealClock;
use hookline_delivery::{
    Dispatcher, DispatcherConfig, InMemoryDeliveryLogStore, InMemorySettingsStore,
    RetryScheduler, SchedulerConfig,
};
use hookline_signing::generate_secret;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("starting hookline webhook delivery service");

    let config = Config::from_env()?;
    info!(
        server_addr = %config.server_addr,
        sweep_interval_secs = config.sweep_interval_secs,
        max_concurrent_retries = config.max_concurrent_retries,
        "configuration loaded"
    );

    let clock = Arc::new(RealClock::new());
    let settings_store = Arc::new(InMemorySettingsStore::new());
    let delivery_log = Arc::new(InMemoryDeliveryLogStore::new());

    let dispatcher = Arc::new(
        Dispatcher::new(
            settings_store,
            delivery_log.clone(),
            DispatcherConfig::default(),
            clock.clone(),
        )
        .context("failed to build dispatcher")?,
    );

    let scheduler_config = SchedulerConfig {
        sweep_interval: std::time::Duration::from_secs(config.sweep_interval_secs),
        max_concurrent: config.max_concurrent_retries,
        ..Default::default()
    };
    let mut scheduler = RetryScheduler::new(dispatcher, delivery_log, scheduler_config, clock);
    scheduler.start();
    info!("retry scheduler started");

    let state = Arc::new(AppState::new(ReceiverConfig {
        api_key: config.partner_api_key,
        shared_secret: config.partner_shared_secret,
    }));

    // The server installs its own signal handler and returns once the
    // graceful shutdown completes; the scheduler is stopped after it.
    if let Err(e) = hookline_api::start_server(state, config.server_addr).await {
        error!(error = %e, "server failed");
    }

    scheduler.shutdown().await.context("scheduler shutdown failed")?;
    info!("hookline shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,hookline=debug,tower_http=debug"))
        .expect("invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Service configuration.
struct Config {
    /// Server bind address.
    server_addr: SocketAddr,
    /// API key the automation partner presents on inbound webhooks.
    partner_api_key: String,
    /// Shared secret for inbound signature verification.
    partner_shared_secret: String,
    /// Retry sweep interval in seconds.
    sweep_interval_secs: u64,
    /// Concurrent retry deliveries per sweep.
    max_concurrent_retries: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Missing partner credentials are generated fresh for the process
    /// lifetime, which keeps local development working; production
    /// deployments set them explicitly so the partner can authenticate.
    fn from_env() -> Result<Self> {
        let server_addr = std::env::var("HOOKLINE_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .context("invalid HOOKLINE_ADDR format")?;

        let partner_api_key = match std::env::var("HOOKLINE_PARTNER_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                info!("HOOKLINE_PARTNER_API_KEY not set, generating ephemeral key");
                generate_secret()
            },
        };

        let partner_shared_secret = match std::env::var("HOOKLINE_PARTNER_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                info!("HOOKLINE_PARTNER_SECRET not set, generating ephemeral secret");
                generate_secret()
            },
        };

        let sweep_interval_secs = std::env::var("HOOKLINE_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(30);

        let max_concurrent_retries = std::env::var("HOOKLINE_MAX_CONCURRENT_RETRIES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(hookline_delivery::DEFAULT_MAX_CONCURRENT);

        Ok(Self {
            server_addr,
            partner_api_key,
            partner_shared_secret,
            sweep_interval_secs,
            max_concurrent_retries,
        })
    }
}
