//! Volume Bot - Entry Point
//!
//! 1. Loads `.env` and initializes logging
//! 2. Loads and validates `config.yaml`
//! 3. Builds the chain client, key store and notifier
//! 4. Starts the engine (and the status server when enabled)
//! 5. Waits for Ctrl+C, then shuts down with a bounded grace period

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use volume_bot::adapters::{
    FileKeyStore, LogNotifier, Notifier, UniswapClient, UniswapClientConfig, WebhookNotifier,
};
use volume_bot::config::{self, constants};
use volume_bot::core::{init_logging, Engine};
use volume_bot::server;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    init_logging();
    info!("[STARTUP] Volume bot starting");

    let config_path = constants::config_path();
    let config = match config::load_config(Path::new(&config_path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(path = %config_path, error = %e, "[CONFIG] Configuration failed");
            return Err(e.into());
        }
    };
    info!(
        network = %config.network.name,
        chain_id = config.network.chain_id,
        pair = %config.pair.symbol,
        funder = config.funder_private_key.is_some(),
        "[CONFIG] Configuration loaded"
    );

    let pair = config.pair.tokens();
    let chain = Arc::new(UniswapClient::new(
        UniswapClientConfig {
            rpc_url: config.network.rpc_url.clone(),
            chain_id: config.network.chain_id,
            factory: config.contracts.factory,
            router: config.contracts.router,
            gas_limit: config.trading.gas_limit,
        },
        vec![pair.base, pair.quote],
    ));
    let keystore = Arc::new(FileKeyStore::new(&config.wallets.keystore_dir));

    let notifier: Arc<dyn Notifier> = match &config.alerts.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(
            url.clone(),
            config.alerts.recipient.clone(),
            config.alerts.api_key.as_ref().map(|key| key.expose()),
        )?),
        None => {
            info!("[ALERT] No webhook configured, alerts go to the log");
            Arc::new(LogNotifier)
        }
    };

    let status = config.status.clone();
    let engine = Engine::new(config, chain, keystore, notifier);
    let handle = engine.start().await;

    if status.enabled {
        let state = handle.state();
        let shutdown_rx = handle.subscribe_shutdown();
        handle.tracker().spawn(async move {
            if let Err(e) = server::start_server(state, status.port, shutdown_rx).await {
                error!(error = %e, "[STATUS] Status server failed");
            }
        });
    }

    info!("[STARTUP] Engine running. Press Ctrl+C to stop.");
    match signal::ctrl_c().await {
        Ok(()) => info!("[SHUTDOWN] Graceful shutdown initiated"),
        Err(e) => error!(error = %e, "[SHUTDOWN] Failed to listen for Ctrl+C, shutting down"),
    }

    let clean = handle.shutdown(constants::shutdown_grace_period()).await;
    info!(clean = clean, "[SHUTDOWN] Exit");
    Ok(())
}
