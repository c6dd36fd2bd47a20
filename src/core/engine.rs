//! Engine assembly and lifecycle
//!
//! # Architecture
//!
//! ```text
//! Engine::new ── load state ── build pool, spread, breaker, bootstrap
//!      │
//! Engine::start
//!      ├── roll stale daily volume
//!      ├── RecoverySupervisor::run      (fault channel consumer)
//!      ├── Bootstrap::initialize        (failure → fault channel)
//!      ├── CircuitBreaker::resume_if_open
//!      ├── PriceMonitor::run            (interval, busy guard)
//!      ├── BalanceMonitor::run          (interval, busy guard)
//!      ├── OrderScheduler::run          (random delays)
//!      └── volume::run_midnight_reset
//! ```
//!
//! Every task is spawned on one `TaskTracker` and listens to one broadcast
//! shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::adapters::traits::{ChainClient, KeyStore, Notifier};
use crate::adapters::types::Credential;
use crate::config::{AppConfig, WalletConfig};
use crate::core::balance::BalanceMonitor;
use crate::core::channels::{report_fault, ChannelBundle};
use crate::core::circuit_breaker::CircuitBreaker;
use crate::core::price_monitor::{PriceMonitor, PriceSampler};
use crate::core::recovery::{RecoverySupervisor, ServiceInitializer};
use crate::core::scheduler::OrderScheduler;
use crate::core::spread::SpreadController;
use crate::core::state::{StateHandle, StateStore};
use crate::core::volume;
use crate::core::wallet_pool::WalletPool;
use crate::error::AppError;

// =============================================================================
// Bootstrap
// =============================================================================

/// Full service initialization: connect, load and top up identities.
pub struct Bootstrap {
    chain: Arc<dyn ChainClient>,
    pool: Arc<WalletPool>,
    state: StateHandle,
    funder: Option<Credential>,
    wallets: WalletConfig,
}

impl Bootstrap {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        pool: Arc<WalletPool>,
        state: StateHandle,
        funder: Option<Credential>,
        wallets: WalletConfig,
    ) -> Self {
        Self {
            chain,
            pool,
            state,
            funder,
            wallets,
        }
    }
}

#[async_trait]
impl ServiceInitializer for Bootstrap {
    async fn initialize(&self) -> Result<(), AppError> {
        self.chain.connect().await?;

        self.pool.refresh().await?;
        let created = self.pool.ensure_minimum(self.wallets.min_count).await?;
        let addresses = self.pool.addresses().await;
        info!(wallets = addresses.len(), created = created, "[WALLET] Wallet pool ready");
        self.state.update(|s| s.wallets = addresses).await;

        match &self.funder {
            Some(funder) => {
                let funded = self
                    .pool
                    .fund_wallets(
                        self.chain.as_ref(),
                        funder,
                        self.wallets.min_balance,
                        self.wallets.top_up_amount,
                    )
                    .await?;
                if funded > 0 {
                    info!(funded = funded, "[WALLET] Topped up identities");
                }
            }
            None => warn!("[WALLET] No funder credential configured, skipping funding"),
        }

        self.state.update(|s| s.recovery_attempts = 0).await;
        info!("[ENGINE] Initialization complete");
        Ok(())
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct Engine {
    config: AppConfig,
    chain: Arc<dyn ChainClient>,
    notifier: Arc<dyn Notifier>,
    state: StateHandle,
    pool: Arc<WalletPool>,
    breaker: CircuitBreaker,
    channels: ChannelBundle,
}

impl Engine {
    pub fn new(
        config: AppConfig,
        chain: Arc<dyn ChainClient>,
        keystore: Arc<dyn KeyStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = StateStore::new(&config.state.path);
        let initial = store.load();
        for (id, order) in &initial.active_orders {
            warn!(
                order_id = %id,
                wallet = ?order.wallet,
                side = %order.side,
                amount = %order.amount,
                submitted_at = %order.submitted_at,
                "[STATE] Unresolved order from previous run"
            );
        }

        let state = StateHandle::new(initial, store, notifier.clone());
        let pool = Arc::new(WalletPool::new(keystore));
        let channels = ChannelBundle::default();
        let breaker = CircuitBreaker::new(
            &config.circuit_breaker,
            state.clone(),
            PriceSampler::new(chain.clone(), config.pair.tokens()),
            notifier.clone(),
            channels.fault_tx.clone(),
        );

        Self {
            config,
            chain,
            notifier,
            state,
            pool,
            breaker,
            channels,
        }
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Initialize and spawn every routine
    pub async fn start(self) -> EngineHandle {
        let Engine {
            config,
            chain,
            notifier,
            state,
            pool,
            breaker,
            channels,
        } = self;
        let ChannelBundle {
            fault_tx,
            fault_rx,
            shutdown_tx,
        } = channels;
        let tracker = TaskTracker::new();
        let pair = config.pair.tokens();

        volume::roll_if_stale(&state, Utc::now()).await;

        let funder = config.funder_private_key.clone();
        let bootstrap = Arc::new(Bootstrap::new(
            chain.clone(),
            pool.clone(),
            state.clone(),
            funder,
            config.wallets.clone(),
        ));

        let supervisor = Arc::new(RecoverySupervisor::new(
            &config.recovery,
            bootstrap.clone(),
            state.clone(),
            notifier.clone(),
        ));
        tracker.spawn(supervisor.run(fault_rx, shutdown_tx.subscribe()));

        if let Err(e) = bootstrap.initialize().await {
            error!(error = %e, "[ENGINE] Initial bootstrap failed");
            report_fault(&fault_tx, "bootstrap", e).await;
        }

        breaker.resume_if_open().await;

        let spread = Arc::new(SpreadController::new(&config.spread, notifier.clone()));
        let price_monitor = Arc::new(PriceMonitor::new(
            PriceSampler::new(chain.clone(), pair),
            state.clone(),
            spread,
            breaker.clone(),
        ));
        tracker.spawn(price_monitor.run(
            Duration::from_secs(config.monitor.price_interval_secs),
            tracker.clone(),
            fault_tx.clone(),
            shutdown_tx.subscribe(),
        ));

        let balance_monitor = Arc::new(BalanceMonitor::new(
            chain.clone(),
            pool.clone(),
            notifier.clone(),
            config.wallets.low_balance_alert,
        ));
        tracker.spawn(balance_monitor.run(
            Duration::from_secs(config.monitor.balance_check_interval_secs),
            tracker.clone(),
            fault_tx.clone(),
            shutdown_tx.subscribe(),
        ));

        let scheduler = Arc::new(OrderScheduler::new(
            chain,
            pool,
            breaker.clone(),
            state.clone(),
            notifier,
            pair,
            config.contracts.router,
            config.trading.clone(),
        ));
        tracker.spawn(scheduler.run(fault_tx, shutdown_tx.subscribe()));

        tracker.spawn(volume::run_midnight_reset(state.clone(), shutdown_tx.subscribe()));

        info!(
            network = %config.network.name,
            pair = %config.pair.symbol,
            "[ENGINE] All routines started"
        );

        EngineHandle {
            tracker,
            shutdown_tx,
            breaker,
            state,
        }
    }
}

// =============================================================================
// EngineHandle
// =============================================================================

/// Running engine
pub struct EngineHandle {
    tracker: TaskTracker,
    shutdown_tx: broadcast::Sender<()>,
    breaker: CircuitBreaker,
    state: StateHandle,
}

impl EngineHandle {
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Stop every routine and wait up to `grace` for in-flight work.
    ///
    /// Returns false if work was still running when the grace period ended;
    /// that work is abandoned.
    pub async fn shutdown(self, grace: Duration) -> bool {
        info!(grace_secs = grace.as_secs(), "[ENGINE] Shutting down");
        let _ = self.shutdown_tx.send(());
        self.breaker.disarm().await;
        self.tracker.close();

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => {
                info!("[ENGINE] All routines stopped");
                true
            }
            Err(_) => {
                warn!("[ENGINE] Grace period elapsed, abandoning in-flight work");
                false
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
