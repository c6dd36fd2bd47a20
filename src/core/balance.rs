//! Periodic native-balance check of the funding identities
//!
//! Runs on its own interval with its own busy guard; it is not mutually
//! exclusive with the price tick.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::adapters::traits::{ChainClient, Notifier};
use crate::adapters::types::AlertCategory;
use crate::core::channels::{report_fault, EngineFault};
use crate::core::wallet_pool::WalletPool;
use crate::error::AppError;

pub struct BalanceMonitor {
    chain: Arc<dyn ChainClient>,
    pool: Arc<WalletPool>,
    notifier: Arc<dyn Notifier>,
    alert_below: Decimal,
    busy: Arc<Mutex<()>>,
}

impl BalanceMonitor {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        pool: Arc<WalletPool>,
        notifier: Arc<dyn Notifier>,
        alert_below: Decimal,
    ) -> Self {
        Self {
            chain,
            pool,
            notifier,
            alert_below,
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// Check every identity. Returns the ones below the alert floor.
    pub async fn tick(&self) -> Result<Vec<(Address, Decimal)>, AppError> {
        let mut low = Vec::new();
        for address in self.pool.addresses().await {
            let balance = self.chain.native_balance(address).await?;
            debug!(wallet = ?address, balance = %balance, "[WALLET] Balance checked");
            if balance < self.alert_below {
                low.push((address, balance));
            }
        }

        for (address, balance) in &low {
            warn!(wallet = ?address, balance = %balance, floor = %self.alert_below, "[WALLET] Low balance");
            self.notifier
                .notify(
                    AlertCategory::LowBalance,
                    &format!(
                        "Wallet {:?} balance {} is below {}",
                        address, balance, self.alert_below
                    ),
                )
                .await;
        }
        Ok(low)
    }

    pub async fn run(
        self: Arc<Self>,
        period: Duration,
        tracker: TaskTracker,
        faults: mpsc::Sender<EngineFault>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(interval_secs = period.as_secs(), "[WALLET] Balance monitor started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    let Ok(guard) = self.busy.clone().try_lock_owned() else {
                        debug!("[WALLET] Previous balance check still in flight, skipping");
                        continue;
                    };
                    let monitor = Arc::clone(&self);
                    let faults = faults.clone();
                    tracker.spawn(async move {
                        let _guard = guard;
                        if let Err(e) = monitor.tick().await {
                            report_fault(&faults, "balance_monitor", e).await;
                        }
                    });
                }
            }
        }
    }
}
