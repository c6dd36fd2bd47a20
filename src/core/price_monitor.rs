//! Periodic price sampling
//!
//! # Architecture
//!
//! ```text
//! interval tick ──► try_lock(busy) ──held──► tick dropped
//!                        │
//!                        ▼
//!                 PriceSampler::sample ──none──► skip (no pool / no liquidity)
//!                        │
//!                        ▼
//!     state.last_price ──► SpreadController::apply ──► CircuitBreaker::evaluate
//! ```
//!
//! Faults from a tick go to the recovery supervisor through the fault
//! channel; the interval keeps running.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::adapters::errors::{ChainError, ChainResult};
use crate::adapters::traits::ChainClient;
use crate::adapters::types::PairTokens;
use crate::core::channels::{report_fault, EngineFault};
use crate::core::circuit_breaker::CircuitBreaker;
use crate::core::spread::SpreadController;
use crate::core::state::StateHandle;
use crate::error::AppError;

/// One observed exchange rate (quote units per base unit)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub value: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// `|new - old| / old`, `None` when `old` is zero
pub fn relative_change(old: Decimal, new: Decimal) -> Option<Decimal> {
    if old.is_zero() {
        return None;
    }
    (new - old).abs().checked_div(old.abs())
}

/// Render a fraction as a percentage for alert text.
///
/// Moves off a dust price can exceed the `Decimal` range once scaled, those
/// render as a multiple instead.
pub fn format_percent(fraction: Decimal, dp: u32) -> String {
    match fraction.checked_mul(Decimal::ONE_HUNDRED) {
        Some(pct) => format!("{}%", pct.round_dp(dp)),
        None => format!("{}x", fraction.round_dp(dp)),
    }
}

/// Reads the current pair price from the venue
#[derive(Clone)]
pub struct PriceSampler {
    chain: Arc<dyn ChainClient>,
    pair: PairTokens,
}

impl PriceSampler {
    pub fn new(chain: Arc<dyn ChainClient>, pair: PairTokens) -> Self {
        Self { chain, pair }
    }

    /// Quote one base unit. `Ok(None)` when the pool is missing or empty.
    pub async fn sample(&self) -> ChainResult<Option<PriceSample>> {
        let Some(pool) = self.chain.pool_address(&self.pair).await? else {
            debug!("[PRICE] No pool for pair yet, skipping");
            return Ok(None);
        };

        let reserves = self.chain.reserves(pool, &self.pair).await?;
        if reserves.is_empty() {
            debug!(pool = ?pool, "[PRICE] Pool has no liquidity, skipping");
            return Ok(None);
        }

        let value = self.chain.quote(Decimal::ONE, &self.pair.price_path()).await?;
        if value <= Decimal::ZERO {
            return Err(ChainError::InvalidResponse(format!(
                "non-positive quote {} for unit amount",
                value
            )));
        }

        Ok(Some(PriceSample {
            value,
            observed_at: Utc::now(),
        }))
    }
}

pub struct PriceMonitor {
    sampler: PriceSampler,
    state: StateHandle,
    spread: Arc<SpreadController>,
    breaker: CircuitBreaker,
    busy: Arc<Mutex<()>>,
}

impl PriceMonitor {
    pub fn new(
        sampler: PriceSampler,
        state: StateHandle,
        spread: Arc<SpreadController>,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            sampler,
            state,
            spread,
            breaker,
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// One sampling pass. Returns the new sample, `None` if skipped.
    pub async fn tick(&self) -> Result<Option<PriceSample>, AppError> {
        let Some(sample) = self.sampler.sample().await? else {
            return Ok(None);
        };

        let previous = self
            .state
            .update(|s| {
                let previous = s.last_price;
                s.last_price = Some(sample.value);
                s.last_price_update_time = sample.observed_at;
                previous
            })
            .await;

        let Some(previous) = previous else {
            info!(price = %sample.value, "[PRICE] First price sample");
            return Ok(Some(sample));
        };

        let Some(change) = relative_change(previous, sample.value) else {
            return Ok(Some(sample));
        };
        debug!(price = %sample.value, previous = %previous, change = %change, "[PRICE] Price updated");

        self.spread.apply(change).await;
        self.breaker.evaluate(change, sample.value).await;

        Ok(Some(sample))
    }

    /// Run ticks every `period` until shutdown. A tick that fires while the
    /// previous one is still in flight is dropped.
    pub async fn run(
        self: Arc<Self>,
        period: Duration,
        tracker: TaskTracker,
        faults: mpsc::Sender<EngineFault>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(interval_secs = period.as_secs(), "[PRICE] Price monitor started");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("[PRICE] Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    let Ok(guard) = self.busy.clone().try_lock_owned() else {
                        debug!("[PRICE] Previous tick still in flight, skipping");
                        continue;
                    };
                    let monitor = Arc::clone(&self);
                    let faults = faults.clone();
                    tracker.spawn(async move {
                        let _guard = guard;
                        if let Err(e) = monitor.tick().await {
                            report_fault(&faults, "price_monitor", e).await;
                        }
                    });
                }
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
