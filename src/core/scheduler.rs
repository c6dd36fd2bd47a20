//! Randomized order scheduling and execution
//!
//! # Architecture
//!
//! ```text
//! sleep(random delay) ──► attempt(side, amount)
//!                            │ breaker open?           ──► Skipped (no chain call)
//!                            │ daily limit reached?    ──► Skipped
//!                            │ wallet = pool.next()
//!                            │ gas above ceiling?      ──► Skipped
//!                            │ source balance < amount ──► Skipped
//!                            │ allowance < amount      ──► approve + wait
//!                            ▼
//!              quote ──► record active order ──► swap + wait
//!                                                   │
//!                       daily_volume += amount ◄────┘
//! ```
//!
//! Each attempt computes its own next fire time; there is no fixed period.
//! Errors are not retried inline, they go to the recovery supervisor.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ethers::types::Address;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::errors::ChainError;
use crate::adapters::traits::{ChainClient, Notifier};
use crate::adapters::types::{AlertCategory, PairTokens, SwapParams, TradeSide, Wallet};
use crate::config::{AmountRange, DelayRange, TradingConfig};
use crate::core::channels::{report_fault, EngineFault};
use crate::core::circuit_breaker::CircuitBreaker;
use crate::core::state::{OrderRecord, StateHandle};
use crate::core::wallet_pool::WalletPool;
use crate::error::AppError;

// =============================================================================
// Sampling
// =============================================================================

/// Uniform amount in `[range.min, range.max]`, 6 decimal places
pub fn sample_amount<R: Rng>(rng: &mut R, range: &AmountRange) -> Decimal {
    let fraction: f64 = rng.gen();
    let fraction = Decimal::from_f64(fraction).unwrap_or(Decimal::ZERO);
    let amount = (range.min + (range.max - range.min) * fraction).round_dp(6);
    amount.max(range.min).min(range.max)
}

/// Uniform whole-second delay in `[range.min, range.max]`
pub fn sample_delay<R: Rng>(rng: &mut R, range: &DelayRange) -> Duration {
    Duration::from_secs(rng.gen_range(range.min..=range.max))
}

pub fn sample_side<R: Rng>(rng: &mut R) -> TradeSide {
    if rng.gen_bool(0.5) {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Expected no-op conditions; logged, never escalated
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    CircuitOpen,
    DailyLimitReached { volume: Decimal, limit: Decimal },
    GasTooHigh { gwei: Decimal, ceiling: Decimal },
    InsufficientBalance { wallet: Address, needed: Decimal, available: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedOrder {
    pub id: String,
    pub wallet: Wallet,
    pub side: TradeSide,
    pub amount: Decimal,
    pub min_amount_out: Decimal,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Executed(ExecutedOrder),
    Skipped(SkipReason),
}

// =============================================================================
// OrderScheduler
// =============================================================================

pub struct OrderScheduler {
    chain: Arc<dyn ChainClient>,
    pool: Arc<WalletPool>,
    breaker: CircuitBreaker,
    state: StateHandle,
    notifier: Arc<dyn Notifier>,
    pair: PairTokens,
    router: Address,
    trading: TradingConfig,
}

impl OrderScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        pool: Arc<WalletPool>,
        breaker: CircuitBreaker,
        state: StateHandle,
        notifier: Arc<dyn Notifier>,
        pair: PairTokens,
        router: Address,
        trading: TradingConfig,
    ) -> Self {
        Self {
            chain,
            pool,
            breaker,
            state,
            notifier,
            pair,
            router,
            trading,
        }
    }

    /// Attempt one order with a freshly sampled side and amount
    pub async fn attempt_random(&self) -> Result<OrderOutcome, AppError> {
        let (side, amount) = {
            let mut rng = rand::thread_rng();
            (
                sample_side(&mut rng),
                sample_amount(&mut rng, &self.trading.amount_range),
            )
        };
        self.attempt(side, amount).await
    }

    /// Run the pre-flight checks and, if they pass, execute the swap.
    pub async fn attempt(&self, side: TradeSide, amount: Decimal) -> Result<OrderOutcome, AppError> {
        if self.breaker.is_open().await {
            info!(side = %side, amount = %amount, "[ORDER] Circuit breaker open, order refused");
            return Ok(OrderOutcome::Skipped(SkipReason::CircuitOpen));
        }

        if let Some(limit) = self.trading.daily_volume_limit {
            let volume = self.state.read(|s| s.daily_volume).await;
            if volume >= limit {
                info!(volume = %volume, limit = %limit, "[ORDER] Daily volume limit reached");
                return Ok(OrderOutcome::Skipped(SkipReason::DailyLimitReached { volume, limit }));
            }
        }

        let wallet = self.pool.next().await?;

        let gwei = self.chain.gas_price_gwei().await?;
        if gwei > self.trading.max_gas_price_gwei {
            info!(gwei = %gwei, ceiling = %self.trading.max_gas_price_gwei, "[ORDER] Gas price above ceiling");
            return Ok(OrderOutcome::Skipped(SkipReason::GasTooHigh {
                gwei,
                ceiling: self.trading.max_gas_price_gwei,
            }));
        }

        let source = self.pair.source_token(side);
        let available = self.chain.token_balance(source, wallet.address).await?;
        if available < amount {
            info!(
                wallet = %wallet,
                side = %side,
                needed = %amount,
                available = %available,
                "[ORDER] Insufficient balance, skipping"
            );
            return Ok(OrderOutcome::Skipped(SkipReason::InsufficientBalance {
                wallet: wallet.address,
                needed: amount,
                available,
            }));
        }

        let credential = self.pool.credential(wallet.address).await?;

        let allowance = self.chain.allowance(source, wallet.address, self.router).await?;
        if allowance < amount {
            info!(wallet = %wallet, allowance = %allowance, amount = %amount, "[ORDER] Approving router");
            let receipt = self.chain.approve(&credential, source, self.router, amount).await?;
            if !receipt.success {
                return Err(ChainError::TransactionFailed {
                    tx_hash: receipt.tx_hash,
                    reason: "router approval reverted".to_string(),
                }
                .into());
            }
        }

        let path = self.pair.path(side);
        let quoted = self.chain.quote(amount, &path).await?;
        let min_amount_out = quoted * (Decimal::ONE - self.trading.slippage_tolerance);
        let deadline = Utc::now().timestamp().max(0) as u64 + self.trading.deadline_secs;

        let order_id = Uuid::new_v4().to_string();
        self.state
            .update(|s| {
                s.active_orders.insert(
                    order_id.clone(),
                    OrderRecord {
                        wallet: wallet.address,
                        side,
                        amount,
                        submitted_at: Utc::now(),
                    },
                );
            })
            .await;

        debug!(order_id = %order_id, quoted = %quoted, min_out = %min_amount_out, "[ORDER] Submitting swap");
        let params = SwapParams {
            amount_in: amount,
            min_amount_out,
            path,
            recipient: wallet.address,
            deadline,
            gas_limit: self.trading.gas_limit,
        };

        let receipt = match self.chain.swap(&credential, params).await {
            Ok(receipt) if receipt.success => receipt,
            Ok(receipt) => {
                self.forget_order(&order_id).await;
                return Err(ChainError::TransactionFailed {
                    tx_hash: receipt.tx_hash,
                    reason: "swap reverted".to_string(),
                }
                .into());
            }
            Err(e) => {
                self.forget_order(&order_id).await;
                return Err(e.into());
            }
        };

        let (before, after) = self
            .state
            .update(|s| {
                s.active_orders.remove(&order_id);
                let before = s.daily_volume;
                s.daily_volume += amount;
                (before, s.daily_volume)
            })
            .await;

        info!(
            order_id = %order_id,
            wallet = %wallet,
            side = %side,
            amount = %amount,
            tx_hash = %receipt.tx_hash,
            daily_volume = %after,
            "[ORDER] Swap confirmed"
        );

        if let Some(threshold) = self.trading.volume_alert_threshold {
            if before < threshold && after >= threshold {
                self.notifier
                    .notify(
                        AlertCategory::Volume,
                        &format!("Daily volume reached {} (threshold {})", after, threshold),
                    )
                    .await;
            }
        }

        Ok(OrderOutcome::Executed(ExecutedOrder {
            id: order_id,
            wallet,
            side,
            amount,
            min_amount_out,
            tx_hash: receipt.tx_hash,
        }))
    }

    async fn forget_order(&self, order_id: &str) {
        self.state
            .update(|s| {
                s.active_orders.remove(order_id);
            })
            .await;
    }

    /// Self-rescheduling order loop, stopped as a unit by shutdown
    pub async fn run(self: Arc<Self>, faults: mpsc::Sender<EngineFault>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            min_delay_secs = self.trading.delay_range_secs.min,
            max_delay_secs = self.trading.delay_range_secs.max,
            "[ORDER] Order scheduler started"
        );

        loop {
            let delay = sample_delay(&mut rand::thread_rng(), &self.trading.delay_range_secs);
            debug!(delay_secs = delay.as_secs(), "[ORDER] Next attempt scheduled");

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("[ORDER] Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match self.attempt_random().await {
                Ok(OrderOutcome::Executed(_)) => {}
                Ok(OrderOutcome::Skipped(reason)) => debug!(reason = ?reason, "[ORDER] Attempt skipped"),
                Err(e) => {
                    warn!(error = %e, "[ORDER] Attempt failed");
                    report_fault(&faults, "order_scheduler", e).await;
                }
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
