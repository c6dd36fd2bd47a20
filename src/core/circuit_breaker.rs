//! Two-state circuit breaker gating order placement
//!
//! # Architecture
//!
//! ```text
//!            change > threshold
//!   Closed ─────────────────────► Open ──► persist, alert, arm cooldown
//!     ▲                            │
//!     │   cooldown fires:          │
//!     │   re-sample, change vs     │
//!     └── trip price < threshold ◄─┘
//! ```
//!
//! The Open flag lives in `EngineState::is_circuit_broken`. When a cooldown
//! finds the price still unstable the policy decides: `RepeatUntilStable`
//! arms another cooldown, `SingleShot` leaves the breaker open until a new
//! qualifying price move arms one.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::traits::Notifier;
use crate::adapters::types::AlertCategory;
use crate::config::{CircuitBreakerConfig, CooldownPolicy};
use crate::core::channels::{report_fault, EngineFault};
use crate::core::price_monitor::{format_percent, relative_change, PriceSampler};
use crate::core::state::StateHandle;

/// Outcome of one cooldown evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownVerdict {
    Resumed,
    StillUnstable,
}

#[derive(Debug, Default)]
struct TripState {
    /// Reference price for the cooldown comparison
    tripped_at_price: Option<Decimal>,
    armed: bool,
    /// Set at shutdown; no cooldown may be armed afterwards
    halted: bool,
    cooldown: Option<JoinHandle<()>>,
}

struct BreakerInner {
    threshold: Decimal,
    cooldown: Duration,
    policy: CooldownPolicy,
    state: StateHandle,
    sampler: PriceSampler,
    notifier: Arc<dyn Notifier>,
    faults: mpsc::Sender<EngineFault>,
    trip: Mutex<TripState>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        config: &CircuitBreakerConfig,
        state: StateHandle,
        sampler: PriceSampler,
        notifier: Arc<dyn Notifier>,
        faults: mpsc::Sender<EngineFault>,
    ) -> Self {
        Self {
            inner: Arc::new(BreakerInner {
                threshold: config.threshold,
                cooldown: Duration::from_secs(config.cooldown_secs),
                policy: config.cooldown_policy,
                state,
                sampler,
                notifier,
                faults,
                trip: Mutex::new(TripState::default()),
            }),
        }
    }

    pub async fn is_open(&self) -> bool {
        self.inner.state.read(|s| s.is_circuit_broken).await
    }

    pub async fn is_cooldown_armed(&self) -> bool {
        self.inner.trip.lock().await.armed
    }

    /// Feed one price change. Returns true when this call opened the breaker.
    pub async fn evaluate(&self, price_change: Decimal, price: Decimal) -> bool {
        if price_change <= self.inner.threshold {
            return false;
        }

        if self.is_open().await {
            // Only reachable with an idle SingleShot cooldown: a new qualifying
            // move earns another evaluation
            let mut trip = self.inner.trip.lock().await;
            if !trip.armed {
                info!(change = %price_change, price = %price, "[BREAKER] New qualifying move while open, re-arming cooldown");
                trip.tripped_at_price = Some(price);
                self.arm(&mut trip);
            }
            return false;
        }

        self.inner.state.update(|s| s.is_circuit_broken = true).await;
        warn!(
            change = %price_change,
            threshold = %self.inner.threshold,
            price = %price,
            "[BREAKER] Circuit breaker opened"
        );
        let message = format!(
            "Trading paused: price moved {} (threshold {}) to {}. Re-check in {}s.",
            format_percent(price_change, 2),
            format_percent(self.inner.threshold, 2),
            price,
            self.inner.cooldown.as_secs(),
        );
        self.inner
            .notifier
            .notify(AlertCategory::CircuitBreaker, &message)
            .await;

        let mut trip = self.inner.trip.lock().await;
        trip.tripped_at_price = Some(price);
        self.arm(&mut trip);
        true
    }

    /// Arm a cooldown for a breaker left open by a previous run.
    pub async fn resume_if_open(&self) {
        if !self.is_open().await {
            return;
        }
        let reference = self.inner.state.read(|s| s.last_price).await;
        let mut trip = self.inner.trip.lock().await;
        if trip.armed {
            return;
        }
        info!(reference = ?reference, "[BREAKER] Breaker open from previous run, arming cooldown");
        trip.tripped_at_price = reference;
        self.arm(&mut trip);
    }

    /// Cancel a pending cooldown and refuse to arm new ones (shutdown).
    ///
    /// The Open flag stays persisted, so the next run re-arms through
    /// [`CircuitBreaker::resume_if_open`].
    pub async fn disarm(&self) {
        let mut trip = self.inner.trip.lock().await;
        trip.halted = true;
        if let Some(handle) = trip.cooldown.take() {
            handle.abort();
        }
        trip.armed = false;
    }

    fn arm(&self, trip: &mut TripState) {
        if trip.halted {
            debug!("[BREAKER] Shutting down, cooldown not armed");
            return;
        }
        if let Some(stale) = trip.cooldown.take() {
            stale.abort();
        }
        trip.armed = true;
        let breaker = self.clone();
        trip.cooldown = Some(tokio::spawn(async move { breaker.run_cooldown().await }));
    }

    async fn run_cooldown(self) {
        loop {
            tokio::time::sleep(self.inner.cooldown).await;

            let verdict = self.check_cooldown().await;
            let repeat = verdict == CooldownVerdict::StillUnstable
                && self.inner.policy == CooldownPolicy::RepeatUntilStable;
            if !repeat {
                break;
            }
            debug!("[BREAKER] Price still unstable, re-arming cooldown");
        }
        self.inner.trip.lock().await.armed = false;
    }

    /// Re-sample and close the breaker if the price is back within threshold
    /// of the trip price.
    pub async fn check_cooldown(&self) -> CooldownVerdict {
        let reference = self.inner.trip.lock().await.tripped_at_price;

        let sample = match self.inner.sampler.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                report_fault(&self.inner.faults, "circuit_breaker", e.into()).await;
                return CooldownVerdict::StillUnstable;
            }
        };

        let change = match (reference, sample) {
            (Some(reference), Some(sample)) => relative_change(reference, sample.value),
            // No reference recorded: any successful sample counts as stable
            (None, Some(_)) => Some(Decimal::ZERO),
            (_, None) => None,
        };

        let Some(change) = change else {
            info!("[BREAKER] No price available at cooldown, staying open");
            return CooldownVerdict::StillUnstable;
        };

        if change >= self.inner.threshold {
            warn!(change = %change, threshold = %self.inner.threshold, "[BREAKER] Price still unstable, staying open");
            return CooldownVerdict::StillUnstable;
        }

        self.inner.state.update(|s| s.is_circuit_broken = false).await;
        info!(change = %change, "[BREAKER] Circuit breaker closed, trading resumed");
        self.inner
            .notifier
            .notify(
                AlertCategory::CircuitResumed,
                &format!(
                    "Trading resumed: price within {} of the trip price",
                    format_percent(change, 2)
                ),
            )
            .await;
        CooldownVerdict::Resumed
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::{test_pair, MockChainClient, RecordingNotifier};
    use crate::core::state::{EngineState, StateStore};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        chain: Arc<MockChainClient>,
        notifier: Arc<RecordingNotifier>,
        state: StateHandle,
        breaker: CircuitBreaker,
        faults_rx: mpsc::Receiver<EngineFault>,
    }

    fn fixture(policy: CooldownPolicy) -> Fixture {
        let dir = TempDir::new().unwrap();
        let chain = Arc::new(MockChainClient::new(test_pair()));
        let notifier = Arc::new(RecordingNotifier::default());
        let state = StateHandle::new(
            EngineState::default(),
            StateStore::new(dir.path().join("state.json")),
            notifier.clone(),
        );
        let (faults_tx, faults_rx) = mpsc::channel(8);
        let breaker = CircuitBreaker::new(
            &CircuitBreakerConfig {
                threshold: dec!(0.10),
                cooldown_secs: 900,
                cooldown_policy: policy,
            },
            state.clone(),
            PriceSampler::new(chain.clone(), test_pair()),
            notifier.clone(),
            faults_tx,
        );
        Fixture {
            _dir: dir,
            chain,
            notifier,
            state,
            breaker,
            faults_rx,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_at_threshold_keeps_closed() {
        let f = fixture(CooldownPolicy::SingleShot);
        assert!(!f.breaker.evaluate(dec!(0.10), dec!(1.10)).await);
        assert!(!f.breaker.is_open().await);
        assert_eq!(f.notifier.count(AlertCategory::CircuitBreaker), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_opens_persists_and_alerts_once() {
        let f = fixture(CooldownPolicy::SingleShot);
        assert!(f.breaker.evaluate(dec!(0.12), dec!(1.12)).await);
        // Further moves while open don't re-alert
        assert!(!f.breaker.evaluate(dec!(0.20), dec!(1.30)).await);

        assert!(f.breaker.is_open().await);
        assert!(f.breaker.is_cooldown_armed().await);
        assert_eq!(f.notifier.count(AlertCategory::CircuitBreaker), 1);
        assert!(f.state.snapshot().await.is_circuit_broken);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_closes_when_stable() {
        let f = fixture(CooldownPolicy::SingleShot);
        f.chain.set_price(dec!(1.12));
        f.breaker.evaluate(dec!(0.12), dec!(1.12)).await;

        f.chain.set_price(dec!(1.13));
        tokio::time::sleep(Duration::from_secs(901)).await;

        assert!(!f.breaker.is_open().await);
        assert!(!f.breaker.is_cooldown_armed().await);
        assert_eq!(f.notifier.count(AlertCategory::CircuitResumed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_shot_stays_open_when_unstable() {
        let f = fixture(CooldownPolicy::SingleShot);
        f.breaker.evaluate(dec!(0.12), dec!(1.12)).await;

        f.chain.set_price(dec!(1.50));
        tokio::time::sleep(Duration::from_secs(901)).await;
        assert!(f.breaker.is_open().await);
        assert!(!f.breaker.is_cooldown_armed().await);

        // Price recovers, but with no new qualifying move nothing re-checks
        f.chain.set_price(dec!(1.12));
        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert!(f.breaker.is_open().await);
        assert_eq!(f.notifier.count(AlertCategory::CircuitResumed), 0);

        // A new qualifying move arms another evaluation
        f.breaker.evaluate(dec!(0.15), dec!(1.12)).await;
        assert!(f.breaker.is_cooldown_armed().await);
        tokio::time::sleep(Duration::from_secs(901)).await;
        assert!(!f.breaker.is_open().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_until_stable_rechecks() {
        let f = fixture(CooldownPolicy::RepeatUntilStable);
        f.breaker.evaluate(dec!(0.12), dec!(1.12)).await;

        f.chain.set_price(dec!(1.50));
        tokio::time::sleep(Duration::from_secs(901)).await;
        assert!(f.breaker.is_open().await);
        assert!(f.breaker.is_cooldown_armed().await);

        f.chain.set_price(dec!(1.15));
        tokio::time::sleep(Duration::from_secs(900)).await;
        assert!(!f.breaker.is_open().await);
        assert_eq!(f.notifier.count(AlertCategory::CircuitResumed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_sample_failure_reports_fault() {
        let mut f = fixture(CooldownPolicy::SingleShot);
        f.breaker.evaluate(dec!(0.12), dec!(1.12)).await;

        f.chain.fail_quotes(true);
        tokio::time::sleep(Duration::from_secs(901)).await;

        assert!(f.breaker.is_open().await);
        let fault = f.faults_rx.try_recv().unwrap();
        assert_eq!(fault.origin, "circuit_breaker");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_if_open_arms_cooldown() {
        let f = fixture(CooldownPolicy::SingleShot);
        f.state
            .update(|s| {
                s.is_circuit_broken = true;
                s.last_price = Some(dec!(1.0));
            })
            .await;

        f.breaker.resume_if_open().await;
        assert!(f.breaker.is_cooldown_armed().await);

        tokio::time::sleep(Duration::from_secs(901)).await;
        assert!(!f.breaker.is_open().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_after_disarm_arms_nothing() {
        let f = fixture(CooldownPolicy::RepeatUntilStable);
        f.breaker.disarm().await;

        // A tick still in flight during shutdown trips the breaker
        assert!(f.breaker.evaluate(dec!(0.12), dec!(1.12)).await);
        assert!(f.breaker.is_open().await);
        assert!(!f.breaker.is_cooldown_armed().await);

        f.breaker.resume_if_open().await;
        assert!(!f.breaker.is_cooldown_armed().await);

        f.chain.set_price(dec!(1.12));
        tokio::time::sleep(Duration::from_secs(1801)).await;
        assert!(f.breaker.is_open().await);
        assert_eq!(f.notifier.count(AlertCategory::CircuitResumed), 0);
        assert_eq!(f.chain.pool_lookups(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_cancels_cooldown() {
        let f = fixture(CooldownPolicy::SingleShot);
        f.breaker.evaluate(dec!(0.12), dec!(1.0)).await;
        f.breaker.disarm().await;

        tokio::time::sleep(Duration::from_secs(901)).await;
        assert!(f.breaker.is_open().await);
        assert_eq!(f.notifier.count(AlertCategory::CircuitResumed), 0);
    }
}
