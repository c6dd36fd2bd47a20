//! Volatility-adaptive spread band
//!
//! Every price tick with a previous price to compare against re-tunes the
//! minimum spread: it widens with the relative price move and is clamped
//! into `[target, max]`. `target` and `max` are fixed policy.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::adapters::traits::Notifier;
use crate::adapters::types::AlertCategory;
use crate::config::constants::SPREAD_VOLATILITY_FACTOR;
use crate::config::SpreadSettings;
use crate::core::price_monitor::format_percent;

/// Runtime spread band. Only `min` changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadConfig {
    pub min: Decimal,
    pub target: Decimal,
    pub max: Decimal,
}

impl From<&SpreadSettings> for SpreadConfig {
    fn from(s: &SpreadSettings) -> Self {
        Self {
            min: s.min,
            target: s.target,
            max: s.max,
        }
    }
}

/// `clamp(target * (1 + change * 10), target, max)`
///
/// Saturates at `max` if the product overflows.
pub fn adjusted_min(price_change: Decimal, target: Decimal, max: Decimal) -> Decimal {
    let change = price_change.abs();
    let widened = change
        .checked_mul(Decimal::from(SPREAD_VOLATILITY_FACTOR))
        .and_then(|v| v.checked_add(Decimal::ONE))
        .and_then(|factor| target.checked_mul(factor))
        .unwrap_or(max);
    widened.max(target).min(max)
}

pub struct SpreadController {
    band: RwLock<SpreadConfig>,
    sensitivity: Decimal,
    notifier: Arc<dyn Notifier>,
}

impl SpreadController {
    pub fn new(settings: &SpreadSettings, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            band: RwLock::new(SpreadConfig::from(settings)),
            sensitivity: settings.sensitivity,
            notifier,
        }
    }

    pub async fn current(&self) -> SpreadConfig {
        *self.band.read().await
    }

    /// Re-tune `min` for `price_change` and return the new value.
    ///
    /// Alerts when `min` moved by more than the sensitivity threshold.
    pub async fn apply(&self, price_change: Decimal) -> Decimal {
        let (old_min, new_min) = {
            let mut band = self.band.write().await;
            let old_min = band.min;
            band.min = adjusted_min(price_change, band.target, band.max);
            (old_min, band.min)
        };

        let delta = (new_min - old_min).abs();
        if delta > self.sensitivity {
            info!(
                old_min = %old_min,
                new_min = %new_min,
                price_change = %price_change,
                "[SPREAD] Minimum spread adjusted"
            );
            let message = format!(
                "Minimum spread adjusted from {} to {} after a {} price change",
                format_percent(old_min, 3),
                format_percent(new_min, 3),
                format_percent(price_change, 3),
            );
            self.notifier
                .notify(AlertCategory::SpreadAdjustment, &message)
                .await;
        } else {
            debug!(new_min = %new_min, price_change = %price_change, "[SPREAD] Minimum spread re-tuned");
        }
        new_min
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::RecordingNotifier;
    use rust_decimal_macros::dec;

    fn settings() -> SpreadSettings {
        SpreadSettings {
            min: dec!(0.01),
            target: dec!(0.01),
            max: dec!(0.05),
            sensitivity: dec!(0.005),
        }
    }

    #[test]
    fn test_adjusted_min_no_change_is_target() {
        assert_eq!(adjusted_min(dec!(0), dec!(0.01), dec!(0.05)), dec!(0.01));
    }

    #[test]
    fn test_adjusted_min_widens_proportionally() {
        // 1% move widens target by 10%
        assert_eq!(adjusted_min(dec!(0.01), dec!(0.01), dec!(0.05)), dec!(0.011));
        assert_eq!(adjusted_min(dec!(0.12), dec!(0.01), dec!(0.05)), dec!(0.022));
    }

    #[test]
    fn test_adjusted_min_capped_at_max() {
        assert_eq!(adjusted_min(dec!(0.9), dec!(0.01), dec!(0.05)), dec!(0.05));
        assert_eq!(adjusted_min(Decimal::MAX, dec!(0.01), dec!(0.05)), dec!(0.05));
    }

    #[tokio::test]
    async fn test_small_adjustment_is_silent() {
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = SpreadController::new(&settings(), notifier.clone());

        let min = controller.apply(dec!(0.02)).await;

        assert_eq!(min, dec!(0.012));
        assert_eq!(notifier.count(AlertCategory::SpreadAdjustment), 0);
    }

    #[tokio::test]
    async fn test_large_adjustment_alerts() {
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = SpreadController::new(&settings(), notifier.clone());

        controller.apply(dec!(0.12)).await;

        assert_eq!(notifier.count(AlertCategory::SpreadAdjustment), 1);
        let band = controller.current().await;
        assert_eq!(band.min, dec!(0.022));
        assert_eq!(band.target, dec!(0.01));
        assert_eq!(band.max, dec!(0.05));
    }

    #[tokio::test]
    async fn test_relaxing_back_to_target_alerts_too() {
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = SpreadController::new(&settings(), notifier.clone());

        controller.apply(dec!(0.5)).await;
        controller.apply(dec!(0)).await;

        assert_eq!(notifier.count(AlertCategory::SpreadAdjustment), 2);
        assert_eq!(controller.current().await.min, dec!(0.01));
    }

    // =========================================================================
    // Property-based tests (proptest)
    // =========================================================================
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn adjusted_min_stays_in_band(
                change_bp in 0i64..10_000_000,
                target_bp in 1i64..500,
                spread_bp in 0i64..500,
            ) {
                let change = Decimal::new(change_bp, 4);
                let target = Decimal::new(target_bp, 4);
                let max = target + Decimal::new(spread_bp, 4);
                let min = adjusted_min(change, target, max);
                prop_assert!(target <= min && min <= max, "{} not in [{}, {}]", min, target, max);
            }
        }
    }
}
