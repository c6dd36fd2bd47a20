//! Configuration types for the engine
//!
//! This module defines all configuration structs that are loaded from YAML.
//! Every section carries `#[serde(default)]` so an omitted option takes the
//! default documented on its field.

use std::fmt;

use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::types::{Credential, PairTokens};
use crate::error::AppError;

// ============================================================================
// Ranges
// ============================================================================

/// Inclusive decimal range (token amounts)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Decimal,
    pub max: Decimal,
}

/// Inclusive range in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

// ============================================================================
// Enums
// ============================================================================

/// What the circuit breaker does when a cooldown evaluation finds the price
/// still unstable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Stay open; only a new qualifying price move arms another cooldown
    SingleShot,
    /// Arm another cooldown until the price has stabilized
    #[default]
    RepeatUntilStable,
}

impl fmt::Display for CooldownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CooldownPolicy::SingleShot => write!(f, "single_shot"),
            CooldownPolicy::RepeatUntilStable => write!(f, "repeat_until_stable"),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network label used in logs and alerts (e.g. "mainnet", "bsc")
    pub name: String,
    /// JSON-RPC endpoint; `RPC_URL` overrides
    pub rpc_url: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractsConfig {
    pub router: Address,
    pub factory: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// Display symbol, e.g. "TOKEN/WETH"
    pub symbol: String,
    /// Token bought and sold
    pub base_token: Address,
    /// Token paid with / received
    pub quote_token: Address,
}

impl PairConfig {
    pub fn tokens(&self) -> PairTokens {
        PairTokens {
            base: self.base_token,
            quote: self.quote_token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Order size range in source-asset units (default 0.05..=1)
    pub amount_range: AmountRange,
    /// Delay between order attempts in seconds (default 60..=300)
    pub delay_range_secs: DelayRange,
    /// Maximum accepted shortfall between quote and fill (default 2%)
    pub slippage_tolerance: Decimal,
    /// Swap deadline from submission (default 300s)
    pub deadline_secs: u64,
    /// Gas limit for swaps (default 300k)
    pub gas_limit: u64,
    /// Orders are skipped above this gas price (default 100 gwei)
    pub max_gas_price_gwei: Decimal,
    /// Orders are skipped once daily volume reaches this amount
    pub daily_volume_limit: Option<Decimal>,
    /// An alert is sent the first time daily volume crosses this amount
    pub volume_alert_threshold: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadSettings {
    pub min: Decimal,
    pub target: Decimal,
    pub max: Decimal,
    /// Minimum change of `min` that triggers an adjustment alert (default 0.5pp)
    pub sensitivity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Relative price move that opens the breaker (default 0.10)
    pub threshold: Decimal,
    /// Time before the breaker re-checks the price (default 15 min)
    pub cooldown_secs: u64,
    pub cooldown_policy: CooldownPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub price_interval_secs: u64,
    pub balance_check_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Identities kept in the pool (default 3)
    pub min_count: usize,
    /// Directory of the file key store
    pub keystore_dir: String,
    /// Native balance floor checked at bootstrap funding
    pub min_balance: Decimal,
    /// Amount sent by the funder when a wallet is below the floor
    pub top_up_amount: Decimal,
    /// Native balance below which the balance tick alerts
    pub low_balance_alert: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Webhook endpoint; `ALERT_WEBHOOK_URL` overrides. Alerts go to the log when unset
    pub webhook_url: Option<String>,
    /// Addressee forwarded with every alert (e.g. an ops mailbox)
    pub recipient: Option<String>,
    /// Bearer token for the webhook; `ALERT_API_KEY` overrides
    #[serde(skip_serializing)]
    pub api_key: Option<Credential>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub contracts: ContractsConfig,
    pub pair: PairConfig,
    pub trading: TradingConfig,
    pub spread: SpreadSettings,
    pub circuit_breaker: CircuitBreakerConfig,
    pub monitor: MonitorConfig,
    pub wallets: WalletConfig,
    pub recovery: RecoveryConfig,
    pub alerts: AlertConfig,
    pub state: StateConfig,
    pub status: StatusConfig,
    /// Master funding key, from `FUNDER_PRIVATE_KEY` only
    #[serde(skip)]
    pub funder_private_key: Option<Credential>,
}

// ============================================================================
// Defaults
// ============================================================================

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "mainnet".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 1,
        }
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            symbol: "BASE/QUOTE".to_string(),
            base_token: Address::zero(),
            quote_token: Address::zero(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            amount_range: AmountRange {
                min: Decimal::new(5, 2),
                max: Decimal::ONE,
            },
            delay_range_secs: DelayRange { min: 60, max: 300 },
            slippage_tolerance: Decimal::new(2, 2),
            deadline_secs: 300,
            gas_limit: 300_000,
            max_gas_price_gwei: Decimal::new(100, 0),
            daily_volume_limit: None,
            volume_alert_threshold: None,
        }
    }
}

impl Default for SpreadSettings {
    fn default() -> Self {
        Self {
            min: Decimal::new(1, 2),
            target: Decimal::new(1, 2),
            max: Decimal::new(5, 2),
            sensitivity: Decimal::new(5, 3),
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: Decimal::new(10, 2),
            cooldown_secs: 15 * 60,
            cooldown_policy: CooldownPolicy::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            price_interval_secs: 30,
            balance_check_interval_secs: 300,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            min_count: 3,
            keystore_dir: "data/wallets".to_string(),
            min_balance: Decimal::new(5, 2),
            top_up_amount: Decimal::new(1, 1),
            low_balance_alert: Decimal::new(2, 2),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 5,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: "data/engine_state.json".to_string(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

fn is_fraction(v: Decimal) -> bool {
    v > Decimal::ZERO && v < Decimal::ONE
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(AppError::Config("network.rpc_url cannot be empty".to_string()));
        }

        if self.contracts.router.is_zero() || self.contracts.factory.is_zero() {
            return Err(AppError::Config(
                "contracts.router and contracts.factory must be set".to_string(),
            ));
        }

        if self.pair.base_token.is_zero() || self.pair.quote_token.is_zero() {
            return Err(AppError::Config(
                "pair.base_token and pair.quote_token must be set".to_string(),
            ));
        }
        if self.pair.base_token == self.pair.quote_token {
            return Err(AppError::Config(
                "pair.base_token and pair.quote_token cannot be the same".to_string(),
            ));
        }

        let s = &self.spread;
        if !(is_fraction(s.min) && is_fraction(s.target) && is_fraction(s.max)) {
            return Err(AppError::Config(format!(
                "spread bounds must lie in (0, 1) (got min={}, target={}, max={})",
                s.min, s.target, s.max
            )));
        }
        if !(s.min <= s.target && s.target <= s.max) {
            return Err(AppError::Config(format!(
                "spread must satisfy min <= target <= max (got {} / {} / {})",
                s.min, s.target, s.max
            )));
        }

        let t = &self.trading;
        if t.amount_range.min <= Decimal::ZERO || t.amount_range.min > t.amount_range.max {
            return Err(AppError::Config(format!(
                "trading.amount_range must satisfy 0 < min <= max (got {}..{})",
                t.amount_range.min, t.amount_range.max
            )));
        }
        if t.delay_range_secs.min > t.delay_range_secs.max {
            return Err(AppError::Config(format!(
                "trading.delay_range_secs min ({}) must be <= max ({})",
                t.delay_range_secs.min, t.delay_range_secs.max
            )));
        }
        if t.slippage_tolerance < Decimal::ZERO || t.slippage_tolerance >= Decimal::ONE {
            return Err(AppError::Config(format!(
                "trading.slippage_tolerance must be in [0, 1) (got {})",
                t.slippage_tolerance
            )));
        }

        if !is_fraction(self.circuit_breaker.threshold) {
            return Err(AppError::Config(format!(
                "circuit_breaker.threshold must be in (0, 1) (got {})",
                self.circuit_breaker.threshold
            )));
        }

        if self.circuit_breaker.cooldown_secs == 0 {
            return Err(AppError::Config(
                "circuit_breaker.cooldown_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.price_interval_secs == 0 || self.monitor.balance_check_interval_secs == 0 {
            return Err(AppError::Config("monitor intervals must be > 0".to_string()));
        }

        if self.wallets.min_count == 0 {
            return Err(AppError::Config("wallets.min_count must be >= 1".to_string()));
        }

        if self.recovery.max_retries == 0 {
            return Err(AppError::Config("recovery.max_retries must be >= 1".to_string()));
        }
        if self.recovery.retry_delay_secs == 0 {
            return Err(AppError::Config("recovery.retry_delay_secs must be > 0".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
