//! Shared types exchanged with the chain client, key store and notifier

use std::fmt;

use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::logging::sanitize;

// =============================================================================
// Identities
// =============================================================================

/// Funding identity, identified by its public address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wallet {
    pub address: Address,
}

impl Wallet {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl fmt::Display for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.address)
    }
}

/// Hex-encoded private key for a wallet.
///
/// Never printed in full: both `Debug` and `Display` go through the log
/// sanitizer.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Raw secret, only for building a signer
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", sanitize(&self.0))
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", sanitize(&self.0))
    }
}

// =============================================================================
// Market
// =============================================================================

/// The single traded pair: `base` is what we buy/sell, `quote` is what we pay with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairTokens {
    pub base: Address,
    pub quote: Address,
}

impl PairTokens {
    /// Swap path for a trade side (first element is the asset spent)
    pub fn path(&self, side: TradeSide) -> Vec<Address> {
        match side {
            TradeSide::Buy => vec![self.quote, self.base],
            TradeSide::Sell => vec![self.base, self.quote],
        }
    }

    /// Asset that must be held to place an order on `side`
    pub fn source_token(&self, side: TradeSide) -> Address {
        match side {
            TradeSide::Buy => self.quote,
            TradeSide::Sell => self.base,
        }
    }

    /// Path used to price one unit of base in quote
    pub fn price_path(&self) -> Vec<Address> {
        vec![self.base, self.quote]
    }
}

/// Trade direction relative to the base token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Pool reserves in token units, ordered as (base, quote)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub base: Decimal,
    pub quote: Decimal,
}

impl PoolReserves {
    pub fn is_empty(&self) -> bool {
        self.base.is_zero() || self.quote.is_zero()
    }
}

/// Parameters for an exact-input swap
#[derive(Debug, Clone, PartialEq)]
pub struct SwapParams {
    pub amount_in: Decimal,
    pub min_amount_out: Decimal,
    pub path: Vec<Address>,
    pub recipient: Address,
    /// Unix timestamp (seconds) after which the router rejects the swap
    pub deadline: u64,
    pub gas_limit: u64,
}

/// Confirmed transaction outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub success: bool,
    pub gas_used: Option<u64>,
}

// =============================================================================
// Alerts
// =============================================================================

/// Alert category shown as the notification subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCategory {
    Error,
    CircuitBreaker,
    CircuitResumed,
    ManualIntervention,
    SpreadAdjustment,
    LowBalance,
    Volume,
    Persistence,
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertCategory::Error => "Error",
            AlertCategory::CircuitBreaker => "Circuit Breaker",
            AlertCategory::CircuitResumed => "Trading Resumed",
            AlertCategory::ManualIntervention => "Manual Intervention Required",
            AlertCategory::SpreadAdjustment => "Spread Adjustment",
            AlertCategory::LowBalance => "Low Balance",
            AlertCategory::Volume => "Volume Alert",
            AlertCategory::Persistence => "State Persistence",
        };
        write!(f, "{}", label)
    }
}
