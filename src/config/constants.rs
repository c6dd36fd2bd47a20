//! Application-wide constants and configuration defaults
//!
//! Values that are not part of the YAML file but are still worth tuning
//! without a rebuild. Each can be overridden via an environment variable.

use std::time::Duration;

// =============================================================================
// Paths
// =============================================================================

/// Path of the YAML configuration (default: `config.yaml`)
///
/// Environment variable: `CONFIG_PATH`
pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string())
}

// =============================================================================
// Channels & Shutdown
// =============================================================================

/// Capacity of the fault channel feeding the recovery supervisor (default: 64)
///
/// Environment variable: `FAULT_CHANNEL_CAPACITY`. Zero is ignored, as
/// `mpsc::channel` requires a positive capacity.
pub fn fault_channel_capacity() -> usize {
    std::env::var("FAULT_CHANNEL_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(64)
}

/// Time allowed for in-flight work to finish after shutdown (default: 30s)
///
/// Environment variable: `SHUTDOWN_GRACE_SECS`
pub fn shutdown_grace_period() -> Duration {
    let secs = std::env::var("SHUTDOWN_GRACE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    Duration::from_secs(secs)
}

// =============================================================================
// Spread controller
// =============================================================================

/// Multiplier applied to the relative price change when widening the spread
pub const SPREAD_VOLATILITY_FACTOR: u32 = 10;
