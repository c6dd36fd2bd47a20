//! Configuration module for engine settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig` and its sections)
//! - YAML loading with environment overrides (`load_config`)
//! - Application constants with environment variable overrides

pub mod constants;
mod loader;
mod types;

// Re-export types
pub use types::{
    AlertConfig, AmountRange, AppConfig, CircuitBreakerConfig, ContractsConfig, CooldownPolicy,
    DelayRange, MonitorConfig, NetworkConfig, PairConfig, RecoveryConfig, SpreadSettings,
    StateConfig, StatusConfig, TradingConfig, WalletConfig,
};

#[cfg(test)]
pub(crate) use types::tests::valid_config;

// Re-export loader functions
pub use loader::{apply_env_overrides, load_config, load_config_from_str};
