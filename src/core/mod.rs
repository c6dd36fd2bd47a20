//! Core module - the control engine
//!
//! # Module Architecture
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! to keep the public API visible and prevent accidental changes to it.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{Engine, StateHandle, CircuitBreaker};
//! ```
//!
//! ## Adding New Public Types
//! When adding new public types to submodules, explicitly add them to the
//! re-exports below to make them part of the public API.

pub mod balance;
pub mod channels;
pub mod circuit_breaker;
pub mod engine;
pub mod logging;
pub mod price_monitor;
pub mod recovery;
pub mod scheduler;
pub mod spread;
pub mod state;
pub mod volume;
pub mod wallet_pool;

// Explicit re-exports for state module
pub use state::{EngineState, OrderRecord, StateError, StateHandle, StateStore};

// Explicit re-exports for wallet pool module
pub use wallet_pool::{WalletPool, WalletPoolError};

// Explicit re-exports for price monitor module
pub use price_monitor::{
    format_percent, relative_change, PriceMonitor, PriceSample, PriceSampler,
};

// Explicit re-exports for spread module
pub use spread::{adjusted_min, SpreadConfig, SpreadController};

// Explicit re-exports for circuit breaker module
pub use circuit_breaker::{CircuitBreaker, CooldownVerdict};

// Explicit re-exports for scheduler module
pub use scheduler::{
    sample_amount, sample_delay, sample_side, ExecutedOrder, OrderOutcome, OrderScheduler,
    SkipReason,
};

// Explicit re-exports for recovery module
pub use recovery::{RecoveryOutcome, RecoverySupervisor, ServiceInitializer};

// Explicit re-exports for volume and balance modules
pub use balance::BalanceMonitor;
pub use volume::{duration_until_next_utc_midnight, roll_if_stale, run_midnight_reset};

// Explicit re-exports for channels module
pub use channels::{report_fault, ChannelBundle, EngineFault};

// Explicit re-exports for engine module
pub use engine::{Bootstrap, Engine, EngineHandle};

// Explicit re-exports for logging module
pub use logging::{
    init_logging, init_logging_with_config, sanitize, LogFormat, LoggingConfig, SanitizedValue,
    DEFAULT_LOG_LEVEL, SENSITIVE_FIELD_PATTERNS,
};
