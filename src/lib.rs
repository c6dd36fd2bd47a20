//! Volume Bot - DEX volume engine
//!
//! Rotates a small pool of funding wallets through randomized buy/sell
//! swaps on a single pair, with:
//! - Circuit breaker on sharp price moves
//! - Volatility-adaptive spread band
//! - Bounded recovery with operator alerts
//! - JSON-persisted engine state

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod server;

pub use error::AppError;
