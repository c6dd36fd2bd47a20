//! Top-level error for the engine.
//!
//! Each subsystem keeps its own `thiserror` enum; `AppError` is what crosses
//! the fault channel and reaches the recovery supervisor.

use thiserror::Error;

use crate::adapters::errors::{ChainError, KeyStoreError, NotifyError};
use crate::core::state::StateError;
use crate::core::wallet_pool::WalletPoolError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("Wallet pool error: {0}")]
    WalletPool(#[from] WalletPoolError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_error_converts_to_app_error() {
        let chain_err = ChainError::Rpc("timeout".into());
        let app_err: AppError = chain_err.into();
        let msg = app_err.to_string();
        assert!(msg.contains("Chain error"), "Got: {}", msg);
        assert!(msg.contains("timeout"), "Got: {}", msg);
    }

    #[test]
    fn test_wallet_pool_error_converts_to_app_error() {
        let app_err: AppError = WalletPoolError::EmptyPool.into();
        assert!(app_err.to_string().contains("no identities"), "Got: {}", app_err);
    }

    #[test]
    fn test_io_error_converts_to_app_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let app_err: AppError = io_err.into();
        let msg = app_err.to_string();
        assert!(msg.contains("IO error"), "Got: {}", msg);
        assert!(msg.contains("file missing"), "Got: {}", msg);
    }

    #[test]
    fn test_config_error_display() {
        let err = AppError::Config("missing router address".into());
        assert_eq!(err.to_string(), "Configuration error: missing router address");
    }
}
