//! Collaborator error types
//!
//! Errors raised by the chain client, key store and notifier are wrapped in
//! dedicated thiserror enums so the engine can tell transient chain faults
//! apart from storage and alerting problems.

use thiserror::Error;

/// Chain client errors (RPC, contract calls, transaction confirmation)
#[derive(Error, Debug)]
pub enum ChainError {
    /// Client has no live provider (never connected or connection dropped)
    #[error("Chain client not connected")]
    NotConnected,

    /// RPC transport or node-side failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Contract call returned something we cannot interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transaction was mined but reverted, or dropped from the mempool
    #[error("Transaction {tx_hash} failed: {reason}")]
    TransactionFailed { tx_hash: String, reason: String },

    /// Private credential could not be turned into a signer
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Decimal <-> wei conversion failed
    #[error("Amount conversion failed: {0}")]
    Conversion(String),
}

/// Result type alias for chain operations
pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Key store errors
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("Key store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key store record malformed: {0}")]
    Malformed(String),

    #[error("No identity stored for {0}")]
    NotFound(String),
}

/// Notification channel errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Alert delivery failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Alert endpoint rejected message with status {0}")]
    Rejected(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_error_display() {
        let err = ChainError::Rpc("connection reset".to_string());
        assert_eq!(err.to_string(), "RPC error: connection reset");

        let err = ChainError::TransactionFailed {
            tx_hash: "0xabc".to_string(),
            reason: "reverted".to_string(),
        };
        assert_eq!(err.to_string(), "Transaction 0xabc failed: reverted");
    }

    #[test]
    fn test_key_store_not_found_display() {
        let err = KeyStoreError::NotFound("0x1234".to_string());
        assert_eq!(err.to_string(), "No identity stored for 0x1234");
    }

    #[test]
    fn test_notify_rejected_display() {
        let err = NotifyError::Rejected(503);
        assert_eq!(err.to_string(), "Alert endpoint rejected message with status 503");
    }
}
