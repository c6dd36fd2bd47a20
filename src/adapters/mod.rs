//! External collaborators: chain client, key store, notifier
//!
//! The engine only depends on the traits in `traits`; the concrete
//! implementations here are wired up by `main`.

pub mod errors;
pub mod keystore;
pub mod notifier;
pub mod traits;
pub mod types;
pub mod uniswap;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use errors::{ChainError, ChainResult, KeyStoreError, NotifyError};
pub use keystore::FileKeyStore;
pub use notifier::{LogNotifier, WebhookNotifier};
pub use traits::{ChainClient, KeyStore, Notifier};
pub use types::{
    AlertCategory, Credential, PairTokens, PoolReserves, SwapParams, TradeSide, TxReceipt, Wallet,
};
pub use uniswap::{UniswapClient, UniswapClientConfig};
