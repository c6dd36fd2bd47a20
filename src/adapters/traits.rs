//! Collaborator trait definitions
//!
//! The engine talks to the outside world through three narrow seams:
//! - `ChainClient`: reads pool/balance data and submits signed transactions
//! - `KeyStore`: owns private keys for the funding identities
//! - `Notifier`: delivers categorized operator alerts
//!
//! All three are used as `Arc<dyn Trait>` so tests can swap in doubles.

use async_trait::async_trait;
use ethers::types::Address;
use rust_decimal::Decimal;
use tracing::warn;

use crate::adapters::errors::{ChainResult, KeyStoreError, NotifyError};
use crate::adapters::types::{
    AlertCategory, Credential, PairTokens, PoolReserves, SwapParams, TxReceipt, Wallet,
};

/// Access to the execution venue.
///
/// Amounts are expressed in token units (not wei); implementations convert
/// at the boundary. Transaction methods return only once the transaction is
/// confirmed (or known to have failed).
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// (Re)build the provider and contract handles.
    ///
    /// Called by every full initialization, including recovery retries.
    async fn connect(&self) -> ChainResult<()>;

    /// Pool address for the pair, `None` when no pool has been created yet
    async fn pool_address(&self, pair: &PairTokens) -> ChainResult<Option<Address>>;

    /// Current reserves of `pool`, ordered as (base, quote) of `pair`
    async fn reserves(&self, pool: Address, pair: &PairTokens) -> ChainResult<PoolReserves>;

    /// Output amount for swapping `amount_in` along `path`
    async fn quote(&self, amount_in: Decimal, path: &[Address]) -> ChainResult<Decimal>;

    /// Native (gas) currency balance
    async fn native_balance(&self, owner: Address) -> ChainResult<Decimal>;

    /// ERC-20 balance of `owner`
    async fn token_balance(&self, token: Address, owner: Address) -> ChainResult<Decimal>;

    /// ERC-20 allowance granted by `owner` to `spender`
    async fn allowance(&self, token: Address, owner: Address, spender: Address)
        -> ChainResult<Decimal>;

    /// Approve `spender` for `amount` of `token`, waiting for confirmation
    async fn approve(
        &self,
        owner: &Credential,
        token: Address,
        spender: Address,
        amount: Decimal,
    ) -> ChainResult<TxReceipt>;

    /// Submit an exact-input swap through the router, waiting for confirmation
    async fn swap(&self, owner: &Credential, params: SwapParams) -> ChainResult<TxReceipt>;

    /// Send native currency from `from` to `to`, waiting for confirmation
    async fn transfer_native(
        &self,
        from: &Credential,
        to: Address,
        amount: Decimal,
    ) -> ChainResult<TxReceipt>;

    /// Current gas price in gwei
    async fn gas_price_gwei(&self) -> ChainResult<Decimal>;
}

/// Custody of funding identities
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// All previously created identities, in creation order
    async fn list_identities(&self) -> Result<Vec<Wallet>, KeyStoreError>;

    /// Create and persist a new identity with a unique address
    async fn create_identity(&self) -> Result<Wallet, KeyStoreError>;

    /// Private credential for `address`
    async fn credential(&self, address: Address) -> Result<Credential, KeyStoreError>;
}

/// Outbound alert channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, category: AlertCategory, message: &str) -> Result<(), NotifyError>;

    /// Best-effort send: delivery failures are logged, never escalated
    async fn notify(&self, category: AlertCategory, message: &str) {
        if let Err(e) = self.send(category, message).await {
            warn!(category = %category, error = %e, "[ALERT] Failed to deliver alert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::RecordingNotifier;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _category: AlertCategory, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected(500))
        }
    }

    #[tokio::test]
    async fn test_notify_swallows_delivery_failure() {
        // Must return normally even though send fails
        FailingNotifier.notify(AlertCategory::Error, "boom").await;
    }

    #[tokio::test]
    async fn test_notify_delivers_through_send() {
        let notifier = RecordingNotifier::default();
        notifier.notify(AlertCategory::Volume, "daily volume 10").await;
        assert_eq!(notifier.count(AlertCategory::Volume), 1);
        assert!(notifier.messages()[0].1.contains("daily volume"));
    }
}
