//! Funding identities and round-robin rotation
//!
//! The pool mirrors the key store's identities in creation order and hands
//! them out one after another. Key material never lives here; `credential`
//! delegates to the key store on demand.

use std::sync::Arc;

use ethers::types::Address;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::adapters::errors::{ChainError, KeyStoreError};
use crate::adapters::traits::{ChainClient, KeyStore};
use crate::adapters::types::{Credential, Wallet};
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum WalletPoolError {
    #[error("Wallet pool has no identities")]
    EmptyPool,

    #[error("Key store kept returning known identities: pool has {have} of {wanted}")]
    DuplicateIdentities { have: usize, wanted: usize },

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
}

/// Duplicate identities tolerated per `ensure_minimum` call
pub const DUPLICATE_RETRY_LIMIT: usize = 3;

#[derive(Debug, Default)]
struct PoolInner {
    wallets: Vec<Wallet>,
    cursor: usize,
}

pub struct WalletPool {
    keystore: Arc<dyn KeyStore>,
    inner: Mutex<PoolInner>,
}

impl WalletPool {
    pub fn new(keystore: Arc<dyn KeyStore>) -> Self {
        Self {
            keystore,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Reload identities from the key store. The rotation cursor is kept
    /// when it still points inside the pool.
    pub async fn refresh(&self) -> Result<usize, WalletPoolError> {
        let wallets = self.keystore.list_identities().await?;
        let mut inner = self.inner.lock().await;
        inner.wallets = wallets;
        if inner.cursor >= inner.wallets.len() {
            inner.cursor = 0;
        }
        Ok(inner.wallets.len())
    }

    /// Create identities until at least `n` exist. Returns how many were created.
    ///
    /// Duplicates returned by the key store are skipped and retried, up to
    /// [`DUPLICATE_RETRY_LIMIT`] times in total.
    pub async fn ensure_minimum(&self, n: usize) -> Result<usize, WalletPoolError> {
        let mut inner = self.inner.lock().await;
        let mut created = 0;
        let mut duplicates = 0;
        while inner.wallets.len() < n {
            let wallet = self.keystore.create_identity().await?;
            if inner.wallets.contains(&wallet) {
                // Key store broke its uniqueness contract; don't rotate twice through it
                warn!(wallet = %wallet, "[WALLET] Key store returned a duplicate identity");
                duplicates += 1;
                if duplicates > DUPLICATE_RETRY_LIMIT {
                    return Err(WalletPoolError::DuplicateIdentities {
                        have: inner.wallets.len(),
                        wanted: n,
                    });
                }
                continue;
            }
            info!(wallet = %wallet, "[WALLET] Created identity");
            inner.wallets.push(wallet);
            created += 1;
        }
        Ok(created)
    }

    /// Identity at the cursor; the cursor then advances modulo pool size.
    pub async fn next(&self) -> Result<Wallet, WalletPoolError> {
        let mut inner = self.inner.lock().await;
        if inner.wallets.is_empty() {
            return Err(WalletPoolError::EmptyPool);
        }
        let wallet = inner.wallets[inner.cursor];
        inner.cursor = (inner.cursor + 1) % inner.wallets.len();
        Ok(wallet)
    }

    pub async fn credential(&self, address: Address) -> Result<Credential, WalletPoolError> {
        Ok(self.keystore.credential(address).await?)
    }

    pub async fn addresses(&self) -> Vec<Address> {
        self.inner.lock().await.wallets.iter().map(|w| w.address).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.wallets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Bootstrap funding: top up every identity whose native balance is
    /// below `min_balance` with `top_up` from `funder`.
    ///
    /// Returns the number of identities funded.
    pub async fn fund_wallets(
        &self,
        chain: &dyn ChainClient,
        funder: &Credential,
        min_balance: Decimal,
        top_up: Decimal,
    ) -> Result<usize, AppError> {
        let mut funded = 0;
        for address in self.addresses().await {
            let balance = chain.native_balance(address).await?;
            if balance >= min_balance {
                continue;
            }

            info!(
                wallet = ?address,
                balance = %balance,
                top_up = %top_up,
                "[WALLET] Balance below floor, funding"
            );
            let receipt = chain.transfer_native(funder, address, top_up).await?;
            if !receipt.success {
                return Err(ChainError::TransactionFailed {
                    tx_hash: receipt.tx_hash,
                    reason: format!("funding transfer to {:?} reverted", address),
                }
                .into());
            }
            funded += 1;
        }
        Ok(funded)
    }
}
