//! Shared test doubles for the collaborator traits
//!
//! `MockChainClient` keeps an in-memory view of one pool plus balances and
//! records every transaction it is asked to submit. `MemoryKeyStore` hands
//! out deterministic addresses. `RecordingNotifier` captures alerts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::Address;
use rust_decimal::Decimal;

use crate::adapters::errors::{ChainError, ChainResult, KeyStoreError, NotifyError};
use crate::adapters::traits::{ChainClient, KeyStore, Notifier};
use crate::adapters::types::{
    AlertCategory, Credential, PairTokens, PoolReserves, SwapParams, TxReceipt, Wallet,
};

/// Pair used across unit tests
pub fn test_pair() -> PairTokens {
    PairTokens {
        base: Address::from_low_u64_be(0xba5e),
        quote: Address::from_low_u64_be(0x0007e),
    }
}

/// Router address used across unit tests
pub fn test_router() -> Address {
    Address::from_low_u64_be(0x7007e7)
}

#[derive(Debug)]
struct MockChainState {
    pool: Option<Address>,
    reserves: PoolReserves,
    price: Decimal,
    native: HashMap<Address, Decimal>,
    tokens: HashMap<(Address, Address), Decimal>,
    allowances: HashMap<(Address, Address, Address), Decimal>,
    gas_price_gwei: Decimal,
    /// Delay applied to pool lookups and balance reads
    latency: Option<Duration>,
    fail_quotes: bool,
    fail_connects: u32,
    revert_swaps: bool,
    swaps: Vec<SwapParams>,
    approvals: Vec<(Address, Address, Decimal)>,
    transfers: Vec<(Address, Decimal)>,
}

/// In-memory chain with a single pool priced at `price` quote per base
#[derive(Debug)]
pub struct MockChainClient {
    pair: PairTokens,
    state: Mutex<MockChainState>,
    calls: AtomicUsize,
    connects: AtomicUsize,
    pool_lookups: AtomicUsize,
    balance_reads: AtomicUsize,
}

impl MockChainClient {
    pub fn new(pair: PairTokens) -> Self {
        Self {
            pair,
            state: Mutex::new(MockChainState {
                pool: Some(Address::from_low_u64_be(0x9001)),
                reserves: PoolReserves {
                    base: Decimal::new(1_000, 0),
                    quote: Decimal::new(1_000, 0),
                },
                price: Decimal::ONE,
                native: HashMap::new(),
                tokens: HashMap::new(),
                allowances: HashMap::new(),
                gas_price_gwei: Decimal::new(20, 0),
                latency: None,
                fail_quotes: false,
                fail_connects: 0,
                revert_swaps: false,
                swaps: Vec::new(),
                approvals: Vec::new(),
                transfers: Vec::new(),
            }),
            calls: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
            pool_lookups: AtomicUsize::new(0),
            balance_reads: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockChainState> {
        self.state.lock().unwrap()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn stall(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Slow down `pool_address` and `native_balance` by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Number of `pool_address` calls started
    pub fn pool_lookups(&self) -> usize {
        self.pool_lookups.load(Ordering::SeqCst)
    }

    /// Number of `native_balance` calls started
    pub fn balance_reads(&self) -> usize {
        self.balance_reads.load(Ordering::SeqCst)
    }

    pub fn set_price(&self, price: Decimal) {
        self.lock().price = price;
    }

    pub fn set_pool(&self, pool: Option<Address>) {
        self.lock().pool = pool;
    }

    pub fn set_reserves(&self, base: Decimal, quote: Decimal) {
        self.lock().reserves = PoolReserves { base, quote };
    }

    pub fn set_native_balance(&self, owner: Address, amount: Decimal) {
        self.lock().native.insert(owner, amount);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: Decimal) {
        self.lock().tokens.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: Decimal) {
        self.lock().allowances.insert((token, owner, spender), amount);
    }

    pub fn set_gas_price(&self, gwei: Decimal) {
        self.lock().gas_price_gwei = gwei;
    }

    pub fn fail_quotes(&self, fail: bool) {
        self.lock().fail_quotes = fail;
    }

    /// Make the next `n` calls to `connect` fail
    pub fn fail_connects(&self, n: u32) {
        self.lock().fail_connects = n;
    }

    pub fn revert_swaps(&self, revert: bool) {
        self.lock().revert_swaps = revert;
    }

    /// Number of chain calls made, `connect` excluded
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn swaps(&self) -> Vec<SwapParams> {
        self.lock().swaps.clone()
    }

    pub fn approvals(&self) -> Vec<(Address, Address, Decimal)> {
        self.lock().approvals.clone()
    }

    pub fn transfers(&self) -> Vec<(Address, Decimal)> {
        self.lock().transfers.clone()
    }

    fn receipt(&self, n: usize, success: bool) -> TxReceipt {
        TxReceipt {
            tx_hash: format!("0x{:064x}", n),
            success,
            gas_used: Some(150_000),
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn connect(&self) -> ChainResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(ChainError::Rpc("mock connect failure".to_string()));
        }
        Ok(())
    }

    async fn pool_address(&self, _pair: &PairTokens) -> ChainResult<Option<Address>> {
        self.touch();
        self.pool_lookups.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        Ok(self.lock().pool)
    }

    async fn reserves(&self, _pool: Address, _pair: &PairTokens) -> ChainResult<PoolReserves> {
        self.touch();
        Ok(self.lock().reserves)
    }

    async fn quote(&self, amount_in: Decimal, path: &[Address]) -> ChainResult<Decimal> {
        self.touch();
        let state = self.lock();
        if state.fail_quotes {
            return Err(ChainError::Rpc("mock quote failure".to_string()));
        }
        if path.first() == Some(&self.pair.base) {
            Ok(amount_in * state.price)
        } else {
            Ok(amount_in / state.price)
        }
    }

    async fn native_balance(&self, owner: Address) -> ChainResult<Decimal> {
        self.touch();
        self.balance_reads.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        Ok(self.lock().native.get(&owner).copied().unwrap_or_default())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> ChainResult<Decimal> {
        self.touch();
        Ok(self.lock().tokens.get(&(token, owner)).copied().unwrap_or_default())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> ChainResult<Decimal> {
        self.touch();
        Ok(self
            .lock()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(
        &self,
        _owner: &Credential,
        token: Address,
        spender: Address,
        amount: Decimal,
    ) -> ChainResult<TxReceipt> {
        self.touch();
        let mut state = self.lock();
        state.approvals.push((token, spender, amount));
        let n = state.approvals.len();
        drop(state);
        Ok(self.receipt(n, true))
    }

    async fn swap(&self, _owner: &Credential, params: SwapParams) -> ChainResult<TxReceipt> {
        self.touch();
        let mut state = self.lock();
        let success = !state.revert_swaps;
        state.swaps.push(params);
        let n = state.swaps.len();
        drop(state);
        Ok(self.receipt(1_000 + n, success))
    }

    async fn transfer_native(
        &self,
        _from: &Credential,
        to: Address,
        amount: Decimal,
    ) -> ChainResult<TxReceipt> {
        self.touch();
        let mut state = self.lock();
        state.transfers.push((to, amount));
        *state.native.entry(to).or_default() += amount;
        let n = state.transfers.len();
        drop(state);
        Ok(self.receipt(2_000 + n, true))
    }

    async fn gas_price_gwei(&self) -> ChainResult<Decimal> {
        self.touch();
        Ok(self.lock().gas_price_gwei)
    }
}

/// Key store that mints sequential addresses
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    identities: Mutex<Vec<(Wallet, Credential)>>,
}

impl MemoryKeyStore {
    /// Store pre-seeded with `n` identities
    pub fn with_identities(n: usize) -> Self {
        let store = Self::default();
        for _ in 0..n {
            store.mint();
        }
        store
    }

    fn mint(&self) -> Wallet {
        let mut ids = self.identities.lock().unwrap();
        let n = ids.len() as u64 + 1;
        let wallet = Wallet::new(Address::from_low_u64_be(0x1000 + n));
        ids.push((wallet, Credential::new(format!("test-private-key-{:04}", n))));
        wallet
    }

    pub fn len(&self) -> usize {
        self.identities.lock().unwrap().len()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn list_identities(&self) -> Result<Vec<Wallet>, KeyStoreError> {
        Ok(self.identities.lock().unwrap().iter().map(|(w, _)| *w).collect())
    }

    async fn create_identity(&self) -> Result<Wallet, KeyStoreError> {
        Ok(self.mint())
    }

    async fn credential(&self, address: Address) -> Result<Credential, KeyStoreError> {
        self.identities
            .lock()
            .unwrap()
            .iter()
            .find(|(w, _)| w.address == address)
            .map(|(_, c)| c.clone())
            .ok_or_else(|| KeyStoreError::NotFound(format!("{:?}", address)))
    }
}

/// Notifier that keeps every alert in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(AlertCategory, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(AlertCategory, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, category: AlertCategory) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == category)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, category: AlertCategory, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((category, message.to_string()));
        Ok(())
    }
}
