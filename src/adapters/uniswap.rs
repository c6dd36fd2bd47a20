//! UniswapV2-style chain client built on ethers-rs
//!
//! Talks to a factory/pair/router triple plus ERC-20 tokens over JSON-RPC.
//! Token decimals are read once per `connect()` and cached so that every
//! public method can speak `Decimal` token units.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::utils::{format_units, parse_units};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::adapters::errors::{ChainError, ChainResult};
use crate::adapters::traits::ChainClient;
use crate::adapters::types::{Credential, PairTokens, PoolReserves, SwapParams, TxReceipt};

abigen!(
    UniswapV2Factory,
    r#"[
        function getPair(address tokenA, address tokenB) external view returns (address pair)
    ]"#,
);

abigen!(
    UniswapV2Pair,
    r#"[
        function token0() external view returns (address)
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
    ]"#,
);

abigen!(
    UniswapV2Router,
    r#"[
        function getAmountsOut(uint256 amountIn, address[] path) external view returns (uint256[] amounts)
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] path, address to, uint256 deadline) external returns (uint256[] amounts)
    ]"#,
);

abigen!(
    Erc20Token,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
        function allowance(address owner, address spender) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
        function decimals() external view returns (uint8)
    ]"#,
);

/// Native currency decimals on EVM chains
const NATIVE_DECIMALS: u32 = 18;

/// Static connection settings for the venue
#[derive(Debug, Clone)]
pub struct UniswapClientConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub factory: Address,
    pub router: Address,
    /// Gas limit applied to approvals and transfers
    pub gas_limit: u64,
}

/// Live handles rebuilt on every `connect()`
struct Handles {
    provider: Arc<Provider<Http>>,
    factory: UniswapV2Factory<Provider<Http>>,
    router: UniswapV2Router<Provider<Http>>,
    decimals: HashMap<Address, u32>,
}

/// ethers-rs implementation of [`ChainClient`]
pub struct UniswapClient {
    config: UniswapClientConfig,
    tokens: Vec<Address>,
    handles: RwLock<Option<Handles>>,
}

impl UniswapClient {
    /// Create a disconnected client; call `connect()` before use.
    ///
    /// `tokens` lists every ERC-20 the client will be asked about so their
    /// decimals can be cached up front.
    pub fn new(config: UniswapClientConfig, tokens: Vec<Address>) -> Self {
        Self {
            config,
            tokens,
            handles: RwLock::new(None),
        }
    }

    async fn provider(&self) -> ChainResult<Arc<Provider<Http>>> {
        let guard = self.handles.read().await;
        guard
            .as_ref()
            .map(|h| h.provider.clone())
            .ok_or(ChainError::NotConnected)
    }

    async fn decimals_of(&self, token: Address) -> ChainResult<u32> {
        let guard = self.handles.read().await;
        let handles = guard.as_ref().ok_or(ChainError::NotConnected)?;
        Ok(handles.decimals.get(&token).copied().unwrap_or(NATIVE_DECIMALS))
    }

    fn signer(&self, credential: &Credential) -> ChainResult<LocalWallet> {
        let wallet = credential
            .expose()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| ChainError::InvalidCredential(e.to_string()))?;
        Ok(wallet.with_chain_id(self.config.chain_id))
    }

    async fn signing_client(
        &self,
        credential: &Credential,
    ) -> ChainResult<Arc<SignerMiddleware<Provider<Http>, LocalWallet>>> {
        let provider = self.provider().await?;
        let wallet = self.signer(credential)?;
        Ok(Arc::new(SignerMiddleware::new((*provider).clone(), wallet)))
    }
}

fn rpc_err<E: std::fmt::Display>(e: E) -> ChainError {
    ChainError::Rpc(e.to_string())
}

/// Decimal token amount -> raw integer units
pub fn to_units(amount: Decimal, decimals: u32) -> ChainResult<U256> {
    let parsed = parse_units(amount.normalize().to_string(), decimals)
        .map_err(|e| ChainError::Conversion(e.to_string()))?;
    Ok(parsed.into())
}

/// Raw integer units -> Decimal token amount
pub fn from_units(raw: U256, decimals: u32) -> ChainResult<Decimal> {
    let formatted =
        format_units(raw, decimals).map_err(|e| ChainError::Conversion(e.to_string()))?;
    Decimal::from_str(&formatted).map_err(|e| ChainError::Conversion(e.to_string()))
}

fn into_receipt(receipt: Option<TransactionReceipt>) -> ChainResult<TxReceipt> {
    let receipt = receipt.ok_or_else(|| ChainError::TransactionFailed {
        tx_hash: "unknown".to_string(),
        reason: "dropped from mempool".to_string(),
    })?;
    Ok(TxReceipt {
        tx_hash: format!("{:?}", receipt.transaction_hash),
        success: receipt.status == Some(U64::from(1u64)),
        gas_used: receipt.gas_used.map(|g| g.as_u64()),
    })
}

#[async_trait]
impl ChainClient for UniswapClient {
    #[instrument(skip(self), fields(chain_id = self.config.chain_id))]
    async fn connect(&self) -> ChainResult<()> {
        let provider = Provider::<Http>::try_from(self.config.rpc_url.as_str())
            .map_err(|e| ChainError::Rpc(format!("invalid RPC url: {}", e)))?;
        let provider = Arc::new(provider);

        let remote_chain = provider.get_chainid().await.map_err(rpc_err)?;
        if remote_chain != U256::from(self.config.chain_id) {
            return Err(ChainError::InvalidResponse(format!(
                "RPC reports chain id {}, expected {}",
                remote_chain, self.config.chain_id
            )));
        }

        let mut decimals = HashMap::new();
        for token in &self.tokens {
            let erc20 = Erc20Token::new(*token, provider.clone());
            let d = erc20.decimals().call().await.map_err(rpc_err)?;
            decimals.insert(*token, u32::from(d));
        }

        let handles = Handles {
            factory: UniswapV2Factory::new(self.config.factory, provider.clone()),
            router: UniswapV2Router::new(self.config.router, provider.clone()),
            provider,
            decimals,
        };
        *self.handles.write().await = Some(handles);

        info!(tokens = self.tokens.len(), "[CHAIN] Connected");
        Ok(())
    }

    async fn pool_address(&self, pair: &PairTokens) -> ChainResult<Option<Address>> {
        let factory = {
            let guard = self.handles.read().await;
            guard.as_ref().ok_or(ChainError::NotConnected)?.factory.clone()
        };
        let pool = factory
            .get_pair(pair.base, pair.quote)
            .call()
            .await
            .map_err(rpc_err)?;
        Ok((pool != Address::zero()).then_some(pool))
    }

    async fn reserves(&self, pool: Address, pair: &PairTokens) -> ChainResult<PoolReserves> {
        let provider = self.provider().await?;
        let contract = UniswapV2Pair::new(pool, provider);
        let token0 = contract.token_0().call().await.map_err(rpc_err)?;
        let (r0, r1, _) = contract.get_reserves().call().await.map_err(rpc_err)?;

        let (base_raw, quote_raw) = if token0 == pair.base { (r0, r1) } else { (r1, r0) };
        Ok(PoolReserves {
            base: from_units(U256::from(base_raw), self.decimals_of(pair.base).await?)?,
            quote: from_units(U256::from(quote_raw), self.decimals_of(pair.quote).await?)?,
        })
    }

    async fn quote(&self, amount_in: Decimal, path: &[Address]) -> ChainResult<Decimal> {
        let (first, last) = match (path.first(), path.last()) {
            (Some(f), Some(l)) if path.len() >= 2 => (*f, *l),
            _ => return Err(ChainError::InvalidResponse("swap path needs two tokens".into())),
        };
        let router = {
            let guard = self.handles.read().await;
            guard.as_ref().ok_or(ChainError::NotConnected)?.router.clone()
        };
        let raw_in = to_units(amount_in, self.decimals_of(first).await?)?;
        let amounts = router
            .get_amounts_out(raw_in, path.to_vec())
            .call()
            .await
            .map_err(rpc_err)?;
        let raw_out = amounts
            .last()
            .copied()
            .ok_or_else(|| ChainError::InvalidResponse("empty getAmountsOut result".into()))?;
        from_units(raw_out, self.decimals_of(last).await?)
    }

    async fn native_balance(&self, owner: Address) -> ChainResult<Decimal> {
        let provider = self.provider().await?;
        let raw = provider.get_balance(owner, None).await.map_err(rpc_err)?;
        from_units(raw, NATIVE_DECIMALS)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> ChainResult<Decimal> {
        let provider = self.provider().await?;
        let raw = Erc20Token::new(token, provider)
            .balance_of(owner)
            .call()
            .await
            .map_err(rpc_err)?;
        from_units(raw, self.decimals_of(token).await?)
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> ChainResult<Decimal> {
        let provider = self.provider().await?;
        let raw = Erc20Token::new(token, provider)
            .allowance(owner, spender)
            .call()
            .await
            .map_err(rpc_err)?;
        from_units(raw, self.decimals_of(token).await?)
    }

    #[instrument(skip(self, owner), fields(token = ?token))]
    async fn approve(
        &self,
        owner: &Credential,
        token: Address,
        spender: Address,
        amount: Decimal,
    ) -> ChainResult<TxReceipt> {
        let client = self.signing_client(owner).await?;
        let raw = to_units(amount, self.decimals_of(token).await?)?;
        let call = Erc20Token::new(token, client)
            .approve(spender, raw)
            .gas(self.config.gas_limit);
        let pending = call.send().await.map_err(rpc_err)?;
        debug!(tx = ?pending.tx_hash(), "[CHAIN] Approval submitted");
        into_receipt(pending.await.map_err(rpc_err)?)
    }

    #[instrument(skip(self, owner, params), fields(amount_in = %params.amount_in))]
    async fn swap(&self, owner: &Credential, params: SwapParams) -> ChainResult<TxReceipt> {
        let (first, last) = match (params.path.first(), params.path.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(ChainError::InvalidResponse("empty swap path".into())),
        };
        let client = self.signing_client(owner).await?;
        let raw_in = to_units(params.amount_in, self.decimals_of(first).await?)?;
        let raw_min_out = to_units(params.min_amount_out, self.decimals_of(last).await?)?;

        let router = UniswapV2Router::new(self.config.router, client);
        let call = router
            .swap_exact_tokens_for_tokens(
                raw_in,
                raw_min_out,
                params.path.clone(),
                params.recipient,
                U256::from(params.deadline),
            )
            .gas(params.gas_limit);
        let pending = call.send().await.map_err(rpc_err)?;
        debug!(tx = ?pending.tx_hash(), "[CHAIN] Swap submitted");
        into_receipt(pending.await.map_err(rpc_err)?)
    }

    #[instrument(skip(self, from), fields(to = ?to, amount = %amount))]
    async fn transfer_native(
        &self,
        from: &Credential,
        to: Address,
        amount: Decimal,
    ) -> ChainResult<TxReceipt> {
        let client = self.signing_client(from).await?;
        let tx = TransactionRequest::new()
            .to(to)
            .value(to_units(amount, NATIVE_DECIMALS)?)
            .from(client.address())
            .gas(self.config.gas_limit);
        let pending = client.send_transaction(tx, None).await.map_err(rpc_err)?;
        into_receipt(pending.await.map_err(rpc_err)?)
    }

    async fn gas_price_gwei(&self) -> ChainResult<Decimal> {
        let provider = self.provider().await?;
        let wei = provider.get_gas_price().await.map_err(rpc_err)?;
        from_units(wei, 9)
    }
}
