//! Blockchain node access, reduced to the four reads the aggregation engine
//! needs: ERC-20 allowance, approve gas estimation, the current gas price
//! and EIP-1559 fee history. Wire-level JSON-RPC and ABI encoding live in
//! [`rpc`]; everything else in the workspace depends only on the trait.

pub mod rpc;

pub use rpc::RpcChainClient;

use {
    alloy_primitives::{Address, U256},
    std::{collections::HashMap, sync::Arc},
};

/// EIP-1559 fee history rows. `reward[block][percentile]`, percentiles in
/// the order they were requested.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeeHistory {
    pub base_fee_per_gas: Vec<U256>,
    pub reward: Vec<Vec<U256>>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The node did not answer within the deadline. Retried by callers
    /// where a retry is safe (reads only).
    #[error("node request timed out")]
    Timeout,
    #[error("node rpc failed: {0}")]
    Rpc(String),
    #[error("node response malformed: {0}")]
    Decode(String),
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// `allowance(owner, spender)` on the given ERC-20 token.
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, Error>;

    /// Gas units an `approve(spender, MAX)` transaction from `owner` would
    /// consume.
    async fn estimate_approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<u64, Error>;

    /// Current node gas price in wei.
    async fn gas_price(&self) -> Result<U256, Error>;

    /// `eth_feeHistory` over the newest `block_count` blocks.
    async fn fee_history(
        &self,
        block_count: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistory, Error>;
}

/// One [`ChainClient`] per supported chain, built from configured RPC
/// endpoints at startup.
#[derive(Clone, Default)]
pub struct ChainClients(HashMap<u64, Arc<dyn ChainClient>>);

impl ChainClients {
    pub fn new(clients: HashMap<u64, Arc<dyn ChainClient>>) -> Self {
        Self(clients)
    }

    pub fn get(&self, chain_id: u64) -> Option<Arc<dyn ChainClient>> {
        self.0.get(&chain_id).cloned()
    }
}
