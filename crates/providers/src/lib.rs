//! Provider adapters: one module per third-party aggregator, each hiding
//! its own URL layout, parameter naming, response schema and error
//! vocabulary behind the uniform [`Provider`] interface.
//!
//! Adapters translate, they do not decide: every response is normalized
//! into [`model::quote`] types and every failure into the shared error
//! taxonomy, so the aggregation engine never sees upstream idiosyncrasies.

pub mod bebop;
pub mod debridge;
mod http;
pub mod kyberswap;
pub mod lifi;
pub mod oneinch;
pub mod openocean;
pub mod paraswap;
pub mod query;
pub mod registry;
pub mod sifi;
pub mod zeroex;

pub use {
    query::{CrossChainPriceQuery, CrossChainQuoteQuery, PriceQuery, QuoteQuery},
    registry::{CachedProvider, CrossChainRegistry, Registry},
};

use {
    errors::AggregationError,
    model::quote::{LimitOrderPayload, PriceQuote, TxQuote},
    serde_json::Value,
    std::time::Duration,
};

/// Default deadline for one upstream request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7);

/// How long a provider's advertised price stays fresh.
pub const PRICE_CACHE_TTL: Duration = Duration::from_secs(30);

/// A single-chain swap aggregator.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Advertised price without commitment; no taker required.
    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError>;

    /// Broadcastable swap transaction for a concrete taker.
    async fn get_quote(&self, query: &QuoteQuery) -> Result<TxQuote, AggregationError>;

    /// The limit-order side of this provider, when it has one.
    fn limit_orders(&self) -> Option<&dyn LimitOrderProviding> {
        None
    }
}

/// A cross-chain swap provider.
#[async_trait::async_trait]
pub trait CrossChainProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether quoting needs a source-chain gas price resolved up front.
    fn requires_gas_price(&self) -> bool {
        false
    }

    async fn get_price(&self, query: &CrossChainPriceQuery)
    -> Result<PriceQuote, AggregationError>;

    async fn get_quote(&self, query: &CrossChainQuoteQuery) -> Result<TxQuote, AggregationError>;

    fn limit_orders(&self) -> Option<&dyn LimitOrderProviding> {
        None
    }
}

/// Limit-order operations. Payloads are provider-shaped and passed through
/// verbatim; the facade does not normalize them.
#[async_trait::async_trait]
pub trait LimitOrderProviding: Send + Sync {
    async fn orders_by_trader(
        &self,
        chain_id: u64,
        trader: model::Address,
        maker_token: Option<model::Address>,
        taker_token: Option<model::Address>,
        statuses: Option<Vec<String>>,
    ) -> Result<Value, AggregationError>;

    async fn order_by_hash(
        &self,
        chain_id: u64,
        order_hash: &str,
    ) -> Result<Value, AggregationError>;

    async fn post_order(
        &self,
        chain_id: u64,
        order_hash: &str,
        signature: &str,
        payload: &LimitOrderPayload,
    ) -> Result<Value, AggregationError>;
}
