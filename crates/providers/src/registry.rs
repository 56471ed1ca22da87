//! Immutable name→adapter registries and the price-cache decorator.
//!
//! Registries are built once at startup. Iteration order is registration
//! order, which mirrors descriptor-configuration order; the engine's
//! ranking tie-break depends on it being stable.

use {
    crate::{
        CrossChainProvider, LimitOrderProviding, PRICE_CACHE_TTL, PriceQuery, Provider, QuoteQuery,
    },
    cache::{Cache, Key},
    errors::AggregationError,
    model::quote::{PriceQuote, TxQuote},
    std::sync::Arc,
};

pub struct Registry {
    providers: Vec<Arc<dyn Provider>>,
}

impl Registry {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }
}

pub struct CrossChainRegistry {
    providers: Vec<Arc<dyn CrossChainProvider>>,
}

impl CrossChainRegistry {
    pub fn new(providers: Vec<Arc<dyn CrossChainProvider>>) -> Self {
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CrossChainProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CrossChainProvider>> {
        self.providers.iter()
    }
}

/// Decorator caching `get_price` for [`PRICE_CACHE_TTL`], keyed by the
/// normalized query. Quotes are never cached, they embed taker-specific
/// calldata.
pub struct CachedProvider {
    inner: Arc<dyn Provider>,
    cache: Cache,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn Provider>, cache: Cache) -> Self {
        Self { inner, cache }
    }

    fn price_key(&self, query: &PriceQuery) -> Key {
        Key::new("providers::get_price")
            .arg(&self.inner.name())
            .arg(&query.chain_id)
            .arg(&format!("{:#x}", query.buy_token))
            .arg(&format!("{:#x}", query.sell_token))
            .arg(&query.sell_amount)
            .kwarg_opt("gas_price", query.gas_price.as_ref())
            .kwarg_opt("slippage", query.slippage_percentage.as_ref())
            .kwarg_opt(
                "taker",
                query.taker_address.map(|taker| format!("{taker:#x}")).as_ref(),
            )
            .kwarg_opt(
                "fee_recipient",
                query
                    .fee_recipient
                    .map(|recipient| format!("{recipient:#x}"))
                    .as_ref(),
            )
            .kwarg_opt("fee", query.buy_token_percentage_fee.as_ref())
    }
}

#[async_trait::async_trait]
impl Provider for CachedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let key = self.price_key(query);
        self.cache
            .memoize(key, PRICE_CACHE_TTL, || self.inner.get_price(query))
            .await
    }

    async fn get_quote(&self, query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
        self.inner.get_quote(query).await
    }

    fn limit_orders(&self) -> Option<&dyn LimitOrderProviding> {
        self.inner.limit_orders()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        errors::ErrorKind,
        model::{U256, address},
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Provider for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PriceQuote {
                provider: "counting".to_owned(),
                sources: vec![],
                buy_amount: U256::from(2u64),
                gas: U256::ZERO,
                sell_amount: query.sell_amount,
                gas_price: U256::ZERO,
                value: U256::ZERO,
                price: "2".to_owned(),
                allowance_target: None,
            })
        }

        async fn get_quote(&self, _query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
            Err(AggregationError::for_provider(
                ErrorKind::ProviderUnspecified,
                "counting",
                "unused",
            ))
        }
    }

    fn query(sell_amount: u64) -> PriceQuery {
        PriceQuery {
            buy_token: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            sell_token: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            sell_amount: U256::from(sell_amount),
            chain_id: 1,
            gas_price: None,
            slippage_percentage: None,
            taker_address: None,
            fee_recipient: None,
            buy_token_percentage_fee: None,
        }
    }

    #[tokio::test]
    async fn price_is_cached_per_normalized_query() {
        let counting = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedProvider::new(counting.clone(), Cache::in_memory());

        cached.get_price(&query(1_000_000)).await.unwrap();
        cached.get_price(&query(1_000_000)).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);

        cached.get_price(&query(2_000_000)).await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn registry_resolves_by_name() {
        let registry = Registry::new(vec![Arc::new(Counting {
            calls: AtomicUsize::new(0),
        })]);
        assert!(registry.get("counting").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.iter().count(), 1);
    }
}
