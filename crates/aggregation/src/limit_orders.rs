//! Limit-order facade: a thin router over the adapters that expose an
//! order book. Payloads travel through verbatim, the facade only resolves
//! the adapter and enforces the capability.

use {
    errors::{AggregationError, ErrorKind},
    model::{Address, quote::LimitOrderPayload},
    providers::{LimitOrderProviding, Provider, Registry},
    serde_json::Value,
    std::sync::Arc,
};

pub struct LimitOrders {
    registry: Arc<Registry>,
}

impl LimitOrders {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    fn adapter(&self, provider: &str) -> Result<Arc<dyn Provider>, AggregationError> {
        self.registry
            .get(provider)
            .ok_or_else(|| AggregationError::provider_not_found(provider))
    }

    pub async fn list_by_trader(
        &self,
        chain_id: u64,
        provider: &str,
        trader: Address,
        maker_token: Option<Address>,
        taker_token: Option<Address>,
        statuses: Option<Vec<String>>,
    ) -> Result<Value, AggregationError> {
        let adapter = self.adapter(provider)?;
        let orders = limit_capability(provider, adapter.as_ref())?;
        tracing::info!(provider, trader = %format!("{trader:#x}"), "listing limit orders");
        let result = orders
            .orders_by_trader(chain_id, trader, maker_token, taker_token, statuses)
            .await?;
        tracing::info!(
            provider,
            count = result.as_array().map(|orders| orders.len()).unwrap_or_default(),
            "listed limit orders"
        );
        Ok(result)
    }

    pub async fn get_by_hash(
        &self,
        chain_id: u64,
        provider: &str,
        order_hash: &str,
    ) -> Result<Value, AggregationError> {
        let adapter = self.adapter(provider)?;
        let orders = limit_capability(provider, adapter.as_ref())?;
        tracing::info!(provider, order_hash, "fetching limit order");
        orders.order_by_hash(chain_id, order_hash).await
    }

    pub async fn submit(
        &self,
        chain_id: u64,
        provider: &str,
        order_hash: &str,
        signature: &str,
        payload: &LimitOrderPayload,
    ) -> Result<Value, AggregationError> {
        let adapter = self.adapter(provider)?;
        let orders = limit_capability(provider, adapter.as_ref())?;
        tracing::info!(provider, order_hash, "posting limit order");
        orders
            .post_order(chain_id, order_hash, signature, payload)
            .await
    }
}

fn limit_capability<'a>(
    provider: &str,
    adapter: &'a dyn Provider,
) -> Result<&'a dyn LimitOrderProviding, AggregationError> {
    adapter.limit_orders().ok_or_else(|| {
        AggregationError::new(
            ErrorKind::ProviderNotFound,
            format!("provider {provider} does not support limit orders"),
        )
    })
}
