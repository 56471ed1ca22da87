//! The price-aggregation engine.
//!
//! One request fans out concurrently to every market-order provider on the
//! chain plus the supporting lookups (allowance probes, token decimals,
//! buy-token native price, base gas price), collects per-provider outcomes
//! as values, discards failures, and ranks the survivors with the exact
//! profit model in [`profit`]. One provider being slow or broken never
//! poisons the aggregate; it is simply absent from the result.

pub mod limit_orders;
mod profit;

pub use limit_orders::LimitOrders;

use {
    bigdecimal::BigDecimal,
    cache::{Cache, Key},
    chain_client::{ChainClient, ChainClients, Error as NodeError},
    errors::{AggregationError, ErrorKind},
    futures::future::join_all,
    gas_price::GasPriceService,
    model::{
        Address, U256,
        chain::{Catalog, ChainInfo},
        descriptor::{ProvidersConfig, SpenderEntry},
        is_native_token,
        quote::{MetaPrice, PriceQuote, TxQuote},
    },
    providers::{
        CrossChainPriceQuery, CrossChainQuoteQuery, CrossChainRegistry, PriceQuery, Provider,
        QuoteQuery, Registry,
    },
    std::{collections::HashMap, sync::Arc, time::Duration},
    token_info::TokenInfoFetching,
};

const ALLOWANCE_CACHE_TTL: Duration = Duration::from_secs(5);
const APPROVE_CACHE_TTL: Duration = Duration::from_secs(5);
const DECIMALS_CACHE_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const META_PRICE_CACHE_TTL: Duration = Duration::from_secs(5);

pub struct MetaAggregationService {
    registry: Arc<Registry>,
    crosschain_registry: Arc<CrossChainRegistry>,
    descriptors: Arc<ProvidersConfig>,
    chains: Arc<Catalog>,
    token_info: Arc<dyn TokenInfoFetching>,
    gas: GasPriceService,
    chain_clients: ChainClients,
    cache: Cache,
}

impl MetaAggregationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry>,
        crosschain_registry: Arc<CrossChainRegistry>,
        descriptors: Arc<ProvidersConfig>,
        chains: Arc<Catalog>,
        token_info: Arc<dyn TokenInfoFetching>,
        gas: GasPriceService,
        chain_clients: ChainClients,
        cache: Cache,
    ) -> Self {
        Self {
            registry,
            crosschain_registry,
            descriptors,
            chains,
            token_info,
            gas,
            chain_clients,
            cache,
        }
    }

    /// Prices the swap on every market-order provider of the chain and
    /// marks the most profitable one. Results are cached briefly, keyed by
    /// the full normalized request.
    pub async fn get_meta_price(
        &self,
        query: &PriceQuery,
    ) -> Result<Vec<MetaPrice>, AggregationError> {
        let key = Key::new("aggregation::get_meta_price")
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
            .kwarg_opt("fee", query.buy_token_percentage_fee.as_ref());
        self.cache
            .memoize(key, META_PRICE_CACHE_TTL, || self.compute_meta_price(query))
            .await
    }

    async fn compute_meta_price(
        &self,
        query: &PriceQuery,
    ) -> Result<Vec<MetaPrice>, AggregationError> {
        let chain = self.chain(query.chain_id)?;
        let adapters = self.market_order_adapters(query.chain_id)?;

        let approve_costs = self.approve_costs_per_provider(query, &adapters);
        let decimals = self.decimals_for_buy_token(chain, query.buy_token);
        let buy_token_price = self.buy_token_native_price(chain, query.buy_token);
        let quotes = async {
            let gas_price = match query.gas_price {
                Some(gas_price) => gas_price,
                None => self.gas.base_gas_price(query.chain_id).await?,
            };
            let priced_query = PriceQuery {
                gas_price: Some(gas_price),
                ..query.clone()
            };
            let outcomes = join_all(adapters.iter().map(|(entry, adapter)| {
                let priced_query = &priced_query;
                async move { (entry.name.clone(), adapter.get_price(priced_query).await) }
            }))
            .await;
            Ok::<_, AggregationError>(outcomes)
        };

        let (approve_costs, decimals, buy_token_price, quotes) =
            futures::join!(approve_costs, decimals, buy_token_price, quotes);

        let mut successes: Vec<(String, PriceQuote)> = Vec::new();
        for (name, outcome) in quotes? {
            match outcome {
                Ok(quote) => successes.push((name, quote)),
                Err(err) if err.is_parse() => {
                    tracing::error!(provider = %name, %err, reason = %err.message, "provider response did not decode")
                }
                Err(err) => {
                    tracing::warn!(provider = %name, %err, reason = %err.message, "provider dropped from aggregation")
                }
            }
        }
        if successes.is_empty() {
            tracing::error!(
                chain_id = query.chain_id,
                buy_token = %format!("{:#x}", query.buy_token),
                sell_token = %format!("{:#x}", query.sell_token),
                "no prices found"
            );
            return Err(AggregationError::new(
                ErrorKind::ProviderUnspecified,
                "No prices found",
            ));
        }

        let approve_costs = approve_costs?;
        let (native_decimals, buy_token_decimals) = decimals?;
        let buy_token_price = buy_token_price?;

        let candidates: Vec<profit::Candidate> = successes
            .iter()
            .map(|(name, quote)| profit::Candidate {
                quote,
                approve_cost: approve_costs.get(name).copied().unwrap_or(0),
            })
            .collect();
        let best = profit::choose_best(
            &candidates,
            native_decimals,
            buy_token_decimals,
            &buy_token_price,
        );
        if let Some(index) = best {
            tracing::info!(
                chain_id = query.chain_id,
                best_provider = %successes[index].0,
                "ranked swap prices"
            );
        }

        Ok(successes
            .into_iter()
            .enumerate()
            .map(|(index, (provider, quote))| {
                let approve_cost = approve_costs.get(&provider).copied().unwrap_or(0);
                MetaPrice {
                    provider,
                    price_response: quote,
                    is_allowed: approve_cost == 0,
                    is_best: Some(best == Some(index)),
                    approve_cost,
                }
            })
            .collect())
    }

    /// Single-provider variant of [`Self::get_meta_price`]; no ranking.
    pub async fn get_provider_price(
        &self,
        provider: &str,
        query: &PriceQuery,
    ) -> Result<MetaPrice, AggregationError> {
        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| AggregationError::provider_not_found(provider))?;
        let gas_price = match query.gas_price {
            Some(gas_price) => gas_price,
            None => self.gas.base_gas_price(query.chain_id).await?,
        };
        let spender = self
            .descriptors
            .market_order_spender(provider, query.chain_id);
        let approve_cost = self
            .approve_cost_for_spender(query, provider, spender)
            .await?;
        let priced_query = PriceQuery {
            gas_price: Some(gas_price),
            ..query.clone()
        };
        let quote = adapter.get_price(&priced_query).await?;
        Ok(MetaPrice {
            provider: provider.to_owned(),
            price_response: quote,
            is_allowed: approve_cost == 0,
            is_best: None,
            approve_cost,
        })
    }

    /// Dispatches a committed-quote request to one adapter. No ranking, no
    /// allowance probe; the taker is part of the query by construction.
    pub async fn get_meta_swap_quote(
        &self,
        provider: &str,
        query: &QuoteQuery,
    ) -> Result<TxQuote, AggregationError> {
        let adapter = self
            .registry
            .get(provider)
            .ok_or_else(|| AggregationError::provider_not_found(provider))?;
        adapter.get_quote(query).await
    }

    pub async fn get_crosschain_provider_price(
        &self,
        provider: &str,
        query: &CrossChainPriceQuery,
    ) -> Result<MetaPrice, AggregationError> {
        let adapter = self
            .crosschain_registry
            .get(provider)
            .ok_or_else(|| AggregationError::provider_not_found(provider))?;
        let mut query = query.clone();
        if adapter.requires_gas_price() && query.gas_price.is_none() {
            query.gas_price = Some(self.gas.base_gas_price(query.chain_id_from).await?);
        }
        let quote = adapter.get_price(&query).await?;

        // A cross-chain adapter may name its own spender; otherwise the
        // descriptor's source-chain spender applies.
        let spender = quote.allowance_target.or_else(|| {
            self.descriptors
                .market_order_spender(provider, query.chain_id_from)
        });
        let single_chain_view = PriceQuery {
            buy_token: query.buy_token,
            sell_token: query.sell_token,
            sell_amount: query.sell_amount,
            chain_id: query.chain_id_from,
            gas_price: query.gas_price,
            slippage_percentage: query.slippage_percentage,
            taker_address: query.taker_address,
            fee_recipient: query.fee_recipient,
            buy_token_percentage_fee: query.buy_token_percentage_fee,
        };
        let approve_cost = self
            .approve_cost_for_spender(&single_chain_view, provider, spender)
            .await?;
        Ok(MetaPrice {
            provider: provider.to_owned(),
            price_response: quote,
            is_allowed: approve_cost == 0,
            is_best: None,
            approve_cost,
        })
    }

    pub async fn get_crosschain_meta_swap_quote(
        &self,
        provider: &str,
        query: &CrossChainQuoteQuery,
    ) -> Result<TxQuote, AggregationError> {
        let adapter = self
            .crosschain_registry
            .get(provider)
            .ok_or_else(|| AggregationError::provider_not_found(provider))?;
        let mut query = query.clone();
        if adapter.requires_gas_price() && query.gas_price.is_none() {
            query.gas_price = Some(self.gas.base_gas_price(query.chain_id_from).await?);
        }
        adapter.get_quote(&query).await
    }

    fn chain(&self, chain_id: u64) -> Result<&ChainInfo, AggregationError> {
        self.chains.by_id(chain_id).ok_or_else(|| {
            AggregationError::new(
                ErrorKind::ValidationFailed,
                format!("chain {chain_id} is not supported"),
            )
        })
    }

    /// Market-order providers on the chain, in descriptor order, joined
    /// with their adapters. Descriptors without a registered adapter are
    /// skipped.
    fn market_order_adapters(
        &self,
        chain_id: u64,
    ) -> Result<Vec<(SpenderEntry, Arc<dyn Provider>)>, AggregationError> {
        let adapters: Vec<_> = self
            .descriptors
            .on_chain(chain_id)
            .market_order
            .into_iter()
            .filter_map(|entry| {
                let adapter = self.registry.get(&entry.name)?;
                Some((entry, adapter))
            })
            .collect();
        if adapters.is_empty() {
            return Err(AggregationError::new(
                ErrorKind::ValidationFailed,
                format!("no market-order providers configured for chain {chain_id}"),
            ));
        }
        Ok(adapters)
    }

    /// Per-provider approval gas. Without a taker there is nothing to
    /// probe; selling the native coin never needs an approval.
    async fn approve_costs_per_provider(
        &self,
        query: &PriceQuery,
        adapters: &[(SpenderEntry, Arc<dyn Provider>)],
    ) -> Result<HashMap<String, u64>, AggregationError> {
        let mut costs = HashMap::new();
        let probe = match query.taker_address {
            Some(taker) if !is_native_token(query.sell_token) => Some(taker),
            _ => None,
        };
        let Some(taker) = probe else {
            for (entry, _) in adapters {
                costs.insert(entry.name.clone(), 0);
            }
            return Ok(costs);
        };
        for (entry, _) in adapters {
            let allowance = self
                .token_allowance(query.chain_id, query.sell_token, entry.address, taker)
                .await?;
            let cost = if allowance < query.sell_amount {
                self.approve_cost(query.chain_id, query.sell_token, taker, entry.address)
                    .await?
            } else {
                0
            };
            costs.insert(entry.name.clone(), cost);
        }
        Ok(costs)
    }

    /// The one-spender version used by the single-provider paths. Only
    /// fails on a missing spender when a probe is actually needed.
    async fn approve_cost_for_spender(
        &self,
        query: &PriceQuery,
        provider: &str,
        spender: Option<Address>,
    ) -> Result<u64, AggregationError> {
        let Some(taker) = query.taker_address else {
            return Ok(0);
        };
        if is_native_token(query.sell_token) {
            return Ok(0);
        }
        let spender = spender.ok_or_else(|| {
            AggregationError::for_provider(
                ErrorKind::SpenderAddressNotFound,
                provider,
                format!("no spender address on chain {}", query.chain_id),
            )
        })?;
        let allowance = self
            .token_allowance(query.chain_id, query.sell_token, spender, taker)
            .await?;
        if allowance < query.sell_amount {
            self.approve_cost(query.chain_id, query.sell_token, taker, spender)
                .await
        } else {
            Ok(0)
        }
    }

    async fn token_allowance(
        &self,
        chain_id: u64,
        token: Address,
        spender: Address,
        owner: Address,
    ) -> Result<U256, AggregationError> {
        let key = Key::new("aggregation::token_allowance")
            .arg(&chain_id)
            .arg(&format!("{token:#x}"))
            .arg(&format!("{spender:#x}"))
            .arg(&format!("{owner:#x}"));
        self.cache
            .memoize(key, ALLOWANCE_CACHE_TTL, || async {
                tracing::debug!(token = %format!("{token:#x}"), "reading allowance");
                self.node(chain_id)?
                    .allowance(token, owner, spender)
                    .await
                    .map_err(|err| node_error(chain_id, err))
            })
            .await
    }

    async fn approve_cost(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<u64, AggregationError> {
        let key = Key::new("aggregation::approve_cost")
            .arg(&chain_id)
            .arg(&format!("{token:#x}"))
            .arg(&format!("{owner:#x}"))
            .arg(&format!("{spender:#x}"));
        self.cache
            .memoize(key, APPROVE_CACHE_TTL, || async {
                tracing::debug!(owner = %format!("{owner:#x}"), "estimating approve");
                self.node(chain_id)?
                    .estimate_approve(token, owner, spender)
                    .await
                    .map_err(|err| {
                        AggregationError::new(ErrorKind::EstimationFailed, err.to_string())
                            .with_detail("chain_id", chain_id)
                    })
            })
            .await
    }

    /// Native and buy-token decimals. The native sentinel and the
    /// wrapped-native contract short-circuit to the chain's own decimals;
    /// anything else is fetched and cached for a long time, token decimals
    /// do not change.
    async fn decimals_for_buy_token(
        &self,
        chain: &ChainInfo,
        buy_token: Address,
    ) -> Result<(u8, u8), AggregationError> {
        let native_decimals = chain.native_token.decimals;
        if is_native_token(buy_token) || buy_token == chain.wrapped_native() {
            return Ok((native_decimals, native_decimals));
        }
        let chain_id = chain.chain_id;
        let key = Key::new("aggregation::buy_token_decimals")
            .arg(&chain_id)
            .arg(&format!("{buy_token:#x}"));
        let buy_decimals = self
            .cache
            .memoize(key, DECIMALS_CACHE_TTL, || async {
                self.token_info
                    .decimals(chain_id, buy_token)
                    .await
                    .map_err(token_info_error)
            })
            .await?;
        Ok((native_decimals, buy_decimals))
    }

    /// Buy-token price denominated in the native coin. The sentinel is
    /// replaced by the wrapped-native contract before asking the token
    /// source.
    async fn buy_token_native_price(
        &self,
        chain: &ChainInfo,
        buy_token: Address,
    ) -> Result<BigDecimal, AggregationError> {
        let token = if is_native_token(buy_token) {
            chain.wrapped_native()
        } else {
            buy_token
        };
        self.token_info
            .native_price(chain.chain_id, token)
            .await
            .map_err(token_info_error)
    }

    fn node(&self, chain_id: u64) -> Result<Arc<dyn ChainClient>, AggregationError> {
        self.chain_clients.get(chain_id).ok_or_else(|| {
            AggregationError::new(
                ErrorKind::ValidationFailed,
                format!("no rpc endpoint configured for chain {chain_id}"),
            )
        })
    }
}

fn node_error(chain_id: u64, err: NodeError) -> AggregationError {
    let kind = match err {
        NodeError::Timeout => ErrorKind::ProviderTimeout,
        _ => ErrorKind::ProviderUnspecified,
    };
    AggregationError::new(kind, err.to_string()).with_detail("chain_id", chain_id)
}

fn token_info_error(err: token_info::Error) -> AggregationError {
    let kind = match err {
        token_info::Error::Timeout => ErrorKind::ProviderTimeout,
        _ => ErrorKind::ProviderUnspecified,
    };
    AggregationError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests;
