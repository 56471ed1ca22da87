//! Gas pricing per chain.
//!
//! EIP-1559 chains are priced from recent fee history: the next block's base
//! fee plus three priority tiers taken as the mean of the 60th, 75th and
//! 90th percentile rewards over the last four blocks. Chains without
//! EIP-1559 get the node's gas price in every tier. Results are cached for
//! five seconds; read timeouts are retried.

use {
    alloy_primitives::U256,
    cache::{Cache, Key},
    chain_client::{ChainClient, ChainClients, Error as NodeError, FeeHistory},
    errors::{AggregationError, ErrorKind},
    model::{
        chain::Catalog,
        gas::{Eip1559Tier, Eip1559Tiers, GasReport, LegacyTiers},
    },
    std::{sync::Arc, time::Duration},
};

pub const GAS_SOURCE: &str = "DEXGURU";

const CACHE_TTL: Duration = Duration::from_secs(5);
const FEE_HISTORY_BLOCKS: u64 = 4;
const REWARD_PERCENTILES: [f64; 3] = [60., 75., 90.];
const TIMEOUT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct GasPriceService {
    chains: Arc<Catalog>,
    clients: ChainClients,
    cache: Cache,
}

impl GasPriceService {
    pub fn new(chains: Arc<Catalog>, clients: ChainClients, cache: Cache) -> Self {
        Self {
            chains,
            clients,
            cache,
        }
    }

    /// The full tiered report for one chain.
    pub async fn gas_prices(&self, chain_id: u64) -> Result<GasReport, AggregationError> {
        let key = Key::new("gas_price::gas_prices").arg(&chain_id);
        self.cache
            .memoize(key, CACHE_TTL, || self.fetch_gas_prices(chain_id))
            .await
    }

    /// The single wei number the aggregation engine plugs into quotes when
    /// the caller did not pin a gas price.
    pub async fn base_gas_price(&self, chain_id: u64) -> Result<U256, AggregationError> {
        let key = Key::new("gas_price::base_gas_price").arg(&chain_id);
        self.cache
            .memoize(key, CACHE_TTL, || async {
                let client = self.client(chain_id)?;
                retry_on_timeout(|| client.gas_price())
                    .await
                    .map_err(|err| node_error(chain_id, err))
            })
            .await
    }

    async fn fetch_gas_prices(&self, chain_id: u64) -> Result<GasReport, AggregationError> {
        tracing::debug!(chain_id, "fetching gas prices");
        let eip1559 = self
            .chains
            .by_id(chain_id)
            .ok_or_else(|| unknown_chain(chain_id))?
            .eip1559;
        let client = self.client(chain_id)?;
        if eip1559 {
            let history = retry_on_timeout(|| {
                client.fee_history(FEE_HISTORY_BLOCKS, REWARD_PERCENTILES.to_vec())
            })
            .await
            .map_err(|err| node_error(chain_id, err))?;
            if let Some(report) = eip1559_report(&history) {
                return Ok(report);
            }
            // Nodes occasionally answer with empty history right after a
            // restart; price like a legacy chain then.
            tracing::warn!(chain_id, "empty fee history, falling back to legacy pricing");
        }
        let gas_price = retry_on_timeout(|| client.gas_price())
            .await
            .map_err(|err| node_error(chain_id, err))?;
        Ok(legacy_report(gas_price))
    }

    fn client(&self, chain_id: u64) -> Result<Arc<dyn ChainClient>, AggregationError> {
        self.clients
            .get(chain_id)
            .ok_or_else(|| unknown_chain(chain_id))
    }
}

fn unknown_chain(chain_id: u64) -> AggregationError {
    AggregationError::new(
        ErrorKind::ValidationFailed,
        format!("chain {chain_id} is not supported"),
    )
}

fn node_error(chain_id: u64, err: NodeError) -> AggregationError {
    AggregationError::new(ErrorKind::ProviderUnspecified, err.to_string())
        .with_detail("chain_id", chain_id)
}

async fn retry_on_timeout<T, F, Fut>(mut op: F) -> Result<T, NodeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NodeError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(NodeError::Timeout) if attempt < TIMEOUT_ATTEMPTS => {
                tracing::debug!(attempt, "node read timed out, retrying");
            }
            other => return other,
        }
    }
}

/// Builds the three-tier EIP-1559 report, or `None` when the history has no
/// usable rows.
fn eip1559_report(history: &FeeHistory) -> Option<GasReport> {
    let base_fee = *history.base_fee_per_gas.last()?;
    let tier = |percentile: usize| {
        let rewards: Vec<U256> = history
            .reward
            .iter()
            .filter_map(|row| row.get(percentile).copied())
            .collect();
        let priority = mean(&rewards)?;
        Some(Eip1559Tier {
            max_fee: base_fee + priority,
            base_fee,
            max_priority_fee: priority,
        })
    };
    Some(GasReport {
        source: GAS_SOURCE.to_owned(),
        timestamp: chrono::Utc::now().timestamp(),
        eip1559: Some(Eip1559Tiers {
            fast: tier(0)?,
            instant: tier(1)?,
            overkill: tier(2)?,
        }),
        legacy: None,
    })
}

fn legacy_report(gas_price: U256) -> GasReport {
    GasReport {
        source: GAS_SOURCE.to_owned(),
        timestamp: chrono::Utc::now().timestamp(),
        eip1559: None,
        legacy: Some(LegacyTiers {
            fast: gas_price,
            instant: gas_price,
            overkill: gas_price,
        }),
    }
}

fn mean(values: &[U256]) -> Option<U256> {
    if values.is_empty() {
        return None;
    }
    let sum: U256 = values.iter().fold(U256::ZERO, |acc, value| acc + value);
    Some(sum / U256::from(values.len()))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        chain_client::MockChainClient,
        model::chain::{ChainInfo, Token},
        std::collections::HashMap,
    };

    fn chain(chain_id: u64, eip1559: bool) -> ChainInfo {
        ChainInfo {
            name: format!("chain-{chain_id}"),
            chain_id,
            description: String::new(),
            native_token: Token {
                address: model::NATIVE_TOKEN_SENTINEL,
                name: "Native".to_owned(),
                symbol: "NAT".to_owned(),
                decimals: 18,
            },
            eip1559,
        }
    }

    fn service(chain_id: u64, eip1559: bool, client: MockChainClient) -> GasPriceService {
        let clients = ChainClients::new(HashMap::from([(
            chain_id,
            Arc::new(client) as Arc<dyn ChainClient>,
        )]));
        GasPriceService::new(
            Arc::new(Catalog::new([chain(chain_id, eip1559)])),
            clients,
            Cache::in_memory(),
        )
    }

    fn rewards(rows: &[[u64; 3]]) -> Vec<Vec<U256>> {
        rows.iter()
            .map(|row| row.iter().map(|tip| U256::from(*tip)).collect())
            .collect()
    }

    #[tokio::test]
    async fn eip1559_tiers_from_fee_history() {
        let mut client = MockChainClient::new();
        client.expect_fee_history().returning(|_, _| {
            Ok(FeeHistory {
                base_fee_per_gas: [10u64, 20, 30, 40, 50].map(U256::from).to_vec(),
                reward: rewards(&[[1, 2, 3], [1, 2, 3], [1, 2, 3], [1, 2, 3]]),
            })
        });
        let report = service(1, true, client).gas_prices(1).await.unwrap();
        assert_eq!(report.source, GAS_SOURCE);
        let tiers = report.eip1559.unwrap();
        assert_eq!(tiers.fast.base_fee, U256::from(50));
        assert_eq!(tiers.fast.max_priority_fee, U256::from(1));
        assert_eq!(tiers.fast.max_fee, U256::from(51));
        assert_eq!(tiers.instant.max_fee, U256::from(52));
        assert_eq!(tiers.overkill.max_fee, U256::from(53));
    }

    #[tokio::test]
    async fn short_fee_history_still_prices_three_tiers() {
        let mut client = MockChainClient::new();
        client.expect_fee_history().returning(|_, _| {
            Ok(FeeHistory {
                base_fee_per_gas: [100u64, 110].map(U256::from).to_vec(),
                reward: rewards(&[[2, 4, 6], [4, 6, 8]]),
            })
        });
        let report = service(1, true, client).gas_prices(1).await.unwrap();
        let tiers = report.eip1559.unwrap();
        assert_eq!(tiers.fast.max_priority_fee, U256::from(3));
        assert_eq!(tiers.instant.max_priority_fee, U256::from(5));
        assert_eq!(tiers.overkill.max_priority_fee, U256::from(7));
        assert_eq!(tiers.overkill.max_fee, U256::from(117));
    }

    #[tokio::test]
    async fn empty_fee_history_falls_back_to_legacy() {
        let mut client = MockChainClient::new();
        client.expect_fee_history().returning(|_, _| {
            Ok(FeeHistory {
                base_fee_per_gas: vec![U256::from(100u64)],
                reward: vec![],
            })
        });
        client
            .expect_gas_price()
            .returning(|| Ok(U256::from(30_000_000_000u64)));
        let report = service(1, true, client).gas_prices(1).await.unwrap();
        assert!(report.eip1559.is_none());
        let tiers = report.legacy.unwrap();
        assert_eq!(tiers.fast, U256::from(30_000_000_000u64));
        assert_eq!(tiers.fast, tiers.overkill);
    }

    #[tokio::test]
    async fn legacy_chain_prices_every_tier_the_same() {
        let mut client = MockChainClient::new();
        client
            .expect_gas_price()
            .returning(|| Ok(U256::from(5_000_000_000u64)));
        let report = service(56, false, client).gas_prices(56).await.unwrap();
        let tiers = report.legacy.unwrap();
        assert_eq!(tiers.instant, U256::from(5_000_000_000u64));
    }

    #[tokio::test]
    async fn base_gas_price_retries_timeouts() {
        let mut client = MockChainClient::new();
        client
            .expect_gas_price()
            .times(2)
            .returning(|| Err(NodeError::Timeout));
        client
            .expect_gas_price()
            .returning(|| Ok(U256::from(7u64)));
        let price = service(1, true, client).base_gas_price(1).await.unwrap();
        assert_eq!(price, U256::from(7u64));
    }

    #[tokio::test]
    async fn persistent_timeout_surfaces_as_provider_unspecified() {
        let mut client = MockChainClient::new();
        client
            .expect_gas_price()
            .returning(|| Err(NodeError::Timeout));
        let err = service(1, false, client).gas_prices(1).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProviderUnspecified);
    }

    #[tokio::test]
    async fn unknown_chain_is_a_validation_error() {
        let err = service(1, true, MockChainClient::new())
            .gas_prices(42)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
    }
}
