use {
    super::*,
    bigdecimal::BigDecimal,
    chain_client::MockChainClient,
    maplit::hashmap,
    model::{
        address,
        chain::{Catalog, ChainInfo, Token},
        descriptor::{ProviderDescriptor, ProvidersConfig, Spenders},
        quote::PriceQuote,
    },
    providers::CrossChainProvider,
    std::{str::FromStr, sync::Mutex},
    token_info::MockTokenInfoFetching,
};

const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
const TAKER: Address = address!("a0942d8352ffabcc0f6dee32b2b081c703e726a5");
const P1_SPENDER: Address = address!("def1c0ded9bec7f1a1670819833240f027b25eff");
const P2_SPENDER: Address = address!("1111111254eeb25477b68fb85ed929f73a960582");
const XC_SPENDER: Address = address!("ef4fb24ad0916217251f553c0596f8edc630eb66");

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::new([ChainInfo {
        name: "eth".to_owned(),
        chain_id: 1,
        description: String::new(),
        native_token: Token {
            address: WETH,
            name: "Wrapped Ether".to_owned(),
            symbol: "WETH".to_owned(),
            decimals: 18,
        },
        eip1559: true,
    }]))
}

fn descriptors() -> Arc<ProvidersConfig> {
    let spender = |chain_id, market_order| Spenders {
        chain_id,
        market_order: Some(market_order),
        limit_order: None,
    };
    Arc::new(ProvidersConfig {
        providers: vec![
            ProviderDescriptor {
                name: "p1".to_owned(),
                display_name: "Provider One".to_owned(),
                enabled: true,
                spenders: vec![spender(1, P1_SPENDER)],
            },
            ProviderDescriptor {
                name: "p2".to_owned(),
                display_name: "Provider Two".to_owned(),
                enabled: true,
                spenders: vec![spender(1, P2_SPENDER)],
            },
            ProviderDescriptor {
                name: "xc".to_owned(),
                display_name: "Cross Chain".to_owned(),
                enabled: true,
                spenders: vec![spender(1, XC_SPENDER)],
            },
        ],
    })
}

fn quote(provider: &str, buy_amount: u128, gas: u64, gas_price: u64, value: u128) -> PriceQuote {
    PriceQuote {
        provider: provider.to_owned(),
        sources: vec![],
        buy_amount: U256::from(buy_amount),
        gas: U256::from(gas),
        sell_amount: U256::from(1_000_000u64),
        gas_price: U256::from(gas_price),
        value: U256::from(value),
        price: "0.0005".to_owned(),
        allowance_target: None,
    }
}

struct Static {
    name: &'static str,
    outcome: Result<PriceQuote, AggregationError>,
}

#[async_trait::async_trait]
impl Provider for Static {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_price(&self, _query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        self.outcome.clone()
    }

    async fn get_quote(&self, _query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
        Err(AggregationError::for_provider(
            ErrorKind::ProviderUnspecified,
            self.name,
            "no quote in this fixture",
        ))
    }
}

/// Cross-chain stub recording the query it was priced with.
struct StaticCrossChain {
    outcome: PriceQuote,
    seen_gas_price: Mutex<Option<U256>>,
}

#[async_trait::async_trait]
impl CrossChainProvider for StaticCrossChain {
    fn name(&self) -> &'static str {
        "xc"
    }

    fn requires_gas_price(&self) -> bool {
        true
    }

    async fn get_price(
        &self,
        query: &CrossChainPriceQuery,
    ) -> Result<PriceQuote, AggregationError> {
        *self.seen_gas_price.lock().unwrap() = query.gas_price;
        Ok(self.outcome.clone())
    }

    async fn get_quote(&self, _query: &CrossChainQuoteQuery) -> Result<TxQuote, AggregationError> {
        Err(AggregationError::for_provider(
            ErrorKind::ProviderUnspecified,
            "xc",
            "no quote in this fixture",
        ))
    }
}

struct Fixture {
    providers: Vec<Arc<dyn Provider>>,
    crosschain: Vec<Arc<dyn CrossChainProvider>>,
    chain_client: MockChainClient,
    token_info: MockTokenInfoFetching,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            providers: vec![],
            crosschain: vec![],
            chain_client: MockChainClient::new(),
            token_info: MockTokenInfoFetching::new(),
        }
    }
}

impl Fixture {
    fn weth_priced_at_one(mut self) -> Self {
        self.token_info
            .expect_native_price()
            .returning(|_, _| Ok(BigDecimal::from(1)));
        self
    }

    fn service(self) -> MetaAggregationService {
        let clients = ChainClients::new(hashmap! {
            1u64 => Arc::new(self.chain_client) as Arc<dyn ChainClient>,
        });
        let chains = catalog();
        MetaAggregationService::new(
            Arc::new(Registry::new(self.providers)),
            Arc::new(CrossChainRegistry::new(self.crosschain)),
            descriptors(),
            chains.clone(),
            Arc::new(self.token_info),
            GasPriceService::new(chains, clients.clone(), Cache::in_memory()),
            clients,
            Cache::in_memory(),
        )
    }
}

fn price_query() -> PriceQuery {
    PriceQuery {
        buy_token: WETH,
        sell_token: USDC,
        sell_amount: U256::from(1_000_000u64),
        chain_id: 1,
        gas_price: Some(U256::from(20_000_000_000u64)),
        slippage_percentage: None,
        taker_address: None,
        fee_recipient: None,
        buy_token_percentage_fee: None,
    }
}

#[tokio::test]
async fn two_provider_happy_path_ranks_higher_buy_amount() {
    let mut fixture = Fixture::default().weth_priced_at_one();
    fixture.providers = vec![
        Arc::new(Static {
            name: "p1",
            outcome: Ok(quote("p1", 500_000_000_000_000, 150_000, 20_000_000_000, 0)),
        }),
        Arc::new(Static {
            name: "p2",
            outcome: Ok(quote("p2", 510_000_000_000_000, 150_000, 20_000_000_000, 0)),
        }),
    ];
    let result = fixture.service().get_meta_price(&price_query()).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].provider, "p1");
    assert_eq!(result[1].provider, "p2");
    assert_eq!(result[0].is_best, Some(false));
    assert_eq!(result[1].is_best, Some(true));
    for meta in &result {
        assert_eq!(meta.approve_cost, 0);
        assert!(meta.is_allowed);
    }
}

#[tokio::test]
async fn approval_cost_tips_the_scale() {
    let mut fixture = Fixture::default().weth_priced_at_one();
    fixture.providers = vec![
        Arc::new(Static {
            name: "p1",
            outcome: Ok(quote("p1", 500_000_000_000_000, 150_000, 20_000_000_000, 0)),
        }),
        Arc::new(Static {
            name: "p2",
            outcome: Ok(quote("p2", 510_000_000_000_000, 150_000, 20_000_000_000, 0)),
        }),
    ];
    fixture
        .chain_client
        .expect_allowance()
        .returning(|_, _, spender| {
            Ok(if spender == P1_SPENDER {
                U256::MAX
            } else {
                U256::ZERO
            })
        });
    fixture
        .chain_client
        .expect_estimate_approve()
        .withf(|_, _, spender| *spender == P2_SPENDER)
        .returning(|_, _, _| Ok(50_000));

    let mut query = price_query();
    query.taker_address = Some(TAKER);
    let result = fixture.service().get_meta_price(&query).await.unwrap();

    let p1 = &result[0];
    let p2 = &result[1];
    assert_eq!(p1.is_best, Some(true), "approval flips the winner");
    assert_eq!(p2.is_best, Some(false));
    assert_eq!(p2.approve_cost, 50_000);
    assert!(!p2.is_allowed);
    assert!(p1.is_allowed);
}

#[tokio::test]
async fn native_sell_never_probes_allowance() {
    let sell_amount = 1_000_000_000_000_000_000u128;
    let mut fixture = Fixture::default();
    fixture
        .token_info
        .expect_decimals()
        .returning(|_, _| Ok(6));
    fixture
        .token_info
        .expect_native_price()
        .returning(|_, _| Ok(BigDecimal::from_str("0.0005").unwrap()));
    let native_quote = |name: &str| {
        let mut quote = quote(name, 3_000_000_000, 150_000, 20_000_000_000, 0);
        quote.sell_amount = U256::from(sell_amount);
        quote.value = U256::from(sell_amount);
        quote
    };
    fixture.providers = vec![
        Arc::new(Static { name: "p1", outcome: Ok(native_quote("p1")) }),
        Arc::new(Static { name: "p2", outcome: Ok(native_quote("p2")) }),
    ];
    // The chain client mock has no expectations: any allowance or approve
    // call would panic the test.
    let mut query = price_query();
    query.sell_token = model::NATIVE_TOKEN_SENTINEL;
    query.buy_token = USDC;
    query.sell_amount = U256::from(sell_amount);
    query.taker_address = Some(TAKER);

    let result = fixture.service().get_meta_price(&query).await.unwrap();
    assert_eq!(result.len(), 2);
    for meta in &result {
        assert_eq!(meta.price_response.value, U256::from(sell_amount));
        assert_eq!(meta.approve_cost, 0);
        assert!(meta.is_allowed);
    }
    assert_eq!(
        result.iter().filter(|meta| meta.is_best == Some(true)).count(),
        1
    );
}

#[tokio::test]
async fn failing_provider_is_dropped_not_fatal() {
    let mut fixture = Fixture::default().weth_priced_at_one();
    fixture.providers = vec![
        Arc::new(Static {
            name: "p1",
            outcome: Err(AggregationError::timeout("p1", "deadline exceeded")),
        }),
        Arc::new(Static {
            name: "p2",
            outcome: Ok(quote("p2", 510_000_000_000_000, 180_000, 20_000_000_000, 0)),
        }),
    ];
    let result = fixture.service().get_meta_price(&price_query()).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].provider, "p2");
    assert_eq!(result[0].is_best, Some(true));
}

#[tokio::test]
async fn all_providers_failing_is_no_prices_found() {
    let mut fixture = Fixture::default().weth_priced_at_one();
    fixture.providers = vec![
        Arc::new(Static {
            name: "p1",
            outcome: Err(AggregationError::timeout("p1", "deadline exceeded")),
        }),
        Arc::new(Static {
            name: "p2",
            outcome: Err(AggregationError::parse("p2", "missing field `buyAmount`")),
        }),
    ];
    let err = fixture.service().get_meta_price(&price_query()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProviderUnspecified);
    assert_eq!(err.message, "No prices found");
    assert_eq!(err.status(), 409);
}

#[tokio::test]
async fn unknown_provider_is_reported_as_such() {
    let fixture = Fixture::default();
    let service = fixture.service();
    let err = service
        .get_provider_price("nope", &price_query())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProviderNotFound);

    let quote_query = QuoteQuery {
        buy_token: WETH,
        sell_token: USDC,
        sell_amount: U256::from(1_000_000u64),
        chain_id: 1,
        taker_address: TAKER,
        gas_price: None,
        slippage_percentage: None,
        fee_recipient: None,
        buy_token_percentage_fee: None,
        ignore_checks: false,
    };
    let err = service
        .get_meta_swap_quote("nope", &quote_query)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ProviderNotFound);
}

#[tokio::test]
async fn provider_price_without_spender_fails_when_probe_is_needed() {
    let mut fixture = Fixture::default();
    fixture.providers = vec![Arc::new(Static {
        name: "p1",
        outcome: Ok(quote("p1", 1, 1, 1, 0)),
    })];
    let mut query = price_query();
    query.chain_id = 1;
    query.taker_address = Some(TAKER);
    // `p1` has no spender on some other chain; simulate by asking for a
    // provider that exists but has no spender there.
    query.chain_id = 137;
    let err = fixture
        .service()
        .get_provider_price("p1", &query)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::SpenderAddressNotFound);
}

#[tokio::test]
async fn crosschain_price_resolves_gas_and_falls_back_to_descriptor_spender() {
    let crosschain = Arc::new(StaticCrossChain {
        outcome: quote("xc", 500_000_000_000_000, 0, 0, 0),
        seen_gas_price: Mutex::new(None),
    });
    let mut fixture = Fixture::default();
    fixture.crosschain = vec![crosschain.clone() as Arc<dyn CrossChainProvider>];
    fixture
        .chain_client
        .expect_gas_price()
        .returning(|| Ok(U256::from(20_000_000_000u64)));
    fixture
        .chain_client
        .expect_allowance()
        .withf(|_, _, spender| *spender == XC_SPENDER)
        .returning(|_, _, _| Ok(U256::ZERO));
    fixture
        .chain_client
        .expect_estimate_approve()
        .withf(|_, _, spender| *spender == XC_SPENDER)
        .returning(|_, _, _| Ok(30_000));

    let query = CrossChainPriceQuery {
        buy_token: WETH,
        sell_token: USDC,
        sell_amount: U256::from(1_000_000u64),
        chain_id_from: 1,
        chain_id_to: 137,
        gas_price: None,
        slippage_percentage: None,
        taker_address: Some(TAKER),
        fee_recipient: None,
        buy_token_percentage_fee: None,
    };
    let meta = fixture
        .service()
        .get_crosschain_provider_price("xc", &query)
        .await
        .unwrap();

    assert_eq!(
        *crosschain.seen_gas_price.lock().unwrap(),
        Some(U256::from(20_000_000_000u64)),
        "gas price was resolved before quoting"
    );
    assert_eq!(meta.approve_cost, 30_000);
    assert!(!meta.is_allowed);
    assert_eq!(meta.is_best, None);
}

#[tokio::test]
async fn meta_price_result_is_cached_briefly() {
    let mut fixture = Fixture::default().weth_priced_at_one();
    fixture.providers = vec![Arc::new(Static {
        name: "p1",
        outcome: Ok(quote("p1", 500_000_000_000_000, 150_000, 20_000_000_000, 0)),
    })];
    let service = fixture.service();
    let first = service.get_meta_price(&price_query()).await.unwrap();
    let second = service.get_meta_price(&price_query()).await.unwrap();
    assert_eq!(first, second);
}
