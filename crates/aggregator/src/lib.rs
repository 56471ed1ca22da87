//! Service wiring: configuration, catalogs, registries, and the HTTP API.

pub mod api;
pub mod arguments;
pub mod observe;

use {
    aggregation::{LimitOrders, MetaAggregationService},
    anyhow::Context,
    arguments::{Arguments, CacheBackend},
    cache::{Cache, RedisStorage},
    chain_client::{ChainClient, ChainClients, RpcChainClient},
    gas_price::GasPriceService,
    model::{chain::Catalog, descriptor::ProvidersConfig},
    providers::{
        CachedProvider, CrossChainProvider, CrossChainRegistry, Provider, Registry,
        bebop::Bebop, debridge::Debridge, kyberswap::KyberSwap, lifi::LiFi, oneinch::OneInch,
        openocean::OpenOcean, paraswap::ParaSwap, sifi::Sifi, zeroex::ZeroEx,
    },
    std::{sync::Arc, time::Duration},
    token_info::{HttpTokenInfo, TokenInfoFetching},
};

const NODE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(args: Arguments) -> anyhow::Result<()> {
    observe::init(&args.log_filter, args.log_json);
    tracing::info!(?args.bind_addr, "starting aggregator");

    // One connection pool for every outbound call; proxies come from the
    // environment.
    let client = reqwest::Client::builder()
        .build()
        .context("building the shared http client")?;

    let cache = match args.cache_backend {
        CacheBackend::Memory => Cache::in_memory(),
        CacheBackend::Redis => {
            let url = args
                .redis_url
                .as_deref()
                .context("--redis-url is required with the redis cache backend")?;
            Cache::new(Arc::new(
                RedisStorage::connect(url)
                    .await
                    .context("connecting to redis")?,
            ))
        }
    };

    let token_info: Arc<dyn TokenInfoFetching> = Arc::new(HttpTokenInfo::new(
        client.clone(),
        args.token_api_url.clone(),
        args.token_api_key.clone(),
        NODE_TIMEOUT,
    ));
    let chains = Arc::new(Catalog::new(
        token_info
            .list_chains()
            .await
            .context("fetching the chain catalog")?,
    ));
    tracing::info!(chains = chains.iter().count(), "loaded chain catalog");

    let chain_clients = ChainClients::new(
        args.rpc_urls
            .iter()
            .map(|endpoint| {
                let node: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(
                    client.clone(),
                    endpoint.url.clone(),
                    NODE_TIMEOUT,
                ));
                (endpoint.chain_id, node)
            })
            .collect(),
    );

    let descriptors: Arc<ProvidersConfig> = Arc::new(
        toml::from_str(
            &std::fs::read_to_string(&args.providers_config)
                .with_context(|| format!("reading {}", args.providers_config.display()))?,
        )
        .context("parsing the provider descriptor file")?,
    );

    let timeout = args.provider_timeout;
    let adapters: Vec<Arc<dyn Provider>> = vec![
        Arc::new(ZeroEx::new(client.clone(), chains.clone()).with_timeout(timeout)),
        Arc::new(OneInch::new(client.clone(), args.oneinch_api_key.clone()).with_timeout(timeout)),
        Arc::new(ParaSwap::new(client.clone(), args.partner.clone()).with_timeout(timeout)),
        Arc::new(OpenOcean::new(client.clone()).with_timeout(timeout)),
        Arc::new(
            KyberSwap::new(client.clone(), chains.clone(), args.partner.clone())
                .with_timeout(timeout),
        ),
        Arc::new(
            Bebop::new(
                client.clone(),
                chains.clone(),
                args.bebop_api_key.clone(),
                args.partner.clone(),
            )
            .with_timeout(timeout),
        ),
        Arc::new(Sifi::new(client.clone()).with_timeout(timeout)),
    ];
    let adapters = adapters
        .into_iter()
        .filter(|adapter| descriptors.get(adapter.name()).is_some())
        .map(|adapter| {
            Arc::new(CachedProvider::new(adapter, cache.clone())) as Arc<dyn Provider>
        })
        .collect();
    let registry = Arc::new(Registry::new(adapters));

    let crosschain: Vec<Arc<dyn CrossChainProvider>> = vec![
        Arc::new(Debridge::new(client.clone()).with_timeout(timeout)),
        Arc::new(LiFi::new(client.clone()).with_timeout(timeout)),
    ];
    let crosschain = crosschain
        .into_iter()
        .filter(|adapter| descriptors.get(adapter.name()).is_some())
        .collect();
    let crosschain_registry = Arc::new(CrossChainRegistry::new(crosschain));

    let gas = GasPriceService::new(chains.clone(), chain_clients.clone(), cache.clone());
    let service = Arc::new(MetaAggregationService::new(
        registry.clone(),
        crosschain_registry,
        descriptors.clone(),
        chains.clone(),
        token_info,
        gas.clone(),
        chain_clients,
        cache,
    ));
    let state = api::AppState {
        service,
        limit_orders: Arc::new(LimitOrders::new(registry)),
        gas,
        chains,
        descriptors,
    };

    api::serve(args.bind_addr, state)
        .await
        .context("serving the http api")
}
