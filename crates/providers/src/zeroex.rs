//! 0x swap API adapter.
//!
//! <https://0x.org/docs/api> — mainnet lives at `api.0x.org`, every other
//! chain on a subdomain named after the chain (`bsc.api.0x.org`).

use {
    crate::{
        DEFAULT_TIMEOUT, LimitOrderProviding, PriceQuery, Provider, QuoteQuery,
        http::{self, UpstreamError, error_table},
    },
    bigdecimal::BigDecimal,
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, U256,
        chain::Catalog,
        quote::{LimitOrderPayload, PriceQuote, SwapSource, TxQuote},
        u256_decimal,
    },
    regex::Regex,
    serde::Deserialize,
    serde_json::Value,
    std::{str::FromStr, sync::{Arc, LazyLock}, time::Duration},
    url::Url,
};

pub const NAME: &str = "zeroex";

const API_DOMAIN: &str = "api.0x.org";
const TRADING_API_VERSION: u8 = 1;

static ERRORS: LazyLock<Vec<(Regex, ErrorKind)>> = LazyLock::new(|| {
    error_table(&[
        ("insufficient funds for transaction", ErrorKind::InsufficientBalance),
        ("incompletetransformerc20error", ErrorKind::InvalidTokens),
        ("insufficient_asset_liquidity", ErrorKind::InsufficientLiquidity),
        ("walletexecutedelegatecallfailederror", ErrorKind::ProviderUnspecified),
        ("sendernotauthorizederror", ErrorKind::InsufficientAllowance),
        ("gas estimation failed", ErrorKind::EstimationFailed),
        ("erc20: insufficient allowance", ErrorKind::InsufficientAllowance),
    ])
});

pub struct ZeroEx {
    client: reqwest::Client,
    chains: Arc<Catalog>,
    timeout: Duration,
    /// Domain override for tests; `None` means the production domains.
    domain: Option<String>,
}

impl ZeroEx {
    pub fn new(client: reqwest::Client, chains: Arc<Catalog>) -> Self {
        Self {
            client,
            chains,
            timeout: DEFAULT_TIMEOUT,
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: String) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Overrides the default request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn domain(&self, chain_id: u64) -> String {
        if let Some(domain) = &self.domain {
            return domain.clone();
        }
        let subdomain = match self.chains.by_id(chain_id) {
            Some(chain) if chain.chain_id != 1 => format!("{}.", chain.name.to_lowercase()),
            _ => String::new(),
        };
        format!("{subdomain}{API_DOMAIN}")
    }

    fn url(&self, path: &str, endpoint: &str, chain_id: u64) -> Url {
        let raw = format!(
            "https://{}/{path}/v{TRADING_API_VERSION}/{endpoint}",
            self.domain(chain_id)
        );
        Url::parse(&raw).expect("static url shape")
    }

    fn price_url(&self, query: &PriceQuery) -> Url {
        let mut url = self.url("swap", "price", query.chain_id);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("buyToken", &format!("{:#x}", query.buy_token))
                .append_pair("sellToken", &format!("{:#x}", query.sell_token))
                .append_pair("sellAmount", &query.sell_amount.to_string());
            if let Some(gas_price) = query.gas_price {
                pairs.append_pair("gasPrice", &gas_price.to_string());
            }
            if let Some(slippage) = query.slippage_percentage {
                pairs.append_pair("slippagePercentage", &slippage.to_string());
            }
            if let Some(taker) = query.taker_address {
                pairs.append_pair("takerAddress", &format!("{taker:#x}"));
            }
            if let (Some(recipient), Some(fee)) =
                (query.fee_recipient, query.buy_token_percentage_fee)
            {
                pairs
                    .append_pair("feeRecipient", &format!("{recipient:#x}"))
                    .append_pair("affiliateAddress", &format!("{recipient:#x}"))
                    .append_pair("buyTokenPercentageFee", &fee.to_string());
            }
        }
        url
    }

    fn quote_url(&self, query: &QuoteQuery) -> Url {
        let mut url = self.url("swap", "quote", query.chain_id);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("buyToken", &format!("{:#x}", query.buy_token))
                .append_pair("sellToken", &format!("{:#x}", query.sell_token))
                .append_pair("sellAmount", &query.sell_amount.to_string())
                .append_pair("skipValidation", &query.ignore_checks.to_string())
                .append_pair("takerAddress", &format!("{:#x}", query.taker_address));
            if let Some(gas_price) = query.gas_price {
                pairs.append_pair("gasPrice", &gas_price.to_string());
            }
            if let Some(slippage) = query.slippage_percentage {
                pairs.append_pair("slippagePercentage", &slippage.to_string());
            }
            if let (Some(recipient), Some(fee)) =
                (query.fee_recipient, query.buy_token_percentage_fee)
            {
                pairs
                    .append_pair("feeRecipient", &format!("{recipient:#x}"))
                    .append_pair("affiliateAddress", &format!("{recipient:#x}"))
                    .append_pair("buyTokenPercentageFee", &fee.to_string());
            }
        }
        url
    }

    async fn fetch(&self, url: Url) -> Result<Value, UpstreamError> {
        http::send_json(NAME, self.client.get(url).timeout(self.timeout)).await
    }

    fn classify(&self, err: UpstreamError) -> AggregationError {
        err.classify(NAME, &ERRORS, message_from_body)
    }
}

/// 0x error bodies are either `{reason, validationErrors: [{field, reason}]}`
/// or `{reason, values: {message}}`.
fn message_from_body(body: &Value) -> String {
    if let Some(validations) = body.get("validationErrors").and_then(Value::as_array) {
        return validations
            .iter()
            .map(|validation| {
                format!(
                    "{}: {}",
                    validation["field"].as_str().unwrap_or("?"),
                    validation["reason"].as_str().unwrap_or("?"),
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
    }
    body.get("values")
        .and_then(|values| values.get("message"))
        .or_else(|| body.get("reason"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Deserialize)]
struct RawSource {
    name: String,
    proportion: String,
    #[serde(default)]
    hops: Vec<String>,
}

/// Zero-proportion venues are noise and dropped; multi-hop routes flatten
/// into one source per hop carrying the parent's share. Proportions arrive
/// as fractions and leave as percent.
fn convert_sources(raw: Vec<RawSource>) -> Vec<SwapSource> {
    let mut sources = Vec::new();
    for source in raw {
        let proportion: f64 = source.proportion.parse().unwrap_or(0.);
        if proportion == 0. {
            continue;
        }
        if source.hops.is_empty() {
            sources.push(SwapSource::new(&source.name, proportion * 100.));
        } else {
            sources.extend(
                source
                    .hops
                    .iter()
                    .map(|hop| SwapSource::new(hop, proportion * 100.)),
            );
        }
    }
    sources
}

/// The upstream price string is validated and canonicalized; 0x responses
/// carry no token decimals, so this is the one adapter that cannot rebuild
/// the ratio from scratch.
fn canonical_price(price: &str) -> Result<String, AggregationError> {
    BigDecimal::from_str(price)
        .map(|price| price.normalized().to_string())
        .map_err(|err| AggregationError::parse(NAME, format!("bad price {price:?}: {err}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceResponse {
    #[serde(with = "u256_decimal")]
    sell_amount: U256,
    #[serde(with = "u256_decimal")]
    buy_amount: U256,
    #[serde(with = "u256_decimal")]
    gas: U256,
    #[serde(with = "u256_decimal")]
    gas_price: U256,
    #[serde(with = "u256_decimal")]
    value: U256,
    price: String,
    #[serde(default)]
    allowance_target: Option<Address>,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    #[serde(flatten)]
    price: PriceResponse,
    to: Address,
    data: Bytes,
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AggregationError> {
    serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
}

#[async_trait::async_trait]
impl Provider for ZeroEx {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let url = self.price_url(query);
        let body = self.fetch(url).await.map_err(|err| self.classify(err))?;
        let response: PriceResponse = decode(body)?;
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: convert_sources(response.sources),
            buy_amount: response.buy_amount,
            gas: response.gas,
            sell_amount: response.sell_amount,
            gas_price: response.gas_price,
            value: response.value,
            price: canonical_price(&response.price)?,
            allowance_target: response.allowance_target,
        })
    }

    async fn get_quote(&self, query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
        let url = self.quote_url(query);
        let body = self.fetch(url).await.map_err(|err| self.classify(err))?;
        let response: SwapResponse = decode(body)?;
        Ok(TxQuote {
            sources: convert_sources(response.price.sources),
            buy_amount: response.price.buy_amount,
            gas: response.price.gas,
            sell_amount: response.price.sell_amount,
            to: response.to,
            data: response.data,
            gas_price: response.price.gas_price,
            value: response.price.value,
            price: canonical_price(&response.price.price)?,
        })
    }

    fn limit_orders(&self) -> Option<&dyn LimitOrderProviding> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl LimitOrderProviding for ZeroEx {
    async fn orders_by_trader(
        &self,
        chain_id: u64,
        trader: Address,
        maker_token: Option<Address>,
        taker_token: Option<Address>,
        _statuses: Option<Vec<String>>,
    ) -> Result<Value, AggregationError> {
        let mut url = self.url("orderbook", "orders", chain_id);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("trader", &format!("{trader:#x}"));
            if let Some(maker) = maker_token {
                pairs.append_pair("makerToken", &format!("{maker:#x}"));
            }
            if let Some(taker) = taker_token {
                pairs.append_pair("takerToken", &format!("{taker:#x}"));
            }
        }
        self.fetch(url).await.map_err(|err| self.classify(err))
    }

    async fn order_by_hash(
        &self,
        chain_id: u64,
        order_hash: &str,
    ) -> Result<Value, AggregationError> {
        let url = self.url("orderbook", &format!("order/{order_hash}"), chain_id);
        self.fetch(url).await.map_err(|err| self.classify(err))
    }

    async fn post_order(
        &self,
        _chain_id: u64,
        _order_hash: &str,
        _signature: &str,
        _payload: &LimitOrderPayload,
    ) -> Result<Value, AggregationError> {
        Err(AggregationError::for_provider(
            ErrorKind::ValidationFailed,
            NAME,
            "posting limit orders is not supported by the 0x orderbook proxy",
        ))
    }
}
