//! 1inch aggregation-protocol adapter, covering the trading API and the
//! limit-order book.
//!
//! URL layout:
//!   trading:      `https://api.1inch.dev/swap/v5.0/{chain_id}/{endpoint}`
//!   limit orders: `https://api.1inch.dev/orderbook/v3.0/{chain_id}/{path}`

use {
    crate::{
        DEFAULT_TIMEOUT, LimitOrderProviding, PriceQuery, Provider, QuoteQuery,
        http::{self, UpstreamError, error_table, missing},
    },
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, U256,
        number::decimal_price,
        quote::{LimitOrderPayload, PriceQuote, SwapSource, TxQuote},
        u256_decimal,
    },
    regex::Regex,
    serde::Deserialize,
    serde_json::{Value, json},
    std::{sync::LazyLock, time::Duration},
    url::Url,
};

pub const NAME: &str = "oneinch";

const TRADING_API: &str = "https://api.1inch.dev/swap";
const TRADING_API_VERSION: &str = "5.0";
const LIMIT_ORDERS_API: &str = "https://api.1inch.dev/orderbook";
const LIMIT_ORDER_VERSION: &str = "3.0";

/// 1inch wants slippage in percent; callers hand fractions around.
const DEFAULT_SLIPPAGE_PERCENT: f64 = 0.5;

static ERRORS: LazyLock<Vec<(Regex, ErrorKind)>> = LazyLock::new(|| {
    error_table(&[
        ("insufficient liquidity", ErrorKind::InsufficientLiquidity),
        ("cannot estimate", ErrorKind::EstimationFailed),
        (
            "fromtokenaddress cannot be equals to totokenaddress",
            ErrorKind::InvalidTokens,
        ),
        (r"not enough \w+ balance", ErrorKind::InsufficientBalance),
        ("not enough allowance", ErrorKind::InsufficientAllowance),
        (r"cannot sync \w+", ErrorKind::InvalidTokens),
    ])
});

/// Routing effort knobs sent with every trading request; the maximum-result
/// preset the original service always used.
const MAX_RESULT_PRESET: [(&str, &str); 4] = [
    ("complexityLevel", "2"),
    ("mainRouteParts", "10"),
    ("parts", "50"),
    ("virtualParts", "50"),
];

/// Venue aliases 1inch spells differently from everyone else.
fn venue_alias(name: &str) -> &str {
    match name {
        "SUSHI" => "SushiSwap",
        other => other,
    }
}

pub struct OneInch {
    client: reqwest::Client,
    api_key: String,
    timeout: Duration,
    trading_base: Url,
    orderbook_base: Url,
}

impl OneInch {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            timeout: DEFAULT_TIMEOUT,
            trading_base: Url::parse(TRADING_API).expect("static url"),
            orderbook_base: Url::parse(LIMIT_ORDERS_API).expect("static url"),
        }
    }

    pub fn with_base_urls(mut self, trading: Url, orderbook: Url) -> Self {
        self.trading_base = trading;
        self.orderbook_base = orderbook;
        self
    }

    /// Overrides the default request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn trading_url(&self, chain_id: u64, endpoint: &str) -> Url {
        Url::parse(&format!(
            "{}/v{TRADING_API_VERSION}/{chain_id}/{endpoint}",
            self.trading_base.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape")
    }

    fn orderbook_url(&self, chain_id: u64, path: &str) -> Url {
        Url::parse(&format!(
            "{}/v{LIMIT_ORDER_VERSION}/{chain_id}/{path}",
            self.orderbook_base.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape")
    }

    async fn get(&self, url: Url) -> Result<Value, UpstreamError> {
        http::send_json(
            NAME,
            self.client
                .get(url)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout),
        )
        .await
    }

    async fn post(&self, url: Url, body: &Value) -> Result<Value, UpstreamError> {
        http::send_json(
            NAME,
            self.client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(body)
                .timeout(self.timeout),
        )
        .await
    }

    fn classify(&self, err: UpstreamError) -> AggregationError {
        err.classify(NAME, &ERRORS, message_from_body)
    }
}

/// 1inch error bodies carry one of `description`, `message` or `error`.
fn message_from_body(body: &Value) -> String {
    body.get("description")
        .or_else(|| body.get("message"))
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Deserialize)]
struct TokenMeta {
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    from_token: TokenMeta,
    to_token: TokenMeta,
    #[serde(with = "u256_decimal")]
    from_token_amount: U256,
    #[serde(with = "u256_decimal")]
    to_token_amount: U256,
    #[serde(default, with = "u256_decimal::option")]
    estimated_gas: Option<U256>,
    #[serde(default)]
    protocols: Vec<Vec<Vec<RawProtocol>>>,
    #[serde(default)]
    tx: Option<RawTx>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTx {
    to: Address,
    data: Bytes,
    #[serde(with = "u256_decimal")]
    gas: U256,
    #[serde(with = "u256_decimal")]
    gas_price: U256,
    #[serde(with = "u256_decimal")]
    value: U256,
}

#[derive(Debug, Deserialize, Clone)]
struct RawProtocol {
    name: String,
    part: f64,
}

/// Protocols nest `[route][hop][venue]`; the leaves carry percent parts.
fn convert_sources(protocols: Vec<Vec<Vec<RawProtocol>>>) -> Vec<SwapSource> {
    protocols
        .into_iter()
        .flatten()
        .flatten()
        .map(|protocol| SwapSource::new(venue_alias(&protocol.name), protocol.part))
        .collect()
}

fn recomputed_price(response: &QuoteResponse) -> Result<String, AggregationError> {
    decimal_price(
        &response.to_token_amount,
        response.to_token.decimals,
        &response.from_token_amount,
        response.from_token.decimals,
    )
    .map(|price| price.to_string())
    .ok_or_else(|| missing(NAME, "fromTokenAmount"))
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AggregationError> {
    serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
}

#[async_trait::async_trait]
impl Provider for OneInch {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let mut url = self.trading_url(query.chain_id, "quote");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("toTokenAddress", &format!("{:#x}", query.buy_token))
                .append_pair("fromTokenAddress", &format!("{:#x}", query.sell_token))
                .append_pair("amount", &query.sell_amount.to_string());
            if let Some(gas_price) = query.gas_price {
                pairs.append_pair("gasPrice", &gas_price.to_string());
            }
            if let Some(fee) = query.buy_token_percentage_fee {
                pairs.append_pair("fee", &fee.to_string());
            }
            for (name, value) in MAX_RESULT_PRESET {
                pairs.append_pair(name, value);
            }
        }
        let body = self.get(url).await.map_err(|err| self.classify(err))?;
        let response: QuoteResponse = decode(body)?;
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: convert_sources(response.protocols.clone()),
            buy_amount: response.to_token_amount,
            gas: response.estimated_gas.unwrap_or(U256::ZERO),
            sell_amount: response.from_token_amount,
            gas_price: query.gas_price.unwrap_or(U256::ZERO),
            value: query.value(),
            price: recomputed_price(&response)?,
            allowance_target: None,
        })
    }

    async fn get_quote(&self, query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
        let slippage_percent = match query.slippage_percentage {
            Some(fraction) => fraction * 100.,
            None => DEFAULT_SLIPPAGE_PERCENT,
        };
        let mut url = self.trading_url(query.chain_id, "swap");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("fromTokenAddress", &format!("{:#x}", query.sell_token))
                .append_pair("toTokenAddress", &format!("{:#x}", query.buy_token))
                .append_pair("amount", &query.sell_amount.to_string())
                .append_pair("fromAddress", &format!("{:#x}", query.taker_address))
                .append_pair("slippage", &slippage_percent.to_string())
                .append_pair("disableEstimate", &query.ignore_checks.to_string());
            if let Some(gas_price) = query.gas_price {
                pairs.append_pair("gasPrice", &gas_price.to_string());
            }
            if let Some(recipient) = query.fee_recipient {
                pairs.append_pair("referrerAddress", &format!("{recipient:#x}"));
            }
            if let Some(fee) = query.buy_token_percentage_fee {
                pairs.append_pair("fee", &fee.to_string());
            }
            for (name, value) in MAX_RESULT_PRESET {
                pairs.append_pair(name, value);
            }
        }
        let body = self.get(url).await.map_err(|err| self.classify(err))?;
        let response: QuoteResponse = decode(body)?;
        let price = recomputed_price(&response)?;
        let tx = response.tx.ok_or_else(|| missing(NAME, "tx"))?;
        Ok(TxQuote {
            sources: convert_sources(response.protocols),
            buy_amount: response.to_token_amount,
            gas: tx.gas,
            sell_amount: response.from_token_amount,
            to: tx.to,
            data: tx.data,
            gas_price: tx.gas_price,
            value: tx.value,
            price,
        })
    }

    fn limit_orders(&self) -> Option<&dyn LimitOrderProviding> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl LimitOrderProviding for OneInch {
    async fn orders_by_trader(
        &self,
        chain_id: u64,
        trader: Address,
        maker_token: Option<Address>,
        taker_token: Option<Address>,
        statuses: Option<Vec<String>>,
    ) -> Result<Value, AggregationError> {
        let mut url = self.orderbook_url(chain_id, &format!("address/{trader:#x}"));
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("limit", "100")
                .append_pair("page", "1")
                .append_pair("sortBy", "createDateTime");
            if let Some(maker) = maker_token {
                pairs.append_pair("makerAsset", &format!("{maker:#x}"));
            }
            if let Some(taker) = taker_token {
                pairs.append_pair("takerAsset", &format!("{taker:#x}"));
            }
            if let Some(statuses) = statuses {
                pairs.append_pair("statuses", &statuses.join(","));
            }
        }
        self.get(url).await.map_err(|err| self.classify(err))
    }

    async fn order_by_hash(
        &self,
        chain_id: u64,
        order_hash: &str,
    ) -> Result<Value, AggregationError> {
        let url = self.orderbook_url(chain_id, &format!("events/{order_hash}"));
        self.get(url).await.map_err(|err| self.classify(err))
    }

    async fn post_order(
        &self,
        chain_id: u64,
        order_hash: &str,
        signature: &str,
        payload: &LimitOrderPayload,
    ) -> Result<Value, AggregationError> {
        let url = self.orderbook_url(chain_id, "");
        let body = json!({
            "orderHash": order_hash,
            "signature": signature,
            "data": payload,
        });
        self.post(url, &body).await.map_err(|err| self.classify(err))
    }
}
