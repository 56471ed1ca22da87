//! OpenOcean v2 adapter.
//!
//! <https://docs.openocean.finance> — one host for every chain, the chain
//! id is a path segment: `https://ethapi.openocean.finance/v2/{chain}/...`.

use {
    crate::{
        DEFAULT_TIMEOUT, PriceQuery, Provider, QuoteQuery,
        http::{self, UpstreamError, error_table, missing},
    },
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, U256, is_native_token,
        number::decimal_price,
        quote::{PriceQuote, SwapSource, TxQuote},
        u256_decimal,
    },
    regex::Regex,
    serde::Deserialize,
    serde_json::Value,
    std::{sync::LazyLock, time::Duration},
    url::Url,
};

pub const NAME: &str = "openocean";

const TRADING_API: &str = "https://ethapi.openocean.finance/v2";

static ERRORS: LazyLock<Vec<(Regex, ErrorKind)>> =
    LazyLock::new(|| error_table(&[("insufficient liquidity", ErrorKind::InsufficientLiquidity)]));

pub struct OpenOcean {
    client: reqwest::Client,
    timeout: Duration,
    base_url: Url,
}

impl OpenOcean {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            base_url: Url::parse(TRADING_API).expect("static url"),
        }
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Overrides the default request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(
        &self,
        endpoint: &str,
        query: &PriceQuery,
        taker: Option<Address>,
    ) -> Url {
        let mut url = Url::parse(&format!(
            "{}/{}/{endpoint}",
            self.base_url.as_str().trim_end_matches('/'),
            query.chain_id,
        ))
        .expect("static url shape");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("inTokenAddress", &format!("{:#x}", query.sell_token))
                .append_pair("outTokenAddress", &format!("{:#x}", query.buy_token))
                .append_pair("amount", &query.sell_amount.to_string());
            if let Some(gas_price) = query.gas_price {
                pairs.append_pair("gasPrice", &gas_price.to_string());
            }
            if let Some(taker) = taker {
                pairs.append_pair("account", &format!("{taker:#x}"));
            }
            if let Some(recipient) = query.fee_recipient {
                pairs.append_pair("referrer", &format!("{recipient:#x}"));
            }
            if let Some(fee) = query.buy_token_percentage_fee {
                // Fraction to percent.
                pairs.append_pair("referrerFee", &(fee * 100.).to_string());
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

fn message_from_body(body: &Value) -> String {
    body.get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Deserialize)]
struct TokenMeta {
    address: Address,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    in_token: TokenMeta,
    out_token: TokenMeta,
    #[serde(with = "u256_decimal")]
    in_amount: U256,
    #[serde(with = "u256_decimal")]
    out_amount: U256,
    #[serde(with = "u256_decimal")]
    estimated_gas: U256,
    #[serde(default)]
    path: Option<RawPath>,
    // Swap-endpoint extras.
    #[serde(default)]
    to: Option<Address>,
    #[serde(default)]
    data: Option<Bytes>,
    #[serde(default, with = "u256_decimal::option")]
    value: Option<U256>,
    #[serde(default, with = "u256_decimal::option")]
    gas_price: Option<U256>,
}

#[derive(Debug, Deserialize)]
struct RawPath {
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoute {
    #[serde(default)]
    sub_routes: Vec<RawSubRoute>,
}

#[derive(Debug, Deserialize)]
struct RawSubRoute {
    #[serde(default)]
    dexes: Vec<RawDex>,
}

#[derive(Debug, Deserialize)]
struct RawDex {
    dex: String,
    percentage: f64,
}

/// Routes nest `routes → subRoutes → dexes`; every leaf becomes a source.
fn convert_sources(path: Option<RawPath>) -> Vec<SwapSource> {
    path.map(|path| {
        path.routes
            .into_iter()
            .flat_map(|route| route.sub_routes)
            .flat_map(|sub| sub.dexes)
            .map(|dex| SwapSource::new(&dex.dex, dex.percentage))
            .collect()
    })
    .unwrap_or_default()
}

fn recomputed_price(response: &SwapResponse) -> Result<String, AggregationError> {
    decimal_price(
        &response.out_amount,
        response.out_token.decimals,
        &response.in_amount,
        response.in_token.decimals,
    )
    .map(|price| price.to_string())
    .ok_or_else(|| missing(NAME, "inAmount"))
}

fn decode(body: Value) -> Result<SwapResponse, AggregationError> {
    serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
}

#[async_trait::async_trait]
impl Provider for OpenOcean {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let url = self.url("quote", query, query.taker_address);
        let body = self.fetch(url).await.map_err(|err| self.classify(err))?;
        let response = decode(body)?;
        let value = if is_native_token(response.in_token.address) {
            response.in_amount
        } else {
            U256::ZERO
        };
        let price = recomputed_price(&response)?;
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: convert_sources(response.path),
            buy_amount: response.out_amount,
            gas: response.estimated_gas,
            sell_amount: response.in_amount,
            gas_price: query.gas_price.unwrap_or(U256::ZERO),
            value,
            price,
            allowance_target: None,
        })
    }

    async fn get_quote(&self, query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
        let price_view = PriceQuery {
            buy_token: query.buy_token,
            sell_token: query.sell_token,
            sell_amount: query.sell_amount,
            chain_id: query.chain_id,
            gas_price: query.gas_price,
            slippage_percentage: query.slippage_percentage,
            taker_address: Some(query.taker_address),
            fee_recipient: query.fee_recipient,
            buy_token_percentage_fee: query.buy_token_percentage_fee,
        };
        let url = self.url("swap", &price_view, Some(query.taker_address));
        let body = self.fetch(url).await.map_err(|err| self.classify(err))?;
        let response = decode(body)?;
        let price = recomputed_price(&response)?;
        Ok(TxQuote {
            sources: convert_sources(response.path),
            buy_amount: response.out_amount,
            gas: response.estimated_gas,
            sell_amount: response.in_amount,
            to: response.to.ok_or_else(|| missing(NAME, "to"))?,
            data: response.data.ok_or_else(|| missing(NAME, "data"))?,
            gas_price: response.gas_price.unwrap_or(U256::ZERO),
            value: response.value.unwrap_or(U256::ZERO),
            price,
        })
    }
}
