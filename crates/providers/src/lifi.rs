//! LI.FI cross-chain adapter.
//!
//! Prices come from `POST /v1/advanced/routes` (best route of the returned
//! set); broadcastable quotes from `GET /v1/quote`, which carries a ready
//! `transactionRequest`.

use {
    crate::{
        CrossChainPriceQuery, CrossChainProvider, CrossChainQuoteQuery, DEFAULT_TIMEOUT,
        http::{self, UpstreamError, error_table, missing},
    },
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, U256,
        number::decimal_price,
        quote::{PriceQuote, SwapSource, TxQuote},
        u256_decimal,
    },
    regex::Regex,
    serde::Deserialize,
    serde_json::{Value, json},
    std::{sync::LazyLock, time::Duration},
    url::Url,
};

pub const NAME: &str = "lifi";

const TRADING_API: &str = "https://li.quest";
const VERSION: &str = "1";

static ERRORS: LazyLock<Vec<(Regex, ErrorKind)>> = LazyLock::new(|| {
    error_table(&[
        ("no routes found", ErrorKind::InsufficientLiquidity),
        ("invalid fromtokenaddress", ErrorKind::InvalidTokens),
        ("invalid totokenaddress", ErrorKind::InvalidTokens),
    ])
});

pub struct LiFi {
    client: reqwest::Client,
    timeout: Duration,
    base_url: Url,
}

impl LiFi {
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

    fn url(&self, path: &str) -> Url {
        Url::parse(&format!(
            "{}/v{VERSION}/{path}",
            self.base_url.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape")
    }

    fn classify(&self, err: UpstreamError) -> AggregationError {
        err.classify(NAME, &ERRORS, message_from_body)
    }
}

fn message_from_body(body: &Value) -> String {
    body.get("message")
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
struct RoutesResponse {
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoute {
    #[serde(with = "u256_decimal")]
    from_amount: U256,
    #[serde(with = "u256_decimal")]
    to_amount: U256,
    from_token: TokenMeta,
    to_token: TokenMeta,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    tool: String,
    #[serde(default)]
    estimate: Option<RawEstimate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEstimate {
    #[serde(default)]
    approval_address: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    action: QuoteAction,
    estimate: QuoteEstimate,
    transaction_request: TransactionRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteAction {
    from_token: TokenMeta,
    to_token: TokenMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEstimate {
    #[serde(with = "u256_decimal")]
    from_amount: U256,
    #[serde(with = "u256_decimal")]
    to_amount: U256,
}

/// LI.FI hex-encodes the numeric transaction fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    gas_limit: Option<String>,
}

fn hex_quantity(raw: &Option<String>) -> Result<U256, AggregationError> {
    match raw {
        None => Ok(U256::ZERO),
        Some(raw) => {
            let digits = raw.trim_start_matches("0x");
            U256::from_str_radix(digits, 16)
                .map_err(|err| AggregationError::parse(NAME, format!("bad quantity {raw:?}: {err}")))
        }
    }
}

fn route_sources(steps: &[RawStep]) -> Vec<SwapSource> {
    steps
        .iter()
        .map(|step| SwapSource::new(&step.tool, 0.))
        .collect()
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AggregationError> {
    serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
}

#[async_trait::async_trait]
impl CrossChainProvider for LiFi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(
        &self,
        query: &CrossChainPriceQuery,
    ) -> Result<PriceQuote, AggregationError> {
        let body = json!({
            "fromChainId": query.chain_id_from,
            "fromTokenAddress": format!("{:#x}", query.sell_token),
            "toChainId": query.chain_id_to,
            "toTokenAddress": format!("{:#x}", query.buy_token),
            "fromAmount": query.sell_amount.to_string(),
            "fromAddress": query.taker_address.map(|taker| format!("{taker:#x}")),
            "toAddress": query.taker_address.map(|taker| format!("{taker:#x}")),
            "options": {"slippage": query.slippage_percentage},
        });
        let response = http::send_json(
            NAME,
            self.client
                .post(self.url("advanced/routes"))
                .json(&body)
                .timeout(self.timeout),
        )
        .await
        .map_err(|err| self.classify(err))?;
        let routes: RoutesResponse = decode(response)?;
        let route = routes.routes.into_iter().next().ok_or_else(|| {
            AggregationError::for_provider(
                ErrorKind::InsufficientLiquidity,
                NAME,
                "no routes found for the requested pair",
            )
        })?;
        let price = decimal_price(
            &route.to_amount,
            route.to_token.decimals,
            &route.from_amount,
            route.from_token.decimals,
        )
        .map(|price| price.to_string())
        .ok_or_else(|| missing(NAME, "fromAmount"))?;
        let allowance_target = route
            .steps
            .first()
            .and_then(|step| step.estimate.as_ref())
            .and_then(|estimate| estimate.approval_address);
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: route_sources(&route.steps),
            buy_amount: route.to_amount,
            gas: U256::ZERO,
            sell_amount: route.from_amount,
            gas_price: query.gas_price.unwrap_or(U256::ZERO),
            value: query.value(),
            price,
            allowance_target,
        })
    }

    async fn get_quote(
        &self,
        query: &CrossChainQuoteQuery,
    ) -> Result<TxQuote, AggregationError> {
        let mut url = self.url("quote");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("fromChain", &query.chain_id_from.to_string())
                .append_pair("toChain", &query.chain_id_to.to_string())
                .append_pair("fromToken", &format!("{:#x}", query.sell_token))
                .append_pair("toToken", &format!("{:#x}", query.buy_token))
                .append_pair("fromAmount", &query.sell_amount.to_string())
                .append_pair("fromAddress", &format!("{:#x}", query.taker_address));
            if let Some(slippage) = query.slippage_percentage {
                pairs.append_pair("slippage", &slippage.to_string());
            }
        }
        let response = http::send_json(NAME, self.client.get(url).timeout(self.timeout))
            .await
            .map_err(|err| self.classify(err))?;
        let quote: QuoteResponse = decode(response)?;
        let price = decimal_price(
            &quote.estimate.to_amount,
            quote.action.to_token.decimals,
            &quote.estimate.from_amount,
            quote.action.from_token.decimals,
        )
        .map(|price| price.to_string())
        .ok_or_else(|| missing(NAME, "fromAmount"))?;
        Ok(TxQuote {
            sources: Vec::new(),
            buy_amount: quote.estimate.to_amount,
            gas: hex_quantity(&quote.transaction_request.gas_limit)?,
            sell_amount: quote.estimate.from_amount,
            to: quote.transaction_request.to,
            data: quote.transaction_request.data,
            gas_price: hex_quantity(&quote.transaction_request.gas_price)?,
            value: hex_quantity(&quote.transaction_request.value)?,
            price,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, model::address, serde_json::json};

    #[test]
    fn best_route_prices_and_exposes_approval_address() {
        let routes: RoutesResponse = decode(json!({
            "routes": [{
                "fromAmount": "1000000",
                "toAmount": "500000000000000",
                "fromToken": {"decimals": 6},
                "toToken": {"decimals": 18},
                "steps": [{
                    "tool": "hop",
                    "estimate": {"approvalAddress": "0x1231deb6f5749ef6ce6943a275a1d3e7486f4eae"},
                }],
            }],
        }))
        .unwrap();
        let route = &routes.routes[0];
        assert_eq!(
            route.steps[0].estimate.as_ref().unwrap().approval_address,
            Some(address!("1231deb6f5749ef6ce6943a275a1d3e7486f4eae"))
        );
        assert_eq!(route_sources(&route.steps), vec![SwapSource::new("hop", 0.)]);
    }

    #[test]
    fn quote_transaction_request_decodes_hex_quantities() {
        let quote: QuoteResponse = decode(json!({
            "action": {
                "fromToken": {"decimals": 6},
                "toToken": {"decimals": 18},
            },
            "estimate": {
                "fromAmount": "1000000",
                "toAmount": "500000000000000",
            },
            "transactionRequest": {
                "to": "0x1231deb6f5749ef6ce6943a275a1d3e7486f4eae",
                "data": "0x23caa5c9",
                "value": "0x0",
                "gasPrice": "0x4a817c800",
                "gasLimit": "0x7a120",
            },
        }))
        .unwrap();
        assert_eq!(
            hex_quantity(&quote.transaction_request.gas_price).unwrap(),
            U256::from(20_000_000_000u64)
        );
        assert_eq!(
            hex_quantity(&quote.transaction_request.gas_limit).unwrap(),
            U256::from(500_000u64)
        );
    }

    #[test]
    fn empty_route_set_is_a_liquidity_failure() {
        let routes: RoutesResponse = decode(json!({"routes": []})).unwrap();
        assert!(routes.routes.is_empty());
    }
}
