//! SiFi adapter.
//!
//! <https://docs.sifi.org> — `GET /v1/quote` prices the swap; the raw quote
//! is posted back to `POST /v1/swap` untouched to obtain calldata, like
//! ParaSwap's two-step flow. SiFi classifies failures with symbolic codes
//! in the body, and hex-encodes the numeric transaction fields.

use {
    crate::{
        DEFAULT_TIMEOUT, PriceQuery, Provider, QuoteQuery,
        http::{self, UpstreamError, missing},
    },
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, U256,
        number::decimal_price,
        quote::{PriceQuote, SwapSource, TxQuote},
        u256_decimal,
    },
    serde::Deserialize,
    serde_json::{Value, json},
    std::time::Duration,
    url::Url,
};

pub const NAME: &str = "sifi";

const TRADING_API: &str = "https://api.sifi.org/v1";

/// SiFi's symbolic error vocabulary.
fn error_kind(code: &str) -> ErrorKind {
    match code {
        "INSUFFICIENT_BALANCE" => ErrorKind::InsufficientBalance,
        "TOKEN_NOT_FOUND" => ErrorKind::InvalidTokens,
        "ESTIMATE_GAS_FAILED" => ErrorKind::EstimationFailed,
        "INSUFFICIENT_ALLOWANCE" => ErrorKind::InsufficientAllowance,
        "PATH_NOT_FOUND" => ErrorKind::PriceUnavailable,
        "INVALID_RECIPIENT" | "BAD_REQUEST" | "PERMIT_NOT_SUPPORTED" => {
            ErrorKind::ValidationFailed
        }
        _ => ErrorKind::ProviderUnspecified,
    }
}

pub struct Sifi {
    client: reqwest::Client,
    timeout: Duration,
    base_url: Url,
}

impl Sifi {
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
            "{}/{path}",
            self.base_url.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape")
    }

    async fn fetch_quote(&self, query: &PriceQuery) -> Result<Value, AggregationError> {
        let mut url = self.url("quote");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("fromChain", &query.chain_id.to_string())
                .append_pair("fromToken", &format!("{:#x}", query.sell_token))
                .append_pair("toToken", &format!("{:#x}", query.buy_token))
                .append_pair("fromAmount", &query.sell_amount.to_string())
                .append_pair("disablePermit", "1");
        }
        http::send_json(NAME, self.client.get(url).timeout(self.timeout))
            .await
            .map_err(classify)
    }
}

fn classify(err: UpstreamError) -> AggregationError {
    match err {
        UpstreamError::Failed(err) => err,
        UpstreamError::Refused(refusal) => {
            let code = refusal.body.get("code").and_then(Value::as_str);
            let message = refusal
                .body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| refusal.body.to_string());
            let kind = code.map(error_kind).unwrap_or(ErrorKind::ProviderUnspecified);
            AggregationError::for_provider(kind, NAME, message)
                .with_detail("status", refusal.status)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quote {
    #[serde(with = "u256_decimal")]
    from_amount: U256,
    #[serde(with = "u256_decimal")]
    to_amount: U256,
    #[serde(default, with = "u256_decimal::option")]
    estimated_gas: Option<U256>,
    from_token: TokenMeta,
    to_token: TokenMeta,
    #[serde(default)]
    source: Option<RouteSource>,
}

#[derive(Debug, Deserialize)]
struct TokenMeta {
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct RouteSource {
    name: String,
    #[serde(default)]
    quote: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    tx: SwapTx,
    #[serde(default, with = "u256_decimal::option")]
    gas_price: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapTx {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: Option<String>,
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

impl Quote {
    fn price(&self) -> Result<String, AggregationError> {
        decimal_price(
            &self.to_amount,
            self.to_token.decimals,
            &self.from_amount,
            self.from_token.decimals,
        )
        .map(|price| price.to_string())
        .ok_or_else(|| missing(NAME, "fromAmount"))
    }

    /// Routing venues with volume-weighted shares. SiFi nests arbitrary
    /// split trees; each leaf venue ends up with the share of the total
    /// volume that flows through it. Routes delegated to another
    /// aggregator report no venues.
    fn sources(&self) -> Vec<SwapSource> {
        match &self.source {
            Some(source) if source.name == "sifi" => source
                .quote
                .get("element")
                .map(sources_from_element)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn sources_from_element(element: &Value) -> Vec<SwapSource> {
    let share = element
        .get("shareBps")
        .and_then(Value::as_f64)
        .unwrap_or(10_000.)
        / 10_000.;
    let mut sources: Vec<SwapSource> = Vec::new();
    let mut counted = 0u32;
    for action in element
        .get("actions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        if action.get("type").and_then(Value::as_str) == Some("split") {
            counted += 1;
            for part in action
                .get("parts")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                sources.extend(sources_from_element(part));
            }
        } else if let Some(exchange) = action.get("exchange").and_then(Value::as_str) {
            counted += 1;
            sources.push(SwapSource::new(exchange, 100.));
        }
    }
    if counted == 0 {
        return Vec::new();
    }
    let mut grouped: Vec<SwapSource> = Vec::new();
    for mut source in sources {
        source.proportion = source.proportion / f64::from(counted) * share;
        match grouped.iter_mut().find(|existing| existing.name == source.name) {
            Some(existing) => existing.proportion += source.proportion,
            None => grouped.push(source),
        }
    }
    grouped
}

fn decode<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, AggregationError> {
    serde_json::from_value(body.clone())
        .map_err(|err| AggregationError::parse(NAME, err.to_string()))
}

#[async_trait::async_trait]
impl Provider for Sifi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let raw = self.fetch_quote(query).await?;
        let quote: Quote = decode(&raw)?;
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: quote.sources(),
            buy_amount: quote.to_amount,
            gas: quote.estimated_gas.unwrap_or(U256::ZERO),
            sell_amount: quote.from_amount,
            gas_price: query.gas_price.unwrap_or(U256::ZERO),
            value: query.value(),
            price: quote.price()?,
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
        let raw = self.fetch_quote(&price_view).await?;
        let quote: Quote = decode(&raw)?;
        let price = quote.price()?;
        let sources = quote.sources();

        // The raw quote travels back untouched; the swap endpoint rejects
        // modified quotes.
        let mut body = json!({
            "quote": raw,
            "fromAddress": format!("{:#x}", query.taker_address),
        });
        if let Some(fee) = query.buy_token_percentage_fee {
            body["feeBps"] = json!((fee * 10_000.).round() as u64);
        }
        if let Some(slippage) = query.slippage_percentage {
            body["slippage"] = json!((slippage * 10_000.).round() as u64);
        }
        if let Some(recipient) = query.fee_recipient {
            body["partner"] = json!(format!("{recipient:#x}"));
        }
        let response = http::send_json(
            NAME,
            self.client
                .post(self.url("swap"))
                .json(&body)
                .timeout(self.timeout),
        )
        .await
        .map_err(classify)?;
        let swap: SwapResponse = decode(&response)?;
        Ok(TxQuote {
            sources,
            buy_amount: quote.to_amount,
            gas: hex_quantity(&swap.tx.gas_limit)?,
            sell_amount: quote.from_amount,
            to: swap.tx.to,
            data: swap.tx.data,
            gas_price: query.gas_price.or(swap.gas_price).unwrap_or(U256::ZERO),
            value: hex_quantity(&swap.tx.value)?,
            price,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, model::address, serde_json::json};

    fn quote_fixture() -> Value {
        json!({
            "fromAmount": "1000000",
            "toAmount": "500000000000000",
            "estimatedGas": "175000",
            "fromToken": {"decimals": 6},
            "toToken": {"decimals": 18},
            "source": {
                "name": "sifi",
                "quote": {
                    "element": {
                        "shareBps": 10000,
                        "actions": [
                            {"type": "swap", "exchange": "UniswapV3"},
                            {
                                "type": "split",
                                "parts": [
                                    {
                                        "shareBps": 6000,
                                        "actions": [{"type": "swap", "exchange": "Curve"}],
                                    },
                                    {
                                        "shareBps": 4000,
                                        "actions": [{"type": "swap", "exchange": "SushiSwap"}],
                                    },
                                ],
                            },
                        ],
                    },
                },
            },
        })
    }

    #[test]
    fn quote_decodes_and_recomputes_price() {
        let quote: Quote = decode(&quote_fixture()).unwrap();
        assert_eq!(quote.price().unwrap(), "0.0005");
        assert_eq!(quote.estimated_gas, Some(U256::from(175_000u64)));
    }

    #[test]
    fn split_tree_shares_are_volume_weighted() {
        let quote: Quote = decode(&quote_fixture()).unwrap();
        let sources = quote.sources();
        let share = |name: &str| {
            sources
                .iter()
                .find(|source| source.name == name)
                .map(|source| source.proportion)
                .unwrap()
        };
        // Two top-level children: the direct hop and the split. Each split
        // branch is that branch's whole volume, scaled by its share.
        assert_eq!(share("UniswapV3"), 50.);
        assert_eq!(share("Curve"), 30.);
        assert_eq!(share("SushiSwap"), 20.);
    }

    #[test]
    fn delegated_routes_report_no_venues() {
        let quote: Quote = decode(&json!({
            "fromAmount": "1",
            "toAmount": "1",
            "fromToken": {"decimals": 0},
            "toToken": {"decimals": 0},
            "source": {"name": "paraswap", "quote": {}},
        }))
        .unwrap();
        assert!(quote.sources().is_empty());
    }

    #[test]
    fn symbolic_error_codes_map_to_kinds() {
        for (code, expected) in [
            ("INSUFFICIENT_BALANCE", ErrorKind::InsufficientBalance),
            ("TOKEN_NOT_FOUND", ErrorKind::InvalidTokens),
            ("ESTIMATE_GAS_FAILED", ErrorKind::EstimationFailed),
            ("PATH_NOT_FOUND", ErrorKind::PriceUnavailable),
            ("PERMIT_NOT_SUPPORTED", ErrorKind::ValidationFailed),
            ("SOMETHING_ELSE", ErrorKind::ProviderUnspecified),
        ] {
            assert_eq!(error_kind(code), expected, "{code}");
        }
    }

    #[test]
    fn swap_tx_hex_fields_decode() {
        let swap: SwapResponse = decode(&json!({
            "tx": {
                "to": "0x2933c60e5d51b7d5a134e1a2cbe0c118b66e2ab4",
                "data": "0x8fd8d1bb",
                "value": "0x0",
                "gasLimit": "0x2ab98",
            },
        }))
        .unwrap();
        assert_eq!(swap.tx.to, address!("2933c60e5d51b7d5a134e1a2cbe0c118b66e2ab4"));
        assert_eq!(hex_quantity(&swap.tx.gas_limit).unwrap(), U256::from(175_000u64));
    }
}
