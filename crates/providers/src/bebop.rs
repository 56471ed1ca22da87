//! Bebop RFQ adapter.
//!
//! <https://docs.bebop.xyz> — one `quote` endpoint serves both price and
//! quote; validation is skipped for price lookups. Bebop signals failures
//! with a structured `{error: {errorCode, message}}` body, sometimes inside
//! an HTTP 200.

use {
    crate::{
        DEFAULT_TIMEOUT, PriceQuery, Provider, QuoteQuery,
        http::{self, UpstreamError},
    },
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, U256,
        chain::Catalog,
        quote::{PriceQuote, SwapSource, TxQuote},
        u256_decimal,
    },
    serde::Deserialize,
    serde_json::{Map, Value},
    std::{sync::Arc, time::Duration},
    url::Url,
};

pub const NAME: &str = "bebop";

const BASE_URL: &str = "https://api.bebop.xyz";
const TRADING_API_VERSION: u8 = 2;

/// Placeholder taker accepted by the quote endpoint when the caller only
/// wants a price.
const PLACEHOLDER_TAKER: Address = model::address!("0000000000000000000000000000000000000001");

/// Bebop's numeric error vocabulary. 1xx are quote-stage failures, 2xx
/// order-stage ones.
fn error_kind(code: i64) -> ErrorKind {
    match code {
        101 => ErrorKind::ValidationFailed,
        102 => ErrorKind::InsufficientLiquidity,
        103 => ErrorKind::EstimationFailed,
        104 | 106 => ErrorKind::PriceUnavailable,
        105 => ErrorKind::InvalidTokens,
        204 => ErrorKind::InsufficientBalance,
        205 => ErrorKind::InsufficientAllowance,
        522 => ErrorKind::ProviderTimeout,
        _ => ErrorKind::ProviderUnspecified,
    }
}

pub struct Bebop {
    client: reqwest::Client,
    chains: Arc<Catalog>,
    api_key: String,
    partner: String,
    timeout: Duration,
    base_url: Url,
}

impl Bebop {
    pub fn new(
        client: reqwest::Client,
        chains: Arc<Catalog>,
        api_key: String,
        partner: String,
    ) -> Self {
        Self {
            client,
            chains,
            api_key,
            partner,
            timeout: DEFAULT_TIMEOUT,
            base_url: Url::parse(BASE_URL).expect("static url"),
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

    fn quote_url(&self, chain_id: u64) -> Url {
        let network = match self.chains.by_id(chain_id) {
            Some(chain) if chain.chain_id != 1 => chain.name.to_lowercase(),
            _ => "ethereum".to_owned(),
        };
        Url::parse(&format!(
            "{}/{network}/v{TRADING_API_VERSION}/quote",
            self.base_url.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape")
    }

    async fn fetch_quote(
        &self,
        buy_token: Address,
        sell_token: Address,
        sell_amount: U256,
        chain_id: u64,
        taker: Option<Address>,
        skip_validation: bool,
    ) -> Result<QuoteResponse, AggregationError> {
        let mut url = self.quote_url(chain_id);
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("sell_tokens", &sell_token.to_checksum(None))
                .append_pair("buy_tokens", &buy_token.to_checksum(None))
                .append_pair("sell_amounts", &sell_amount.to_string())
                .append_pair("source", &self.partner)
                .append_pair(
                    "taker_address",
                    &taker.unwrap_or(PLACEHOLDER_TAKER).to_checksum(None),
                )
                .append_pair("approval_type", "Standard")
                .append_pair("gasless", "0")
                .append_pair("skip_validation", if skip_validation { "1" } else { "0" });
        }
        let body = http::send_json(
            NAME,
            self.client
                .get(url)
                .header("Source-Auth", &self.api_key)
                .timeout(self.timeout),
        )
        .await
        .map_err(classify)?;
        // Errors can arrive with status 200.
        if body.get("error").is_some() {
            return Err(classify_body(&body));
        }
        serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
    }
}

fn classify(err: UpstreamError) -> AggregationError {
    match err {
        UpstreamError::Failed(err) => err,
        UpstreamError::Refused(refusal) => classify_body(&refusal.body),
    }
}

fn classify_body(body: &Value) -> AggregationError {
    let Some(error) = body.get("error") else {
        return AggregationError::for_provider(
            ErrorKind::ProviderUnspecified,
            NAME,
            body.to_string(),
        );
    };
    let code = error.get("errorCode").and_then(Value::as_i64).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown bebop error");
    AggregationError::for_provider(error_kind(code), NAME, message)
        .with_detail("error_code", code)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    tx: RawTx,
    buy_tokens: Map<String, Value>,
    sell_tokens: Map<String, Value>,
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

impl QuoteResponse {
    /// Single-pair swaps carry exactly one entry per token map.
    fn token_field(tokens: &Map<String, Value>, field: &str) -> Result<Value, AggregationError> {
        tokens
            .values()
            .next()
            .and_then(|token| token.get(field))
            .cloned()
            .ok_or_else(|| http::missing(NAME, field))
    }

    fn amount(tokens: &Map<String, Value>, field: &str) -> Result<U256, AggregationError> {
        let value = Self::token_field(tokens, field)?;
        match value {
            Value::String(amount) => amount
                .parse()
                .map_err(|_| http::missing(NAME, field)),
            Value::Number(amount) => amount
                .as_u64()
                .map(U256::from)
                .ok_or_else(|| http::missing(NAME, field)),
            _ => Err(http::missing(NAME, field)),
        }
    }

    fn price(tokens: &Map<String, Value>, field: &str) -> Result<String, AggregationError> {
        let value = Self::token_field(tokens, field)?;
        match value {
            Value::String(price) => Ok(price),
            Value::Number(price) => Ok(price.to_string()),
            _ => Err(http::missing(NAME, field)),
        }
    }
}

/// Bebop fills from its own RFQ inventory; there is no routing to report.
fn sources() -> Vec<SwapSource> {
    vec![SwapSource::new("bebop", 100.)]
}

#[async_trait::async_trait]
impl Provider for Bebop {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let response = self
            .fetch_quote(
                query.buy_token,
                query.sell_token,
                query.sell_amount,
                query.chain_id,
                query.taker_address,
                true,
            )
            .await?;
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: sources(),
            buy_amount: QuoteResponse::amount(&response.buy_tokens, "amountBeforeFee")?,
            gas: response.tx.gas,
            sell_amount: QuoteResponse::amount(&response.sell_tokens, "amount")?,
            gas_price: response.tx.gas_price,
            value: response.tx.value,
            price: QuoteResponse::price(&response.sell_tokens, "priceBeforeFee")?,
            allowance_target: Some(response.tx.to),
        })
    }

    async fn get_quote(&self, query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
        let response = self
            .fetch_quote(
                query.buy_token,
                query.sell_token,
                query.sell_amount,
                query.chain_id,
                Some(query.taker_address),
                query.ignore_checks,
            )
            .await?;
        Ok(TxQuote {
            sources: sources(),
            buy_amount: QuoteResponse::amount(&response.buy_tokens, "amount")?,
            gas: response.tx.gas,
            sell_amount: QuoteResponse::amount(&response.sell_tokens, "amount")?,
            to: response.tx.to,
            data: response.tx.data.clone(),
            gas_price: response.tx.gas_price,
            value: response.tx.value,
            price: QuoteResponse::price(&response.sell_tokens, "price")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        model::{
            address,
            chain::{ChainInfo, Token},
        },
        serde_json::json,
    };

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::new([ChainInfo {
            name: "polygon".to_owned(),
            chain_id: 137,
            description: String::new(),
            native_token: Token {
                address: address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
                name: "WMATIC".to_owned(),
                symbol: "WMATIC".to_owned(),
                decimals: 18,
            },
            eip1559: true,
        }]))
    }

    fn adapter() -> Bebop {
        Bebop::new(reqwest::Client::new(), catalog(), "key".to_owned(), "dex.guru".to_owned())
    }

    #[test]
    fn mainnet_is_spelled_ethereum_and_others_by_name() {
        assert_eq!(
            adapter().quote_url(1).as_str(),
            "https://api.bebop.xyz/ethereum/v2/quote"
        );
        assert_eq!(
            adapter().quote_url(137).as_str(),
            "https://api.bebop.xyz/polygon/v2/quote"
        );
    }

    #[test]
    fn quote_response_reads_single_token_maps() {
        let response: QuoteResponse = serde_json::from_value(json!({
            "tx": {
                "to": "0xbbbbbbb520d69a9775e85b458c58c648259fad5f",
                "data": "0x4dcebcba",
                "gas": "230000",
                "gasPrice": "30000000000",
                "value": "0",
            },
            "buyTokens": {
                "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2": {
                    "amount": "498000000000000",
                    "amountBeforeFee": "500000000000000",
                    "price": "0.000498",
                    "priceBeforeFee": "0.0005",
                },
            },
            "sellTokens": {
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48": {
                    "amount": "1000000",
                    "price": "2000.0",
                    "priceBeforeFee": "2008.03",
                },
            },
        }))
        .unwrap();
        assert_eq!(
            QuoteResponse::amount(&response.buy_tokens, "amountBeforeFee").unwrap(),
            U256::from(500_000_000_000_000u64)
        );
        assert_eq!(
            QuoteResponse::price(&response.sell_tokens, "priceBeforeFee").unwrap(),
            "2008.03"
        );
        assert_eq!(
            response.tx.to,
            address!("bbbbbbb520d69a9775e85b458c58c648259fad5f")
        );
    }

    #[test]
    fn structured_errors_map_by_code() {
        let body = json!({
            "error": {
                "errorCode": 102,
                "message": "InsufficientLiquidity: Insufficient liquidity for pairs ['USDC/WETH']",
            },
        });
        let err = classify_body(&body);
        assert_eq!(err.kind, ErrorKind::InsufficientLiquidity);
        assert_eq!(err.details["error_code"], 102);

        let err = classify_body(&json!({"error": {"errorCode": 205, "message": "allowance"}}));
        assert_eq!(err.kind, ErrorKind::InsufficientAllowance);

        let err = classify_body(&json!({"error": {"errorCode": 999, "message": "?"}}));
        assert_eq!(err.kind, ErrorKind::ProviderUnspecified);
    }
}
