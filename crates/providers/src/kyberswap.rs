//! KyberSwap aggregator adapter.
//!
//! One endpoint serves both price and quote:
//! `https://aggregator-api.kyberswap.com/{network}/route/encode`, where
//! `{network}` is a chain name, not an id.

use {
    crate::{
        DEFAULT_TIMEOUT, PriceQuery, Provider, QuoteQuery,
        http::{self, error_table, missing},
    },
    bigdecimal::BigDecimal,
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, NATIVE_TOKEN_SENTINEL, U256,
        chain::Catalog,
        is_native_token,
        number::decimal_price,
        quote::{PriceQuote, SwapSource, TxQuote},
        u256_decimal,
    },
    num::BigInt,
    regex::Regex,
    serde::Deserialize,
    serde_json::Value,
    std::{
        collections::HashMap,
        str::FromStr,
        sync::{Arc, LazyLock},
        time::Duration,
    },
    url::Url,
};

pub const NAME: &str = "kyberswap";

const TRADING_API: &str = "https://aggregator-api.kyberswap.com";
const ACCEPT_VERSION: &str = "1";

static ERRORS: LazyLock<Vec<(Regex, ErrorKind)>> =
    LazyLock::new(|| error_table(&[("insufficient liquidity", ErrorKind::InsufficientLiquidity)]));

fn network_name(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("ethereum"),
        10 => Some("optimism"),
        56 => Some("bsc"),
        137 => Some("polygon"),
        250 => Some("fantom"),
        42161 => Some("arbitrum"),
        43114 => Some("avalanche"),
        _ => None,
    }
}

pub struct KyberSwap {
    client: reqwest::Client,
    chains: Arc<Catalog>,
    partner: String,
    timeout: Duration,
    base_url: Url,
}

impl KyberSwap {
    pub fn new(client: reqwest::Client, chains: Arc<Catalog>, partner: String) -> Self {
        Self {
            client,
            chains,
            partner,
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

    fn route_url(&self, query: &PriceQuery, taker: Option<Address>) -> Result<Url, AggregationError> {
        let network = network_name(query.chain_id).ok_or_else(|| {
            AggregationError::for_provider(
                ErrorKind::ValidationFailed,
                NAME,
                format!("chain {} is not routed by kyberswap", query.chain_id),
            )
        })?;
        let mut url = Url::parse(&format!(
            "{}/{network}/route/encode",
            self.base_url.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("tokenIn", &format!("{:#x}", query.sell_token))
                .append_pair("tokenOut", &format!("{:#x}", query.buy_token))
                .append_pair("amountIn", &query.sell_amount.to_string())
                .append_pair("clientData", &format!("{{\"source\":\"{}\"}}", self.partner));
            // The endpoint insists on a recipient; quoting without a taker
            // uses the sentinel as a stand-in.
            let to = taker.unwrap_or(NATIVE_TOKEN_SENTINEL);
            pairs.append_pair("to", &format!("{to:#x}"));
            if let Some(slippage) = query.slippage_percentage {
                // Fraction to basis points, 0.1% == 10.
                pairs.append_pair(
                    "slippageTolerance",
                    &((slippage * 10_000.).round() as u64).to_string(),
                );
            }
            if let (Some(recipient), Some(fee)) =
                (query.fee_recipient, query.buy_token_percentage_fee)
            {
                pairs
                    .append_pair("chargeFeeBy", "currency_out")
                    .append_pair("feeReceiver", &format!("{recipient:#x}"))
                    .append_pair("isInBps", "1")
                    .append_pair("feeAmount", &((fee * 10_000.).round() as u64).to_string());
            }
        }
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<RouteResponse, AggregationError> {
        let body = http::send_json(
            NAME,
            self.client
                .get(url)
                .header("Accept-Version", ACCEPT_VERSION)
                .timeout(self.timeout),
        )
        .await
        .map_err(|err| err.classify(NAME, &ERRORS, message_from_body))?;
        serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
    }

    /// Sell/buy decimals come from the response's token table; the native
    /// sentinel is not in it and resolves through the chain catalog.
    fn token_decimals(
        &self,
        response: &RouteResponse,
        token: Address,
        chain_id: u64,
    ) -> Result<u8, AggregationError> {
        if is_native_token(token) {
            return self
                .chains
                .by_id(chain_id)
                .map(|chain| chain.native_token.decimals)
                .ok_or_else(|| missing(NAME, "native token decimals"));
        }
        response
            .tokens
            .get(&token)
            .map(|meta| meta.decimals)
            .ok_or_else(|| missing(NAME, "tokens"))
    }

    fn to_price_quote(
        &self,
        response: &RouteResponse,
        query: &PriceQuery,
    ) -> Result<PriceQuote, AggregationError> {
        let sell_decimals = self.token_decimals(response, query.sell_token, query.chain_id)?;
        let buy_decimals = self.token_decimals(response, query.buy_token, query.chain_id)?;
        let price = decimal_price(
            &response.output_amount,
            buy_decimals,
            &response.input_amount,
            sell_decimals,
        )
        .map(|price| price.to_string())
        .ok_or_else(|| missing(NAME, "inputAmount"))?;
        let value = if is_native_token(query.sell_token) {
            response.input_amount
        } else {
            U256::ZERO
        };
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: convert_sources(&response.swaps),
            buy_amount: response.output_amount,
            gas: response.total_gas,
            sell_amount: response.input_amount,
            gas_price: gwei_to_wei(&response.gas_price_gwei)?,
            value,
            price,
            allowance_target: None,
        })
    }
}

fn message_from_body(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

/// `gasPriceGwei` is a decimal string like `"25.5"`.
fn gwei_to_wei(gwei: &str) -> Result<U256, AggregationError> {
    let gwei = BigDecimal::from_str(gwei)
        .map_err(|err| AggregationError::parse(NAME, format!("bad gasPriceGwei {gwei:?}: {err}")))?;
    let wei = (gwei * BigDecimal::from(1_000_000_000u64)).with_scale(0);
    let (digits, _) = wei.into_bigint_and_exponent();
    big_int_to_u256(&digits)
        .ok_or_else(|| AggregationError::parse(NAME, "gas price exceeds 256 bits"))
}

fn big_int_to_u256(value: &BigInt) -> Option<U256> {
    let (sign, bytes) = value.to_bytes_be();
    if sign == num::bigint::Sign::Minus || bytes.len() > 32 {
        return None;
    }
    Some(U256::from_be_slice(&bytes))
}

#[derive(Debug, Deserialize)]
struct TokenMeta {
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteResponse {
    #[serde(with = "u256_decimal")]
    input_amount: U256,
    #[serde(with = "u256_decimal")]
    output_amount: U256,
    #[serde(with = "u256_decimal")]
    total_gas: U256,
    gas_price_gwei: String,
    #[serde(default)]
    tokens: HashMap<Address, TokenMeta>,
    #[serde(default)]
    swaps: Vec<Vec<RawSwap>>,
    #[serde(default)]
    router_address: Option<Address>,
    #[serde(default)]
    encoded_swap_data: Option<Bytes>,
}

#[derive(Debug, Deserialize)]
struct RawSwap {
    exchange: String,
}

/// Kyber reports hops without shares; sources carry a zero proportion.
fn convert_sources(swaps: &[Vec<RawSwap>]) -> Vec<SwapSource> {
    swaps
        .iter()
        .flatten()
        .map(|swap| SwapSource::new(&swap.exchange, 0.))
        .collect()
}

#[async_trait::async_trait]
impl Provider for KyberSwap {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let url = self.route_url(query, query.taker_address)?;
        let response = self.fetch(url).await?;
        self.to_price_quote(&response, query)
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
        let url = self.route_url(&price_view, Some(query.taker_address))?;
        let response = self.fetch(url).await?;
        let price = self.to_price_quote(&response, &price_view)?;
        Ok(TxQuote {
            to: response
                .router_address
                .ok_or_else(|| missing(NAME, "routerAddress"))?,
            data: response
                .encoded_swap_data
                .ok_or_else(|| missing(NAME, "encodedSwapData"))?,
            sources: price.sources,
            buy_amount: price.buy_amount,
            gas: price.gas,
            sell_amount: price.sell_amount,
            gas_price: price.gas_price,
            value: price.value,
            price: price.price,
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
            name: "ethereum".to_owned(),
            chain_id: 1,
            description: String::new(),
            native_token: Token {
                address: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
                name: "WETH".to_owned(),
                symbol: "WETH".to_owned(),
                decimals: 18,
            },
            eip1559: true,
        }]))
    }

    fn adapter() -> KyberSwap {
        KyberSwap::new(reqwest::Client::new(), catalog(), "dex.guru".to_owned())
    }

    fn query() -> PriceQuery {
        PriceQuery {
            buy_token: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            sell_token: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            sell_amount: U256::from(1_000_000u64),
            chain_id: 1,
            gas_price: None,
            slippage_percentage: Some(0.001),
            taker_address: None,
            fee_recipient: None,
            buy_token_percentage_fee: None,
        }
    }

    #[test]
    fn url_uses_network_name_and_sentinel_taker() {
        let url = adapter().route_url(&query(), None).unwrap();
        assert!(
            url.as_str()
                .starts_with("https://aggregator-api.kyberswap.com/ethereum/route/encode?")
        );
        assert!(
            url.as_str()
                .contains("to=0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee")
        );
        assert!(url.as_str().contains("slippageTolerance=10"));
    }

    #[test]
    fn unsupported_chain_is_rejected() {
        let mut q = query();
        q.chain_id = 8453;
        let err = adapter().route_url(&q, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
    }

    #[test]
    fn gwei_conversion_is_exact() {
        assert_eq!(gwei_to_wei("25").unwrap(), U256::from(25_000_000_000u64));
        assert_eq!(gwei_to_wei("25.5").unwrap(), U256::from(25_500_000_000u64));
        assert!(gwei_to_wei("abc").is_err());
    }

    #[test]
    fn route_response_prices_with_catalog_decimals_for_native() {
        let response: RouteResponse = serde_json::from_value(json!({
            "inputAmount": "1000000",
            "outputAmount": "500000000000000",
            "totalGas": "160000",
            "gasPriceGwei": "20",
            "tokens": {
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48": {"decimals": 6},
                "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2": {"decimals": 18},
            },
            "swaps": [[{"exchange": "kyberswap"}, {"exchange": "uniswap"}]],
            "routerAddress": "0x00555513acf282b42882420e5e5ba87b44d8fa6e",
            "encodedSwapData": "0x59e50fed",
        }))
        .unwrap();
        let quote = adapter().to_price_quote(&response, &query()).unwrap();
        assert_eq!(quote.price, "0.0005");
        assert_eq!(quote.gas_price, U256::from(20_000_000_000u64));
        assert_eq!(
            quote.sources,
            vec![SwapSource::new("kyberswap", 0.), SwapSource::new("uniswap", 0.)]
        );
    }
}
