//! ParaSwap v5 adapter.
//!
//! Quoting is a two-step flow: `GET /prices` produces a `priceRoute` which
//! is posted back verbatim to `POST /transactions/{chain}` to obtain
//! calldata. The `priceRoute` must not be modified in between, the
//! transactions endpoint rejects tampered routes.

use {
    crate::{
        DEFAULT_TIMEOUT, PriceQuery, Provider, QuoteQuery,
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
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value, json},
    std::{sync::LazyLock, time::Duration},
    url::Url,
};

pub const NAME: &str = "paraswap";

const MAIN_API_URL: &str = "https://api.paraswap.io";
const VERSION: &str = "6.2";

static ERRORS: LazyLock<Vec<(Regex, ErrorKind)>> = LazyLock::new(|| {
    error_table(&[
        ("invalid tokens", ErrorKind::InvalidTokens),
        ("token not found", ErrorKind::InvalidTokens),
        ("price timeout", ErrorKind::PriceUnavailable),
        ("computeprice error", ErrorKind::PriceUnavailable),
        ("bad usd price", ErrorKind::PriceUnavailable),
        ("error_getting_prices", ErrorKind::PriceUnavailable),
        ("unable to check price impact", ErrorKind::PriceUnavailable),
        (r"not enough \w+ balance", ErrorKind::InsufficientBalance),
        (r"not enough \w+ allowance", ErrorKind::InsufficientAllowance),
        (
            "it seems like your wallet doesn't contain enough",
            ErrorKind::InsufficientBalance,
        ),
        ("network mismatch", ErrorKind::ValidationFailed),
        ("missing srcamount", ErrorKind::ValidationFailed),
        ("missing destamount", ErrorKind::ValidationFailed),
        (
            "cannot specify both slippage and destamount",
            ErrorKind::ValidationFailed,
        ),
        ("missing slippage or destamount", ErrorKind::ValidationFailed),
        ("source amount mismatch", ErrorKind::ValidationFailed),
        ("destination amount mismatch", ErrorKind::ValidationFailed),
        ("source token mismatch", ErrorKind::ValidationFailed),
        ("destination token mismatch", ErrorKind::ValidationFailed),
        ("error parsing params", ErrorKind::ValidationFailed),
        (
            "priceroute must be unmodified as sent by the price endpoint",
            ErrorKind::ValidationFailed,
        ),
        ("unable to process the transaction", ErrorKind::EstimationFailed),
        ("error_building_transaction", ErrorKind::EstimationFailed),
    ])
});

pub struct ParaSwap {
    client: reqwest::Client,
    partner: String,
    timeout: Duration,
    base_url: Url,
}

impl ParaSwap {
    pub fn new(client: reqwest::Client, partner: String) -> Self {
        Self {
            client,
            partner,
            timeout: DEFAULT_TIMEOUT,
            base_url: Url::parse(MAIN_API_URL).expect("static url"),
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

    fn prices_url(
        &self,
        buy_token: Address,
        sell_token: Address,
        sell_amount: U256,
        chain_id: u64,
        taker: Option<Address>,
    ) -> Url {
        let mut url = self.base_url.join("prices").expect("static url shape");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("srcToken", &format!("{sell_token:#x}"))
                .append_pair("destToken", &format!("{buy_token:#x}"))
                .append_pair("amount", &sell_amount.to_string())
                .append_pair("side", "SELL")
                .append_pair("network", &chain_id.to_string())
                .append_pair("otherExchangePrices", "false")
                .append_pair("partner", &self.partner)
                .append_pair("version", VERSION);
            if let Some(taker) = taker {
                pairs.append_pair("userAddress", &format!("{taker:#x}"));
            }
        }
        url
    }

    fn transactions_url(&self, chain_id: u64, gas_price: Option<U256>, ignore_checks: bool) -> Url {
        let mut url = self
            .base_url
            .join(&format!("transactions/{chain_id}"))
            .expect("static url shape");
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ignoreChecks", &ignore_checks.to_string());
            if let Some(gas_price) = gas_price {
                pairs.append_pair("gasPrice", &gas_price.to_string());
            }
        }
        url
    }

    async fn fetch_price_route(&self, url: Url) -> Result<PriceRoute, AggregationError> {
        let body = http::send_json(NAME, self.client.get(url).timeout(self.timeout))
            .await
            .map_err(|err| self.classify(err))?;
        let response: PricesResponse = decode(body)?;
        Ok(response.price_route)
    }

    fn classify(&self, err: UpstreamError) -> AggregationError {
        err.classify(NAME, &ERRORS, message_from_body)
    }
}

/// ParaSwap error bodies are flat: `{"error": "..."}`.
fn message_from_body(body: &Value) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricesResponse {
    price_route: PriceRoute,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceRoute {
    network: u64,
    #[serde(with = "u256_decimal")]
    src_amount: U256,
    #[serde(with = "u256_decimal")]
    dest_amount: U256,
    src_decimals: u8,
    dest_decimals: u8,
    #[serde(with = "u256_decimal")]
    gas_cost: U256,
    token_transfer_proxy: Address,
    #[serde(default)]
    best_route: Vec<RawRoute>,
    /// Everything else, carried so the route can be posted back unmodified.
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawRoute {
    #[serde(default)]
    swaps: Vec<RawSwap>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawSwap {
    #[serde(default)]
    swap_exchanges: Vec<RawExchange>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RawExchange {
    exchange: String,
    percent: f64,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionsResponse {
    to: Address,
    data: Bytes,
    #[serde(default, with = "u256_decimal::option")]
    gas: Option<U256>,
    #[serde(with = "u256_decimal")]
    gas_price: U256,
    #[serde(with = "u256_decimal")]
    value: U256,
}

impl PriceRoute {
    /// Re-serializes the route exactly as received for the transactions
    /// endpoint.
    fn as_value(&self) -> Value {
        let mut object = self.rest.clone();
        object.insert("network".into(), json!(self.network));
        object.insert("srcAmount".into(), json!(self.src_amount.to_string()));
        object.insert("destAmount".into(), json!(self.dest_amount.to_string()));
        object.insert("srcDecimals".into(), json!(self.src_decimals));
        object.insert("destDecimals".into(), json!(self.dest_decimals));
        object.insert("gasCost".into(), json!(self.gas_cost.to_string()));
        object.insert(
            "tokenTransferProxy".into(),
            json!(format!("{:#x}", self.token_transfer_proxy)),
        );
        object.insert(
            "bestRoute".into(),
            serde_json::to_value(&self.best_route).unwrap_or(Value::Null),
        );
        Value::Object(object)
    }

    fn sources(&self) -> Vec<SwapSource> {
        self.best_route
            .iter()
            .flat_map(|route| &route.swaps)
            .flat_map(|swap| &swap.swap_exchanges)
            .map(|exchange| SwapSource::new(&exchange.exchange, exchange.percent))
            .collect()
    }

    fn price(&self) -> Result<String, AggregationError> {
        decimal_price(
            &self.dest_amount,
            self.dest_decimals,
            &self.src_amount,
            self.src_decimals,
        )
        .map(|price| price.to_string())
        .ok_or_else(|| missing(NAME, "srcAmount"))
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AggregationError> {
    serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
}

#[async_trait::async_trait]
impl Provider for ParaSwap {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<PriceQuote, AggregationError> {
        let url = self.prices_url(
            query.buy_token,
            query.sell_token,
            query.sell_amount,
            query.chain_id,
            None,
        );
        let route = self.fetch_price_route(url).await?;
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: route.sources(),
            buy_amount: route.dest_amount,
            gas: route.gas_cost,
            sell_amount: route.src_amount,
            gas_price: query.gas_price.unwrap_or(U256::ZERO),
            value: query.value(),
            price: route.price()?,
            allowance_target: Some(route.token_transfer_proxy),
        })
    }

    async fn get_quote(&self, query: &QuoteQuery) -> Result<TxQuote, AggregationError> {
        let prices_url = self.prices_url(
            query.buy_token,
            query.sell_token,
            query.sell_amount,
            query.chain_id,
            Some(query.taker_address),
        );
        let route = self.fetch_price_route(prices_url).await?;
        let price = route.price()?;
        let sources = route.sources();

        let mut body = json!({
            "srcToken": format!("{:#x}", query.sell_token),
            "destToken": format!("{:#x}", query.buy_token),
            "srcAmount": query.sell_amount.to_string(),
            "priceRoute": route.as_value(),
            "userAddress": format!("{:#x}", query.taker_address),
            "partner": self.partner,
            "srcDecimals": route.src_decimals,
            "destDecimals": route.dest_decimals,
        });
        match query.slippage_percentage {
            // Fractions map to basis points, 1% == 100 bps.
            Some(fraction) => body["slippage"] = json!((fraction * 10_000.).round() as u64),
            None => body["destAmount"] = json!(route.dest_amount.to_string()),
        }
        if let Some(fee) = query.buy_token_percentage_fee {
            body["partnerFeeBps"] = json!((fee * 10_000.).round() as u64);
        }
        if let Some(recipient) = query.fee_recipient {
            body["partnerAddress"] = json!(format!("{recipient:#x}"));
        }

        let url = self.transactions_url(route.network, query.gas_price, query.ignore_checks);
        let response = http::send_json(
            NAME,
            self.client.post(url).json(&body).timeout(self.timeout),
        )
        .await
        .map_err(|err| self.classify(err))?;
        let transaction: TransactionsResponse = decode(response)?;
        Ok(TxQuote {
            sources,
            buy_amount: route.dest_amount,
            gas: transaction.gas.unwrap_or(U256::ZERO),
            sell_amount: route.src_amount,
            to: transaction.to,
            data: transaction.data,
            gas_price: transaction.gas_price,
            value: transaction.value,
            price,
        })
    }
}

#[cfg(test)]
mod tests {
    use {super::*, model::address, serde_json::json};

    fn adapter() -> ParaSwap {
        ParaSwap::new(reqwest::Client::new(), "dex.guru".to_owned())
    }

    fn route_fixture() -> Value {
        json!({
            "priceRoute": {
                "network": 1,
                "srcAmount": "1000000",
                "destAmount": "500000000000000",
                "srcDecimals": 6,
                "destDecimals": 18,
                "gasCost": "150000",
                "tokenTransferProxy": "0x216b4b4ba9f3e719726886d34a177484278bfcae",
                "blockNumber": 19000000,
                "bestRoute": [{
                    "percent": 100,
                    "swaps": [{
                        "srcToken": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                        "swapExchanges": [
                            {"exchange": "UniswapV3", "percent": 60.0, "poolAddresses": []},
                            {"exchange": "CurveV2", "percent": 40.0},
                        ],
                    }],
                }],
            },
        })
    }

    #[test]
    fn prices_url_carries_partner_and_version() {
        let url = adapter().prices_url(
            address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            U256::from(1_000_000u64),
            1,
            None,
        );
        assert_eq!(
            url.as_str(),
            "https://api.paraswap.io/prices\
             ?srcToken=0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48\
             &destToken=0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2\
             &amount=1000000\
             &side=SELL\
             &network=1\
             &otherExchangePrices=false\
             &partner=dex.guru\
             &version=6.2",
        );
    }

    #[test]
    fn route_decodes_and_recomputes_price() {
        let response: PricesResponse = decode(route_fixture()).unwrap();
        let route = response.price_route;
        assert_eq!(route.price().unwrap(), "0.0005");
        assert_eq!(
            route.sources(),
            vec![
                SwapSource::new("UniswapV3", 60.),
                SwapSource::new("CurveV2", 40.),
            ]
        );
        assert_eq!(
            route.token_transfer_proxy,
            address!("216b4b4ba9f3e719726886d34a177484278bfcae")
        );
    }

    #[test]
    fn route_round_trips_unknown_fields_for_the_transactions_call() {
        let response: PricesResponse = decode(route_fixture()).unwrap();
        let value = response.price_route.as_value();
        assert_eq!(value["blockNumber"], json!(19000000));
        assert_eq!(value["srcAmount"], json!("1000000"));
        assert_eq!(value["bestRoute"][0]["percent"], json!(100));
        assert_eq!(
            value["bestRoute"][0]["swaps"][0]["swapExchanges"][1]["percent"],
            json!(40.0)
        );
    }

    #[test]
    fn error_table_maps_the_documented_vocabulary() {
        for (message, expected) in [
            ("Invalid tokens", ErrorKind::InvalidTokens),
            ("Price Timeout", ErrorKind::PriceUnavailable),
            ("Not enough DAI allowance", ErrorKind::InsufficientAllowance),
            ("Network Mismatch", ErrorKind::ValidationFailed),
            ("ERROR_BUILDING_TRANSACTION", ErrorKind::EstimationFailed),
            ("mystery", ErrorKind::ProviderUnspecified),
        ] {
            assert_eq!(http::match_error(&ERRORS, message), expected, "{message}");
        }
        assert_eq!(
            message_from_body(&json!({"error": "Token not found"})),
            "Token not found"
        );
    }

    #[test]
    fn transactions_response_decodes() {
        let tx: TransactionsResponse = decode(json!({
            "to": "0xdef171fe48cf0115b1d80b88dc8eab59176fee57",
            "data": "0xa6886da9",
            "gasPrice": "20000000000",
            "value": "0",
            "gas": "210000",
        }))
        .unwrap();
        assert_eq!(tx.gas, Some(U256::from(210_000u64)));
    }
}
