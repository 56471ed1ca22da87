//! deBridge DLN cross-chain adapter.
//!
//! <https://docs.debridge.finance> — quoting goes through the DLN order
//! API; order housekeeping (listing, lookup by hash) through a separate
//! statistics API. DLN spells the native coin as the zero address, not the
//! sentinel.

use {
    crate::{
        CrossChainPriceQuery, CrossChainQuoteQuery, CrossChainProvider, DEFAULT_TIMEOUT,
        LimitOrderProviding,
        http::{self, UpstreamError, error_table, missing},
    },
    errors::{AggregationError, ErrorKind},
    model::{
        Address, Bytes, U256, is_native_token,
        number::decimal_price,
        quote::{LimitOrderPayload, PriceQuote, TxQuote},
        u256_decimal,
    },
    regex::Regex,
    serde::Deserialize,
    serde_json::{Value, json},
    std::{sync::LazyLock, time::Duration},
    url::Url,
};

pub const NAME: &str = "debridge";

const TRADING_API: &str = "https://api.dln.trade/v1.0/dln/order";
const ORDER_API: &str = "https://dln-api.debridge.finance/api";

static ERRORS: LazyLock<Vec<(Regex, ErrorKind)>> =
    LazyLock::new(|| error_table(&[("no route found", ErrorKind::InsufficientLiquidity)]));

pub struct Debridge {
    client: reqwest::Client,
    timeout: Duration,
    trading_base: Url,
    order_base: Url,
}

impl Debridge {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            trading_base: Url::parse(TRADING_API).expect("static url"),
            order_base: Url::parse(ORDER_API).expect("static url"),
        }
    }

    pub fn with_base_urls(mut self, trading: Url, orders: Url) -> Self {
        self.trading_base = trading;
        self.order_base = orders;
        self
    }

    /// Overrides the default request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn trading_url(&self, endpoint: &str) -> Url {
        Url::parse(&format!(
            "{}/{endpoint}",
            self.trading_base.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape")
    }

    async fn get(&self, url: Url) -> Result<Value, UpstreamError> {
        http::send_json(NAME, self.client.get(url).timeout(self.timeout)).await
    }

    fn classify(&self, err: UpstreamError) -> AggregationError {
        err.classify(NAME, &ERRORS, message_from_body)
    }
}

/// DLN spells the native coin as the zero address.
fn dln_token(token: Address) -> Address {
    if is_native_token(token) {
        Address::ZERO
    } else {
        token
    }
}

fn message_from_body(body: &Value) -> String {
    body.get("errorMessage")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Deserialize)]
struct TokenAmount {
    #[serde(with = "u256_decimal")]
    amount: U256,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Estimation {
    src_chain_token_in: TokenAmount,
    dst_chain_token_out: TokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    estimation: Estimation,
    #[serde(default)]
    tx: Option<RawTx>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTx {
    #[serde(default)]
    allowance_target: Option<Address>,
    #[serde(default)]
    to: Option<Address>,
    #[serde(default)]
    data: Option<Bytes>,
    #[serde(default, with = "u256_decimal::option")]
    value: Option<U256>,
}

impl Estimation {
    fn price(&self) -> Result<String, AggregationError> {
        decimal_price(
            &self.dst_chain_token_out.amount,
            self.dst_chain_token_out.decimals,
            &self.src_chain_token_in.amount,
            self.src_chain_token_in.decimals,
        )
        .map(|price| price.to_string())
        .ok_or_else(|| missing(NAME, "srcChainTokenIn"))
    }
}

fn decode(body: Value) -> Result<QuoteResponse, AggregationError> {
    serde_json::from_value(body).map_err(|err| AggregationError::parse(NAME, err.to_string()))
}

#[async_trait::async_trait]
impl CrossChainProvider for Debridge {
    fn name(&self) -> &'static str {
        NAME
    }

    /// DLN wants the source-chain gas price resolved before quoting.
    fn requires_gas_price(&self) -> bool {
        true
    }

    async fn get_price(
        &self,
        query: &CrossChainPriceQuery,
    ) -> Result<PriceQuote, AggregationError> {
        let mut url = self.trading_url("quote");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("srcChainId", &query.chain_id_from.to_string())
                .append_pair(
                    "srcChainTokenIn",
                    &format!("{:#x}", dln_token(query.sell_token)),
                )
                .append_pair("srcChainTokenInAmount", &query.sell_amount.to_string())
                .append_pair("dstChainId", &query.chain_id_to.to_string())
                .append_pair(
                    "dstChainTokenOut",
                    &format!("{:#x}", dln_token(query.buy_token)),
                )
                .append_pair(
                    "affiliateFeePercent",
                    &query
                        .buy_token_percentage_fee
                        .map(|fee| (fee * 100.).to_string())
                        .unwrap_or_else(|| "0".to_owned()),
                )
                .append_pair("prependOperatingExpenses", "true");
        }
        let body = self.get(url).await.map_err(|err| self.classify(err))?;
        let response = decode(body)?;
        Ok(PriceQuote {
            provider: NAME.to_owned(),
            sources: Vec::new(),
            buy_amount: response.estimation.dst_chain_token_out.amount,
            gas: U256::ZERO,
            sell_amount: response.estimation.src_chain_token_in.amount,
            gas_price: query.gas_price.unwrap_or(U256::ZERO),
            value: query.value(),
            price: response.estimation.price()?,
            allowance_target: response.tx.and_then(|tx| tx.allowance_target),
        })
    }

    async fn get_quote(
        &self,
        query: &CrossChainQuoteQuery,
    ) -> Result<TxQuote, AggregationError> {
        let taker = format!("{:#x}", query.taker_address);
        let mut url = self.trading_url("create-tx");
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("srcChainId", &query.chain_id_from.to_string())
                .append_pair(
                    "srcChainTokenIn",
                    &format!("{:#x}", dln_token(query.sell_token)),
                )
                .append_pair("srcChainTokenInAmount", &query.sell_amount.to_string())
                .append_pair("dstChainId", &query.chain_id_to.to_string())
                .append_pair(
                    "dstChainTokenOut",
                    &format!("{:#x}", dln_token(query.buy_token)),
                )
                .append_pair("dstChainTokenOutAmount", "auto")
                .append_pair("srcChainOrderAuthorityAddress", &taker)
                .append_pair("dstChainTokenOutRecipient", &taker)
                .append_pair("dstChainOrderAuthorityAddress", &taker);
            if let Some(fee) = query.buy_token_percentage_fee {
                pairs.append_pair("affiliateFeePercent", &(fee * 100.).to_string());
            }
            if let Some(recipient) = query.fee_recipient {
                pairs.append_pair("affiliateFeeRecipient", &format!("{recipient:#x}"));
            }
        }
        let body = self.get(url).await.map_err(|err| self.classify(err))?;
        let response = decode(body)?;
        let price = response.estimation.price()?;
        let tx = response.tx.ok_or_else(|| missing(NAME, "tx"))?;
        Ok(TxQuote {
            sources: Vec::new(),
            buy_amount: response.estimation.dst_chain_token_out.amount,
            gas: U256::ZERO,
            sell_amount: response.estimation.src_chain_token_in.amount,
            to: tx.to.ok_or_else(|| missing(NAME, "tx.to"))?,
            data: tx.data.ok_or_else(|| missing(NAME, "tx.data"))?,
            gas_price: U256::ZERO,
            value: tx.value.unwrap_or(U256::ZERO),
            price,
        })
    }

    fn limit_orders(&self) -> Option<&dyn LimitOrderProviding> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl LimitOrderProviding for Debridge {
    async fn orders_by_trader(
        &self,
        chain_id: u64,
        trader: Address,
        _maker_token: Option<Address>,
        _taker_token: Option<Address>,
        _statuses: Option<Vec<String>>,
    ) -> Result<Value, AggregationError> {
        let url = Url::parse(&format!(
            "{}/Orders/filteredList",
            self.order_base.as_str().trim_end_matches('/'),
        ))
        .expect("static url shape");
        let body = json!({
            "giveChainIds": [chain_id],
            "orderStates": [],
            "creator": format!("{trader:#x}"),
            "skip": 0,
            "take": 1_000_000,
        });
        http::send_json(
            NAME,
            self.client.post(url).json(&body).timeout(self.timeout),
        )
        .await
        .map_err(|err| self.classify(err))
    }

    async fn order_by_hash(
        &self,
        _chain_id: u64,
        order_hash: &str,
    ) -> Result<Value, AggregationError> {
        let url = self.trading_url(order_hash);
        self.get(url).await.map_err(|err| self.classify(err))
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
            "DLN orders are created on-chain, not posted through the API",
        ))
    }
}
