//! Query-parameter envelopes and their validation into engine queries.
//!
//! Everything arrives as strings; addresses are normalized exactly once
//! here, amounts must be positive decimal integers fitting 256 bits.

use {
    errors::AggregationError,
    model::{Address, U256, quote::LimitOrderPayload},
    providers::{CrossChainPriceQuery, CrossChainQuoteQuery, PriceQuery, QuoteQuery},
    serde::Deserialize,
};

fn parse_address(field: &str, raw: &str) -> Result<Address, AggregationError> {
    model::address::normalize(raw)
        .map_err(|err| AggregationError::validation(format!("{field}: {err}")))
}

fn parse_address_opt(
    field: &str,
    raw: Option<&String>,
) -> Result<Option<Address>, AggregationError> {
    raw.map(|raw| parse_address(field, raw)).transpose()
}

fn parse_sell_amount(raw: &str) -> Result<U256, AggregationError> {
    let amount: U256 = raw
        .parse()
        .map_err(|_| AggregationError::validation(format!("sellAmount is not an integer: {raw:?}")))?;
    if amount.is_zero() {
        return Err(AggregationError::validation("sellAmount must be positive"));
    }
    Ok(amount)
}

fn parse_gas_price(raw: Option<&String>) -> Result<Option<U256>, AggregationError> {
    let Some(raw) = raw else { return Ok(None) };
    let gas_price: U256 = raw
        .parse()
        .map_err(|_| AggregationError::validation(format!("gasPrice is not an integer: {raw:?}")))?;
    if gas_price.is_zero() {
        return Err(AggregationError::validation("gasPrice must be positive"));
    }
    Ok(Some(gas_price))
}

fn default_slippage() -> Option<f64> {
    Some(0.005)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceParams {
    buy_token: String,
    sell_token: String,
    sell_amount: String,
    gas_price: Option<String>,
    #[serde(default = "default_slippage")]
    slippage_percentage: Option<f64>,
    taker_address: Option<String>,
    fee_recipient: Option<String>,
    buy_token_percentage_fee: Option<f64>,
    pub provider: Option<String>,
}

impl PriceParams {
    pub fn into_query(self, chain_id: u64) -> Result<PriceQuery, AggregationError> {
        Ok(PriceQuery {
            buy_token: parse_address("buyToken", &self.buy_token)?,
            sell_token: parse_address("sellToken", &self.sell_token)?,
            sell_amount: parse_sell_amount(&self.sell_amount)?,
            chain_id,
            gas_price: parse_gas_price(self.gas_price.as_ref())?,
            slippage_percentage: self.slippage_percentage,
            taker_address: parse_address_opt("takerAddress", self.taker_address.as_ref())?,
            fee_recipient: parse_address_opt("feeRecipient", self.fee_recipient.as_ref())?,
            buy_token_percentage_fee: self.buy_token_percentage_fee,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    buy_token: String,
    sell_token: String,
    sell_amount: String,
    pub provider: String,
    gas_price: Option<String>,
    slippage_percentage: Option<f64>,
    taker_address: Option<String>,
    fee_recipient: Option<String>,
    buy_token_percentage_fee: Option<f64>,
    #[serde(default)]
    ignore_checks: bool,
}

impl QuoteParams {
    pub fn into_query(self, chain_id: u64) -> Result<QuoteQuery, AggregationError> {
        let taker_address = self
            .taker_address
            .as_ref()
            .ok_or_else(|| AggregationError::validation("takerAddress is required for quotes"))?;
        Ok(QuoteQuery {
            buy_token: parse_address("buyToken", &self.buy_token)?,
            sell_token: parse_address("sellToken", &self.sell_token)?,
            sell_amount: parse_sell_amount(&self.sell_amount)?,
            chain_id,
            taker_address: parse_address("takerAddress", taker_address)?,
            gas_price: parse_gas_price(self.gas_price.as_ref())?,
            slippage_percentage: self.slippage_percentage,
            fee_recipient: parse_address_opt("feeRecipient", self.fee_recipient.as_ref())?,
            buy_token_percentage_fee: self.buy_token_percentage_fee,
            ignore_checks: self.ignore_checks,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainPriceParams {
    buy_token: String,
    sell_token: String,
    sell_amount: String,
    chain_id_from: u64,
    chain_id_to: u64,
    pub provider: String,
    gas_price: Option<String>,
    #[serde(default = "default_slippage")]
    slippage_percentage: Option<f64>,
    taker_address: Option<String>,
    fee_recipient: Option<String>,
    buy_token_percentage_fee: Option<f64>,
}

impl CrossChainPriceParams {
    pub fn into_query(self) -> Result<CrossChainPriceQuery, AggregationError> {
        Ok(CrossChainPriceQuery {
            buy_token: parse_address("buyToken", &self.buy_token)?,
            sell_token: parse_address("sellToken", &self.sell_token)?,
            sell_amount: parse_sell_amount(&self.sell_amount)?,
            chain_id_from: self.chain_id_from,
            chain_id_to: self.chain_id_to,
            gas_price: parse_gas_price(self.gas_price.as_ref())?,
            slippage_percentage: self.slippage_percentage,
            taker_address: parse_address_opt("takerAddress", self.taker_address.as_ref())?,
            fee_recipient: parse_address_opt("feeRecipient", self.fee_recipient.as_ref())?,
            buy_token_percentage_fee: self.buy_token_percentage_fee,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossChainQuoteParams {
    buy_token: String,
    sell_token: String,
    sell_amount: String,
    chain_id_from: u64,
    chain_id_to: u64,
    pub provider: String,
    gas_price: Option<String>,
    slippage_percentage: Option<f64>,
    taker_address: Option<String>,
    fee_recipient: Option<String>,
    buy_token_percentage_fee: Option<f64>,
}

impl CrossChainQuoteParams {
    pub fn into_query(self) -> Result<CrossChainQuoteQuery, AggregationError> {
        let taker_address = self
            .taker_address
            .as_ref()
            .ok_or_else(|| AggregationError::validation("takerAddress is required for quotes"))?;
        Ok(CrossChainQuoteQuery {
            buy_token: parse_address("buyToken", &self.buy_token)?,
            sell_token: parse_address("sellToken", &self.sell_token)?,
            sell_amount: parse_sell_amount(&self.sell_amount)?,
            chain_id_from: self.chain_id_from,
            chain_id_to: self.chain_id_to,
            taker_address: parse_address("takerAddress", taker_address)?,
            gas_price: parse_gas_price(self.gas_price.as_ref())?,
            slippage_percentage: self.slippage_percentage,
            fee_recipient: parse_address_opt("feeRecipient", self.fee_recipient.as_ref())?,
            buy_token_percentage_fee: self.buy_token_percentage_fee,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderListParams {
    pub provider: String,
    pub maker_token: Option<String>,
    pub taker_token: Option<String>,
    pub statuses: Option<String>,
}

impl LimitOrderListParams {
    pub fn tokens(&self) -> Result<(Option<Address>, Option<Address>), AggregationError> {
        Ok((
            parse_address_opt("makerToken", self.maker_token.as_ref())?,
            parse_address_opt("takerToken", self.taker_token.as_ref())?,
        ))
    }

    pub fn statuses(&self) -> Option<Vec<String>> {
        self.statuses
            .as_ref()
            .map(|statuses| statuses.split(',').map(str::to_owned).collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderProviderParams {
    pub provider: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderBody {
    pub provider: String,
    pub order_hash: String,
    pub signature: String,
    pub data: LimitOrderPayload,
}

pub fn parse_trader(raw: &str) -> Result<Address, AggregationError> {
    parse_address("trader", raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_params(sell_amount: &str) -> PriceParams {
        PriceParams {
            buy_token: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_owned(),
            sell_token: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_owned(),
            sell_amount: sell_amount.to_owned(),
            gas_price: None,
            slippage_percentage: default_slippage(),
            taker_address: None,
            fee_recipient: None,
            buy_token_percentage_fee: None,
            provider: None,
        }
    }

    #[test]
    fn addresses_are_normalized_to_lowercase() {
        let query = price_params("1000000").into_query(1).unwrap();
        assert_eq!(
            format!("{:#x}", query.buy_token),
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        );
        assert_eq!(query.slippage_percentage, Some(0.005));
    }

    #[test]
    fn zero_and_malformed_amounts_are_rejected() {
        assert!(price_params("0").into_query(1).is_err());
        assert!(price_params("-5").into_query(1).is_err());
        assert!(price_params("1e18").into_query(1).is_err());
    }

    #[test]
    fn quote_requires_taker() {
        let params = QuoteParams {
            buy_token: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_owned(),
            sell_token: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_owned(),
            sell_amount: "1".to_owned(),
            provider: "zeroex".to_owned(),
            gas_price: None,
            slippage_percentage: None,
            taker_address: None,
            fee_recipient: None,
            buy_token_percentage_fee: None,
            ignore_checks: false,
        };
        let err = params.into_query(1).unwrap_err();
        assert_eq!(err.kind, errors::ErrorKind::ValidationFailed);
    }
}
