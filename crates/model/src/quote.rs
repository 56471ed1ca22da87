//! The uniform quote model every provider response is normalized into.

use {
    crate::{Address, Bytes, U256, u256_decimal},
    serde::{Deserialize, Serialize},
};

/// A liquidity venue participating in a swap, with its share in percent.
///
/// Venue names arrive in whatever convention the upstream uses
/// (`Uniswap_V3`, `SushiSwap`, `curve`). They are canonicalized to one
/// CapCamel form at construction so names compare equal across providers.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SwapSource {
    pub name: String,
    /// Share of the trade routed through this venue, in percent [0, 100].
    pub proportion: f64,
}

impl SwapSource {
    pub fn new(name: &str, proportion: f64) -> Self {
        Self {
            name: canonical_venue_name(name),
            proportion,
        }
    }
}

/// `Uniswap_V3` / `uniswapV3` / `UNISWAP_V3` all become `UniswapV3`.
fn canonical_venue_name(name: &str) -> String {
    let mut snake = String::with_capacity(name.len());
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let prev_lower_or_digit = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
        let next_lower = chars.get(i + 1).is_some_and(|next| next.is_lowercase());
        if c.is_uppercase() && i > 0 && (prev_lower_or_digit || next_lower) && !snake.ends_with('_') {
            snake.push('_');
        }
        snake.push(c.to_ascii_lowercase());
    }
    snake
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// What a provider advertises without commitment: amounts, gas and routing,
/// but no calldata.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub provider: String,
    pub sources: Vec<SwapSource>,
    #[serde(with = "u256_decimal")]
    pub buy_amount: U256,
    #[serde(with = "u256_decimal")]
    pub gas: U256,
    #[serde(with = "u256_decimal")]
    pub sell_amount: U256,
    #[serde(with = "u256_decimal")]
    pub gas_price: U256,
    /// Native coin to send along; nonzero iff the sell token is the native
    /// sentinel, in which case it equals `sell_amount`.
    #[serde(with = "u256_decimal")]
    pub value: U256,
    /// `buy_amount / sell_amount` scaled by decimals. Informational only;
    /// never used for ranking.
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowance_target: Option<Address>,
}

/// A committed, broadcastable swap: [`PriceQuote`] data plus the target
/// contract and calldata.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TxQuote {
    pub sources: Vec<SwapSource>,
    #[serde(with = "u256_decimal")]
    pub buy_amount: U256,
    #[serde(with = "u256_decimal")]
    pub gas: U256,
    #[serde(with = "u256_decimal")]
    pub sell_amount: U256,
    pub to: Address,
    pub data: Bytes,
    #[serde(with = "u256_decimal")]
    pub gas_price: U256,
    #[serde(with = "u256_decimal")]
    pub value: U256,
    pub price: String,
}

/// Engine output: one provider's quote, annotated with what executing it
/// would additionally cost.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetaPrice {
    pub provider: String,
    pub price_response: PriceQuote,
    /// Whether the taker's current allowance already covers the sell
    /// amount, i.e. `approve_cost == 0`.
    pub is_allowed: bool,
    /// Set only when ranking several providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_best: Option<bool>,
    /// Gas units for the approve transaction this provider would require.
    pub approve_cost: u64,
}

/// A limit order as posted through the facade. Forwarded to the provider
/// verbatim in its camelCase wire form.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderPayload {
    pub maker_asset: Address,
    pub taker_asset: Address,
    pub maker: Address,
    pub allowed_sender: Address,
    pub receiver: Address,
    #[serde(with = "u256_decimal")]
    pub making_amount: U256,
    #[serde(with = "u256_decimal")]
    pub taking_amount: U256,
    #[serde(default = "hex_zero")]
    pub salt: String,
    #[serde(default = "hex_zero")]
    pub interactions: String,
    #[serde(default = "hex_zero")]
    pub offsets: String,
}

fn hex_zero() -> String {
    "0x".to_owned()
}
