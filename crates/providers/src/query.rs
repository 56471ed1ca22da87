//! The request envelope shared by every provider operation. Adapters read
//! from these and render their own parameter names.

use model::{Address, U256};

#[derive(Clone, Debug)]
pub struct PriceQuery {
    pub buy_token: Address,
    pub sell_token: Address,
    pub sell_amount: U256,
    pub chain_id: u64,
    pub gas_price: Option<U256>,
    /// Fraction, `0.01` meaning one percent.
    pub slippage_percentage: Option<f64>,
    pub taker_address: Option<Address>,
    pub fee_recipient: Option<Address>,
    /// Fraction of the buy amount routed to `fee_recipient`.
    pub buy_token_percentage_fee: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct QuoteQuery {
    pub buy_token: Address,
    pub sell_token: Address,
    pub sell_amount: U256,
    pub chain_id: u64,
    pub taker_address: Address,
    pub gas_price: Option<U256>,
    pub slippage_percentage: Option<f64>,
    pub fee_recipient: Option<Address>,
    pub buy_token_percentage_fee: Option<f64>,
    /// Ask the upstream to skip balance and allowance checks.
    pub ignore_checks: bool,
}

#[derive(Clone, Debug)]
pub struct CrossChainPriceQuery {
    pub buy_token: Address,
    pub sell_token: Address,
    pub sell_amount: U256,
    pub chain_id_from: u64,
    pub chain_id_to: u64,
    pub gas_price: Option<U256>,
    pub slippage_percentage: Option<f64>,
    pub taker_address: Option<Address>,
    pub fee_recipient: Option<Address>,
    pub buy_token_percentage_fee: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct CrossChainQuoteQuery {
    pub buy_token: Address,
    pub sell_token: Address,
    pub sell_amount: U256,
    pub chain_id_from: u64,
    pub chain_id_to: u64,
    pub taker_address: Address,
    pub gas_price: Option<U256>,
    pub slippage_percentage: Option<f64>,
    pub fee_recipient: Option<Address>,
    pub buy_token_percentage_fee: Option<f64>,
}

impl PriceQuery {
    /// Native coin sent along with the transaction: the sell amount when
    /// selling the native sentinel, zero otherwise.
    pub fn value(&self) -> U256 {
        if model::is_native_token(self.sell_token) {
            self.sell_amount
        } else {
            U256::ZERO
        }
    }
}

impl QuoteQuery {
    pub fn value(&self) -> U256 {
        if model::is_native_token(self.sell_token) {
            self.sell_amount
        } else {
            U256::ZERO
        }
    }
}

impl CrossChainPriceQuery {
    pub fn value(&self) -> U256 {
        if model::is_native_token(self.sell_token) {
            self.sell_amount
        } else {
            U256::ZERO
        }
    }
}
