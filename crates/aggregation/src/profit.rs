//! The economic comparison deciding which provider wins.
//!
//! A quote's worth is what the taker receives minus what executing it
//! costs, everything denominated in the chain's native coin:
//!
//! ```text
//! tx_cost_wei      = gas * gas_price
//! approve_cost_wei = approve_gas * gas_price
//! sum_cost_native  = (tx_cost_wei + approve_cost_wei) / 10^native_decimals
//! buy_native       = (buy_amount / 10^buy_decimals) * buy_token_native_price
//! profit           = buy_native - sum_cost_native
//! ```
//!
//! A provider whose router still needs an approval is strictly more
//! expensive to execute, which is why the approval gas is amortized into
//! the decision. All arithmetic is exact rational arithmetic; floats never
//! enter the comparison.

use {
    bigdecimal::BigDecimal,
    model::{
        quote::PriceQuote,
        number::{decimals_factor, u256_to_big_int},
    },
    num::{BigInt, BigRational},
};

pub(crate) struct Candidate<'a> {
    pub quote: &'a PriceQuote,
    /// Gas units for the approval this provider would additionally need.
    pub approve_cost: u64,
}

/// Exact rational view of a [`BigDecimal`].
fn rational(decimal: &BigDecimal) -> BigRational {
    let (digits, scale) = decimal.as_bigint_and_exponent();
    if scale >= 0 {
        BigRational::new(digits, num::pow::pow(BigInt::from(10), scale as usize))
    } else {
        BigRational::from_integer(digits * num::pow::pow(BigInt::from(10), (-scale) as usize))
    }
}

pub(crate) fn profit(
    candidate: &Candidate,
    native_decimals: u8,
    buy_token_decimals: u8,
    buy_token_native_price: &BigDecimal,
) -> BigRational {
    let gas_price = u256_to_big_int(&candidate.quote.gas_price);
    let tx_cost = u256_to_big_int(&candidate.quote.gas) * &gas_price;
    let approve_cost = BigInt::from(candidate.approve_cost) * &gas_price;
    let sum_cost = BigRational::new(tx_cost + approve_cost, decimals_factor(native_decimals));
    let buy_amount = BigRational::new(
        u256_to_big_int(&candidate.quote.buy_amount),
        decimals_factor(buy_token_decimals),
    );
    buy_amount * rational(buy_token_native_price) - sum_cost
}

/// Index of the most profitable candidate. Ties keep the earliest entry,
/// which is registry order.
pub(crate) fn choose_best(
    candidates: &[Candidate],
    native_decimals: u8,
    buy_token_decimals: u8,
    buy_token_native_price: &BigDecimal,
) -> Option<usize> {
    let mut best: Option<(usize, BigRational)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let profit = profit(
            candidate,
            native_decimals,
            buy_token_decimals,
            buy_token_native_price,
        );
        match &best {
            Some((_, best_profit)) if profit <= *best_profit => {}
            _ => best = Some((index, profit)),
        }
    }
    best.map(|(index, _)| index)
}
