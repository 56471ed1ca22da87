//! Conversions between wire-level [`U256`] quantities and the
//! arbitrary-precision types the economic comparison is carried out in.
//! Nothing here ever passes through a float.

use {
    crate::U256,
    bigdecimal::BigDecimal,
    num::{BigInt, bigint::Sign},
};

pub fn u256_to_big_int(value: &U256) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>())
}

/// `10^decimals` as an exact integer.
pub fn decimals_factor(decimals: u8) -> BigInt {
    num::pow::pow(BigInt::from(10), usize::from(decimals))
}

/// The informational price of a quote: `buy_amount` over `sell_amount`,
/// both scaled down by their token's decimals. `None` when the sell amount
/// is zero.
pub fn decimal_price(
    buy_amount: &U256,
    buy_decimals: u8,
    sell_amount: &U256,
    sell_decimals: u8,
) -> Option<BigDecimal> {
    if sell_amount.is_zero() {
        return None;
    }
    let buy = BigDecimal::new(u256_to_big_int(buy_amount), i64::from(buy_decimals));
    let sell = BigDecimal::new(u256_to_big_int(sell_amount), i64::from(sell_decimals));
    Some((buy / sell).normalized())
}

#[cfg(test)]
mod tests {
    use {super::*, std::str::FromStr};

    #[test]
    fn big_int_round_trip_on_max() {
        let max = U256::MAX;
        let as_big = u256_to_big_int(&max);
        assert_eq!(
            as_big,
            BigInt::from_str(
                "115792089237316195423570985008687907853269984665640564039457584007913129639935"
            )
            .unwrap()
        );
    }

    #[test]
    fn price_scales_by_decimals() {
        // 1 USDC (6 decimals) buying 0.0005 WETH (18 decimals).
        let price = decimal_price(
            &U256::from(500_000_000_000_000u64),
            18,
            &U256::from(1_000_000u64),
            6,
        )
        .unwrap();
        assert_eq!(price, BigDecimal::from_str("0.0005").unwrap());
    }

    #[test]
    fn smallest_sell_amount_does_not_divide_by_zero() {
        let price = decimal_price(&U256::from(3u64), 18, &U256::from(1u64), 6).unwrap();
        assert_eq!(price, BigDecimal::from_str("0.000000000003").unwrap());
    }

    #[test]
    fn zero_sell_amount_is_rejected() {
        assert!(decimal_price(&U256::from(1u64), 18, &U256::ZERO, 6).is_none());
    }
}
