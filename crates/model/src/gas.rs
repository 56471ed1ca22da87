//! Gas price report model.

use {
    crate::{U256, u256_decimal},
    serde::{Deserialize, Serialize},
};

/// One EIP-1559 pricing tier.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Eip1559Tier {
    #[serde(with = "u256_decimal")]
    pub max_fee: U256,
    #[serde(with = "u256_decimal")]
    pub base_fee: U256,
    #[serde(with = "u256_decimal")]
    pub max_priority_fee: U256,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Eip1559Tiers {
    pub fast: Eip1559Tier,
    pub instant: Eip1559Tier,
    pub overkill: Eip1559Tier,
}

/// Pre-1559 chains price every tier with the same single number.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct LegacyTiers {
    #[serde(with = "u256_decimal")]
    pub fast: U256,
    #[serde(with = "u256_decimal")]
    pub instant: U256,
    #[serde(with = "u256_decimal")]
    pub overkill: U256,
}

/// Gas pricing for one chain at one point in time. Exactly one of the two
/// tier sets is present, selected by the chain's EIP-1559 capability.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GasReport {
    pub source: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eip1559: Option<Eip1559Tiers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy: Option<LegacyTiers>,
}

impl GasReport {
    /// The price a transaction would pay in the `fast` tier, in wei.
    pub fn fast_price(&self) -> Option<U256> {
        match (&self.eip1559, &self.legacy) {
            (Some(tiers), _) => Some(tiers.fast.max_fee),
            (None, Some(tiers)) => Some(tiers.fast),
            (None, None) => None,
        }
    }
}
