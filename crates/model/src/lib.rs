//! Domain types shared by the aggregation engine, the provider adapters and
//! the HTTP surface: the uniform quote model, chain and provider catalogs,
//! gas reports, and the numeric conversions backing the exact profit
//! arithmetic.

pub mod address;
pub mod chain;
pub mod descriptor;
pub mod gas;
pub mod number;
pub mod quote;
pub mod u256_decimal;

pub use alloy_primitives::{Address, Bytes, U256, address};

/// The reserved address denoting a chain's native coin wherever the API
/// expects an ERC-20 contract address.
pub const NATIVE_TOKEN_SENTINEL: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// Whether an address is the native-token sentinel.
pub fn is_native_token(token: Address) -> bool {
    token == NATIVE_TOKEN_SENTINEL
}
