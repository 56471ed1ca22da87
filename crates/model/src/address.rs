//! Address ingress normalization.
//!
//! Addresses arrive as query or path parameters and are normalized exactly
//! once, at the edge: surrounding whitespace stripped, lowercased, length
//! checked. Everything downstream works with [`Address`] values and never
//! re-interprets strings.

use {crate::Address, std::str::FromStr};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InvalidAddress {
    #[error("address must be exactly 42 characters starting with 0x, got {0:?}")]
    Malformed(String),
    #[error("address contains non-hex characters: {0:?}")]
    NotHex(String),
}

/// Parses a user-supplied address string. Accepts any hex casing, returns
/// the canonical lowercase [`Address`]. Idempotent over its own output.
pub fn normalize(input: &str) -> Result<Address, InvalidAddress> {
    let trimmed = input.trim();
    if trimmed.len() != 42 || !trimmed.starts_with("0x") {
        return Err(InvalidAddress::Malformed(input.to_owned()));
    }
    Address::from_str(trimmed).map_err(|_| InvalidAddress::NotHex(input.to_owned()))
}
