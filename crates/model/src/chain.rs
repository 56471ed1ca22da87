//! Supported-chain catalog.
//!
//! The set of chains is fetched once at startup from the token-info source
//! and is immutable for the process lifetime. Lookups go through keyed maps
//! rather than ad-hoc iteration.

use {
    crate::Address,
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// An ERC-20 token as described by the token-info source. For the
/// `native_token` of a chain this is the wrapped-native contract (WETH on
/// mainnet) whose decimals equal the native coin's.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Token {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChainInfo {
    pub name: String,
    pub chain_id: u64,
    #[serde(default)]
    pub description: String,
    pub native_token: Token,
    pub eip1559: bool,
}

impl ChainInfo {
    /// The wrapped-native contract standing in for the native sentinel.
    pub fn wrapped_native(&self) -> Address {
        self.native_token.address
    }
}

/// Immutable chain lookup built once during startup.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    by_id: HashMap<u64, ChainInfo>,
    by_name: HashMap<String, u64>,
}

impl Catalog {
    pub fn new(chains: impl IntoIterator<Item = ChainInfo>) -> Self {
        let mut catalog = Self::default();
        for chain in chains {
            catalog.by_name.insert(chain.name.to_lowercase(), chain.chain_id);
            catalog.by_id.insert(chain.chain_id, chain);
        }
        catalog
    }

    pub fn by_id(&self, chain_id: u64) -> Option<&ChainInfo> {
        self.by_id.get(&chain_id)
    }

    pub fn get(&self, name: &str) -> Option<&ChainInfo> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.by_id.get(id))
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.by_id.contains_key(&chain_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainInfo> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::address};

    fn mainnet() -> ChainInfo {
        ChainInfo {
            name: "Eth".to_owned(),
            chain_id: 1,
            description: "Ethereum mainnet".to_owned(),
            native_token: Token {
                address: address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
                name: "Wrapped Ether".to_owned(),
                symbol: "WETH".to_owned(),
                decimals: 18,
            },
            eip1559: true,
        }
    }

    #[test]
    fn lookup_by_id_and_name() {
        let catalog = Catalog::new([mainnet()]);
        assert_eq!(catalog.by_id(1).unwrap().name, "Eth");
        assert_eq!(catalog.get("eth").unwrap().chain_id, 1);
        assert_eq!(catalog.get("ETH").unwrap().chain_id, 1);
        assert!(catalog.by_id(56).is_none());
    }
}
