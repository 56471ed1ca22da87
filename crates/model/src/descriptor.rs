//! Static provider descriptors.
//!
//! Each configured aggregator declares per-chain spender addresses for the
//! two trade modes. Descriptors are deserialized from configuration at
//! startup and never mutated; their file order is the stable iteration
//! order used everywhere, including ranking tie-breaks.

use {
    crate::Address,
    serde::{Deserialize, Serialize},
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Spenders {
    pub chain_id: u64,
    pub market_order: Option<Address>,
    pub limit_order: Option<Address>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub display_name: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub spenders: Vec<Spenders>,
}

fn enabled_default() -> bool {
    true
}

/// One provider's spender on a concrete chain, as exposed by `/info`.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SpenderEntry {
    pub name: String,
    pub display_name: String,
    pub address: Address,
}

/// Providers available on one chain, split by trade mode.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProvidersOnChain {
    pub market_order: Vec<SpenderEntry>,
    pub limit_order: Vec<SpenderEntry>,
}

impl ProvidersOnChain {
    pub fn is_empty(&self) -> bool {
        self.market_order.is_empty() && self.limit_order.is_empty()
    }
}

/// The full descriptor set, in configuration order.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub providers: Vec<ProviderDescriptor>,
}

impl ProvidersConfig {
    /// Enabled descriptors in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter().filter(|descriptor| descriptor.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.iter().find(|descriptor| descriptor.name == name)
    }

    /// The spender a provider uses for market orders on the given chain.
    pub fn market_order_spender(&self, name: &str, chain_id: u64) -> Option<Address> {
        self.get(name)?
            .spenders
            .iter()
            .find(|spender| spender.chain_id == chain_id)?
            .market_order
    }

    pub fn on_chain(&self, chain_id: u64) -> ProvidersOnChain {
        let mut result = ProvidersOnChain::default();
        for descriptor in self.iter() {
            let Some(spenders) = descriptor
                .spenders
                .iter()
                .find(|spender| spender.chain_id == chain_id)
            else {
                continue;
            };
            if let Some(address) = spenders.market_order {
                result.market_order.push(SpenderEntry {
                    name: descriptor.name.clone(),
                    display_name: descriptor.display_name.clone(),
                    address,
                });
            }
            if let Some(address) = spenders.limit_order {
                result.limit_order.push(SpenderEntry {
                    name: descriptor.name.clone(),
                    display_name: descriptor.display_name.clone(),
                    address,
                });
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::address};

    fn config() -> ProvidersConfig {
        ProvidersConfig {
            providers: vec![
                ProviderDescriptor {
                    name: "zeroex".to_owned(),
                    display_name: "0x".to_owned(),
                    enabled: true,
                    spenders: vec![Spenders {
                        chain_id: 1,
                        market_order: Some(address!("def1c0ded9bec7f1a1670819833240f027b25eff")),
                        limit_order: Some(address!("def1c0ded9bec7f1a1670819833240f027b25eff")),
                    }],
                },
                ProviderDescriptor {
                    name: "oneinch".to_owned(),
                    display_name: "1inch".to_owned(),
                    enabled: true,
                    spenders: vec![Spenders {
                        chain_id: 1,
                        market_order: Some(address!("1111111254eeb25477b68fb85ed929f73a960582")),
                        limit_order: None,
                    }],
                },
                ProviderDescriptor {
                    name: "paraswap".to_owned(),
                    display_name: "ParaSwap".to_owned(),
                    enabled: false,
                    spenders: vec![],
                },
            ],
        }
    }

    #[test]
    fn disabled_providers_are_invisible() {
        assert!(config().get("paraswap").is_none());
    }

    #[test]
    fn on_chain_splits_by_mode_in_config_order() {
        let on_chain = config().on_chain(1);
        let market: Vec<_> = on_chain
            .market_order
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        assert_eq!(market, ["zeroex", "oneinch"]);
        assert_eq!(on_chain.limit_order.len(), 1);
        assert_eq!(on_chain.limit_order[0].name, "zeroex");
    }

    #[test]
    fn unknown_chain_is_empty() {
        assert!(config().on_chain(137).is_empty());
    }
}
