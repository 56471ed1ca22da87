//! Token metadata port: decimals, native-denominated prices and the
//! supported-chain list, fetched from the token-inventory HTTP API.
//!
//! Consumers depend on [`TokenInfoFetching`]; the HTTP client and its JSON
//! shapes are private to this crate.

use {
    alloy_primitives::Address,
    bigdecimal::BigDecimal,
    model::chain::ChainInfo,
    serde::Deserialize,
    std::{str::FromStr, time::Duration},
    url::Url,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token info request timed out")]
    Timeout,
    #[error("token info request failed: {0}")]
    Request(String),
    #[error("token info response malformed: {0}")]
    Decode(String),
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait TokenInfoFetching: Send + Sync {
    async fn decimals(&self, chain_id: u64, token: Address) -> Result<u8, Error>;

    /// Price of the token denominated in the chain's native coin.
    async fn native_price(&self, chain_id: u64, token: Address) -> Result<BigDecimal, Error>;

    async fn list_chains(&self) -> Result<Vec<ChainInfo>, Error>;
}

pub struct HttpTokenInfo {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
}

impl HttpTokenInfo {
    pub fn new(client: reqwest::Client, base_url: Url, api_key: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            api_key,
            timeout,
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| Error::Request(format!("bad path {path:?}: {err}")))?;
        tracing::debug!(%url, "token info request");
        let response = self
            .client
            .get(url)
            .header("api-key", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!("status {status}: {body}")));
        }
        response.json().await.map_err(classify)
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else if err.is_decode() {
        Error::Decode(err.to_string())
    } else {
        Error::Request(err.to_string())
    }
}

#[derive(Deserialize)]
struct ChainList {
    data: Vec<ChainInfo>,
}

#[derive(Deserialize)]
struct Inventory {
    decimals: u8,
}

#[derive(Deserialize)]
struct Finance {
    price_eth: f64,
}

#[async_trait::async_trait]
impl TokenInfoFetching for HttpTokenInfo {
    async fn decimals(&self, chain_id: u64, token: Address) -> Result<u8, Error> {
        let inventory: Inventory = self
            .get(&format!("v1/chain/{chain_id}/tokens/{token:#x}/inventory"))
            .await?;
        Ok(inventory.decimals)
    }

    async fn native_price(&self, chain_id: u64, token: Address) -> Result<BigDecimal, Error> {
        let finance: Finance = self
            .get(&format!("v1/chain/{chain_id}/tokens/{token:#x}/finance"))
            .await?;
        // Routed through the decimal rendering so no binary-float artifacts
        // leak into the exact arithmetic downstream.
        BigDecimal::from_str(&finance.price_eth.to_string())
            .map_err(|err| Error::Decode(format!("bad price {}: {err}", finance.price_eth)))
    }

    async fn list_chains(&self) -> Result<Vec<ChainInfo>, Error> {
        let chains: ChainList = self.get("v1/chain").await?;
        Ok(chains.data)
    }
}
