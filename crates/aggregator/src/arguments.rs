//! Process configuration, flags first, environment second.

use {
    clap::Parser,
    std::{net::SocketAddr, path::PathBuf, time::Duration},
    url::Url,
};

#[derive(Debug, Parser)]
#[command(name = "aggregator", about = "DEX meta-aggregation API")]
pub struct Arguments {
    /// Address the HTTP API binds to.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: SocketAddr,

    /// Base URL of the token-inventory API (chains, decimals, prices).
    #[arg(long, env = "TOKEN_API_URL", default_value = "https://api.dev.dex.guru")]
    pub token_api_url: Url,

    /// API key for the token-inventory API.
    #[arg(long, env = "TOKEN_API_KEY", default_value = "")]
    pub token_api_key: String,

    /// JSON-RPC endpoints, one `chain_id=url` pair per occurrence (or
    /// comma separated in the environment).
    #[arg(long = "rpc-url", env = "RPC_URLS", value_delimiter = ',')]
    pub rpc_urls: Vec<RpcEndpoint>,

    /// Provider descriptor file.
    #[arg(long, env = "PROVIDERS_CONFIG", default_value = "providers.toml")]
    pub providers_config: PathBuf,

    /// Upstream request deadline applied to every provider adapter.
    #[arg(long, env = "PROVIDER_TIMEOUT", default_value = "7s", value_parser = humantime::parse_duration)]
    pub provider_timeout: Duration,

    /// Cache backend, `memory` or `redis`.
    #[arg(long, env = "CACHE_BACKEND", default_value = "memory")]
    pub cache_backend: CacheBackend,

    /// Redis connection URL, required with `--cache-backend redis`.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// 1inch trading API key.
    #[arg(long, env = "ONE_INCH_API_KEY", default_value = "")]
    pub oneinch_api_key: String,

    /// Bebop source-auth key.
    #[arg(long, env = "BEBOP_API_KEY", default_value = "")]
    pub bebop_api_key: String,

    /// Partner tag sent to upstreams that attribute volume.
    #[arg(long, env = "PARTNER", default_value = "dex.guru")]
    pub partner: String,

    /// Tracing filter, `RUST_LOG` syntax.
    #[arg(long, env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, clap::ValueEnum)]
pub enum CacheBackend {
    Memory,
    Redis,
}

/// `1=https://mainnet.example/rpc` style pair.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcEndpoint {
    pub chain_id: u64,
    pub url: Url,
}

impl std::str::FromStr for RpcEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain_id, url) = s
            .split_once('=')
            .ok_or_else(|| format!("expected `chain_id=url`, got {s:?}"))?;
        Ok(Self {
            chain_id: chain_id
                .trim()
                .parse()
                .map_err(|err| format!("bad chain id in {s:?}: {err}"))?,
            url: url
                .trim()
                .parse()
                .map_err(|err| format!("bad url in {s:?}: {err}"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_endpoint_parses_pairs() {
        let endpoint: RpcEndpoint = "1=https://rpc.example/eth".parse().unwrap();
        assert_eq!(endpoint.chain_id, 1);
        assert_eq!(endpoint.url.as_str(), "https://rpc.example/eth");
        assert!("https://no-chain-id".parse::<RpcEndpoint>().is_err());
    }

    #[test]
    fn defaults_parse() {
        let args = Arguments::parse_from(["aggregator"]);
        assert_eq!(args.cache_backend, CacheBackend::Memory);
        assert_eq!(args.provider_timeout, Duration::from_secs(7));
    }
}
