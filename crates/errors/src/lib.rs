//! Failure taxonomy shared by the aggregation engine, the provider adapters
//! and the HTTP surface.
//!
//! Every failure is a value of [`AggregationError`] carrying a closed
//! [`ErrorKind`]. The kind determines who owns the mistake (the caller, the
//! upstream aggregator, or this service) and thereby the HTTP status the
//! hosting API responds with.

use {
    serde::Serialize,
    serde_json::{Map, Value},
    std::fmt,
};

/// The party responsible for a failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    User,
    Provider,
    Aggregator,
}

impl Owner {
    pub fn status(&self) -> u16 {
        match self {
            Self::User => 400,
            Self::Provider => 409,
            Self::Aggregator => 417,
        }
    }
}

/// Closed set of failure kinds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    // User-owned.
    InsufficientBalance,
    InsufficientAllowance,
    InvalidTokens,
    EstimationFailed,
    // Provider-owned.
    InsufficientLiquidity,
    PriceUnavailable,
    ProviderTimeout,
    ProviderUnspecified,
    // Our own.
    ValidationFailed,
    ParseResponse,
    ProviderNotFound,
    SpenderAddressNotFound,
}

impl ErrorKind {
    pub fn owner(&self) -> Owner {
        match self {
            Self::InsufficientBalance
            | Self::InsufficientAllowance
            | Self::InvalidTokens
            | Self::EstimationFailed => Owner::User,
            Self::InsufficientLiquidity
            | Self::PriceUnavailable
            | Self::ProviderTimeout
            | Self::ProviderUnspecified => Owner::Provider,
            Self::ValidationFailed
            | Self::ParseResponse
            | Self::ProviderNotFound
            | Self::SpenderAddressNotFound => Owner::Aggregator,
        }
    }

    pub fn status(&self) -> u16 {
        self.owner().status()
    }

    /// Short human-readable description, used as the `error` field of the
    /// HTTP error body.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::InsufficientBalance => "User has not enough balance",
            Self::InsufficientAllowance => "User has not enough allowance",
            Self::InvalidTokens => "Invalid tokens",
            Self::EstimationFailed => "Cannot estimate swap",
            Self::InsufficientLiquidity => "Cannot find liquidity pools for swap",
            Self::PriceUnavailable => "Invalid price",
            Self::ProviderTimeout => "Provider is unavailable",
            Self::ProviderUnspecified => "Unhandled provider error",
            Self::ValidationFailed => "Swap validation failed",
            Self::ParseResponse => "Cannot parse response",
            Self::ProviderNotFound => "Provider not found",
            Self::SpenderAddressNotFound => "Spender address not found",
        }
    }
}

/// A classified failure, optionally attributed to a provider and annotated
/// with structured details for logging.
#[derive(Clone, Debug)]
pub struct AggregationError {
    pub kind: ErrorKind,
    pub provider: Option<String>,
    pub message: String,
    pub details: Map<String, Value>,
}

impl std::error::Error for AggregationError {}

impl fmt::Display for AggregationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{}. Source: {provider}", self.kind.headline()),
            None => write!(f, "{}", self.kind.headline()),
        }
    }
}

impl AggregationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: None,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn for_provider(
        kind: ErrorKind,
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            provider: Some(provider.into()),
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_owned(), value.into());
        self
    }

    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    /// Whether a parse-class failure is involved. These indicate a mismatch
    /// between our decoder and the upstream schema and are logged louder
    /// than ordinary provider trouble.
    pub fn is_parse(&self) -> bool {
        self.kind == ErrorKind::ParseResponse
    }
}

/// Shorthand constructors for the kinds that appear all over the adapters.
impl AggregationError {
    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::for_provider(ErrorKind::ProviderTimeout, provider, message)
    }

    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::for_provider(ErrorKind::ParseResponse, provider, message)
    }

    pub fn provider_not_found(name: impl fmt::Display) -> Self {
        Self::new(ErrorKind::ProviderNotFound, format!("provider {name} is not supported"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }
}

pub type Result<T> = std::result::Result<T, AggregationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_selects_status() {
        assert_eq!(ErrorKind::InsufficientBalance.status(), 400);
        assert_eq!(ErrorKind::InvalidTokens.status(), 400);
        assert_eq!(ErrorKind::InsufficientLiquidity.status(), 409);
        assert_eq!(ErrorKind::ProviderTimeout.status(), 409);
        assert_eq!(ErrorKind::ParseResponse.status(), 417);
        assert_eq!(ErrorKind::ProviderNotFound.status(), 417);
    }

    #[test]
    fn display_names_the_provider() {
        let err = AggregationError::timeout("zeroex", "deadline exceeded");
        assert_eq!(err.to_string(), "Provider is unavailable. Source: zeroex");
    }

    #[test]
    fn details_are_preserved() {
        let err = AggregationError::parse("oneinch", "missing field `toTokenAmount`")
            .with_detail("chain_id", 1)
            .with_detail("url", "https://api.1inch.dev/swap");
        assert_eq!(err.details["chain_id"], 1);
        assert!(err.is_parse());
    }
}
