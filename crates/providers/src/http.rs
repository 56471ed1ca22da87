//! Shared upstream HTTP plumbing: JSON fetch with the adapter deadline,
//! transport-failure mapping, and the out-of-band status remap every
//! adapter applies before classifying an error body.

use {
    errors::{AggregationError, ErrorKind},
    regex::Regex,
    serde_json::Value,
};

/// A response the upstream answered but refused: remapped status plus the
/// decoded body, handed to the adapter's own classifier.
pub(crate) struct Refusal {
    pub status: u16,
    pub body: Value,
}

pub(crate) enum UpstreamError {
    Refused(Refusal),
    /// Transport-level failure, already classified.
    Failed(AggregationError),
}

impl UpstreamError {
    /// Classifies with the adapter's table when the upstream refused,
    /// passes transport failures through.
    pub fn classify(
        self,
        provider: &'static str,
        table: &[(Regex, ErrorKind)],
        message: impl Fn(&Value) -> String,
    ) -> AggregationError {
        match self {
            Self::Failed(err) => err,
            Self::Refused(refusal) => {
                let msg = message(&refusal.body);
                let kind = match_error(table, &msg);
                AggregationError::for_provider(kind, provider, msg)
                    .with_detail("status", refusal.status)
            }
        }
    }
}

/// Sends a prepared request and decodes the JSON body. An unsuccessful
/// status becomes [`UpstreamError::Refused`]; statuses outside 100..600
/// (some proxies answer "HTTP 0") are remapped to 500 first.
pub(crate) async fn send_json(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<Value, UpstreamError> {
    let response = request.send().await.map_err(|err| {
        UpstreamError::Failed(if err.is_timeout() || err.is_connect() {
            AggregationError::timeout(provider, err.to_string())
        } else {
            AggregationError::for_provider(ErrorKind::ProviderUnspecified, provider, err.to_string())
        })
    })?;
    let status = response.status().as_u16();
    let text = response.text().await.map_err(|err| {
        UpstreamError::Failed(AggregationError::timeout(provider, err.to_string()))
    })?;
    let body: Value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    if (200..300).contains(&status) {
        tracing::debug!(provider, "upstream responded");
        return Ok(body);
    }
    let status = if (100..600).contains(&status) { status } else { 500 };
    Err(UpstreamError::Refused(Refusal { status, body }))
}

/// First matching pattern wins; unknown messages are the provider's own
/// unspecified failure.
pub(crate) fn match_error(table: &[(Regex, ErrorKind)], message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    table
        .iter()
        .find(|(pattern, _)| pattern.is_match(&message))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::ProviderUnspecified)
}

/// Builds a lowercase-matching error table from `(pattern, kind)` pairs.
pub(crate) fn error_table(entries: &[(&str, ErrorKind)]) -> Vec<(Regex, ErrorKind)> {
    entries
        .iter()
        .map(|(pattern, kind)| {
            let regex = Regex::new(&pattern.to_lowercase()).expect("static error pattern");
            (regex, *kind)
        })
        .collect()
}

/// A missing or mistyped field in an otherwise successful upstream
/// response.
pub(crate) fn missing(provider: &'static str, field: &str) -> AggregationError {
    AggregationError::parse(provider, format!("missing or invalid field `{field}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins_and_unknown_is_unspecified() {
        let table = error_table(&[
            (r"not enough \w+ balance", ErrorKind::InsufficientBalance),
            ("insufficient liquidity", ErrorKind::InsufficientLiquidity),
        ]);
        assert_eq!(
            match_error(&table, "Not enough WETH balance to cover"),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            match_error(&table, "INSUFFICIENT LIQUIDITY"),
            ErrorKind::InsufficientLiquidity
        );
        assert_eq!(
            match_error(&table, "planets misaligned"),
            ErrorKind::ProviderUnspecified
        );
    }
}
