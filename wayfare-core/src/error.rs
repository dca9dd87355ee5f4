use thiserror::Error;

/// A transport-level failure of a single upstream call.
///
/// Never leaves [`crate::fetch::BoundedFetcher`]; it is logged and turned into
/// an absent payload there.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream answered with status {0}")]
    Status(u16),

    #[error("http error: {0}")]
    Http(reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// A provider answered, but the payload does not have the canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed payload from {provider}: {reason}")]
pub struct MalformedPayload {
    pub provider: &'static str,
    pub reason: String,
}

impl MalformedPayload {
    pub fn new(provider: &'static str, reason: impl Into<String>) -> Self {
        Self { provider, reason: reason.into() }
    }
}

/// Why one provider in a chain did not produce a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    #[error("{provider} unreachable ({stage})")]
    Unreachable { provider: &'static str, stage: &'static str },

    #[error(transparent)]
    Malformed(#[from] MalformedPayload),
}

/// Every provider failed and nothing was cached for the key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no provider could answer for '{key}' and nothing is cached")]
pub struct Unavailable {
    pub key: String,
}

/// A currency code is missing from a rates table, or its rate is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no usable exchange rate for {0}")]
pub struct UnsupportedCurrency(pub String);

/// Failure of an exchange-rate lookup for a currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error(transparent)]
    Unavailable(#[from] Unavailable),

    #[error(transparent)]
    UnsupportedCurrency(#[from] UnsupportedCurrency),
}
