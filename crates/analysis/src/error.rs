//! Analysis error types.

use thiserror::Error;
use stockdesk_market_data::MarketDataError;

/// Errors from the analysis layer.
///
/// The cache itself never raises; only the service, which performs
/// upstream data and reasoning calls, can fail. A freshness check that
/// cannot be completed surfaces as the underlying `MarketData` failure -
/// never as a silently-served cached record.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Invalid input or request.
    #[error("{0}")]
    InvalidInput(String),

    /// Missing API key or credential for the reasoning capability.
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// The reasoning capability failed or timed out.
    #[error("Reasoning call failed: {0}")]
    Reasoning(String),

    /// The reasoning reply could not be parsed into an analysis record.
    #[error("Malformed reasoning response: {0}")]
    MalformedResponse(String),

    /// Current facts needed to verify cached-analysis freshness could
    /// not be fetched fresh. Treated like upstream unavailability, never
    /// as "assume valid".
    #[error("Cannot verify analysis freshness: {0}")]
    Unverifiable(String),

    /// A market data fetch failed.
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),
}

impl AnalysisError {
    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new reasoning error.
    pub fn reasoning(msg: impl Into<String>) -> Self {
        Self::Reasoning(msg.into())
    }
}

/// Error code for programmatic handling in reporting surfaces.
impl AnalysisError {
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => "INVALID_INPUT",
            AnalysisError::ConfigurationMissing(_) => "CONFIGURATION_MISSING",
            AnalysisError::Reasoning(_) => "REASONING_ERROR",
            AnalysisError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            AnalysisError::Unverifiable(_) => "UNVERIFIABLE",
            AnalysisError::MarketData(_) => "MARKET_DATA_ERROR",
        }
    }
}
