//! Error types and recovery classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RecoveryClass`]: Classification for determining recovery behavior

mod retry;

pub use retry::RecoveryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RecoveryClass`] via the
/// [`recovery_class`](Self::recovery_class) method, which tells the calling
/// layer whether and when a retry can succeed. The TTL cache and the call
/// budget limiter never produce these errors themselves; only the gateway,
/// which performs actual upstream calls, can fail.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The daily call budget for an upstream source is spent.
    /// Recoverable by waiting for the window rollover.
    #[error("Call budget exhausted for {provider}")]
    QuotaExhausted {
        /// The upstream source whose quota is spent
        provider: String,
    },

    /// The upstream source returned a malformed response or a non-2xx status.
    /// Recoverable by caller-level retry with backoff.
    #[error("Upstream unavailable: {provider} - {message}")]
    Upstream {
        /// The source that failed
        provider: String,
        /// What went wrong
        message: String,
    },

    /// The request to the upstream source timed out.
    /// Recoverable by caller-level retry with backoff.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The source that timed out
        provider: String,
    },

    /// The requested symbol is not known to the upstream source.
    /// This is a terminal error - retrying won't help. A negative cache
    /// entry is kept so the symbol is not re-queried within the TTL window.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Malformed ticker, empty query, or unsupported history range.
    /// Not retryable - fix the request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation is not supported by the active upstream source.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The source that cannot serve it
        provider: String,
    },

    /// No credential is available for a configured capability.
    /// Fatal until an operator supplies one.
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    /// A network error occurred while communicating with an upstream source.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the recovery classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use stockdesk_market_data::errors::{MarketDataError, RecoveryClass};
    ///
    /// let error = MarketDataError::QuotaExhausted { provider: "ALPHA".to_string() };
    /// assert_eq!(error.recovery_class(), RecoveryClass::AfterRollover);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.recovery_class(), RecoveryClass::Never);
    /// ```
    pub fn recovery_class(&self) -> RecoveryClass {
        match self {
            // Terminal errors - fix the request
            Self::SymbolNotFound(_) | Self::InvalidInput(_) | Self::NotSupported { .. } => {
                RecoveryClass::Never
            }

            // Transient upstream conditions - caller retries with backoff
            Self::Upstream { .. } | Self::Timeout { .. } => RecoveryClass::WithBackoff,

            // Spent quota - wait for the window boundary
            Self::QuotaExhausted { .. } => RecoveryClass::AfterRollover,

            // Operator intervention required
            Self::ConfigurationMissing(_) => RecoveryClass::Fatal,

            // Transport failures behave like upstream unavailability
            Self::Network(_) => RecoveryClass::WithBackoff,
        }
    }
}
