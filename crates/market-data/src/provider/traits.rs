//! Data source trait definitions.
//!
//! This module defines the core `DataSource` trait that all upstream
//! market data sources must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Fundamentals, HistoryRange, Instrument, PricePoint, Quote};

use super::capabilities::SourceCapabilities;

/// Trait for upstream market data sources.
///
/// Implement this trait to plug in a new upstream source. The gateway
/// applies TTL caching and call budgeting uniformly on top, so
/// implementations only translate between the upstream wire format and
/// the crate's models. Multiple interchangeable implementations may
/// exist; one is selected at startup by configuration.
///
/// A `quote` or `fundamentals` call that finds nothing for a known-shaped
/// symbol returns `Ok(None)`, not an error - the gateway caches the empty
/// result so the symbol is not re-queried within the TTL window. Errors
/// are reserved for transport and protocol failures.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Unique identifier for this source.
    ///
    /// Should be a constant string like "ALPHA" or "FINDATA". Used for
    /// logging, budget tracking, and error attribution.
    fn id(&self) -> &'static str;

    /// Describes what this source can do and its daily call quota.
    fn capabilities(&self) -> SourceCapabilities;

    /// Search for instruments matching the query.
    ///
    /// An empty result set is a valid answer for an unknown query.
    async fn search(&self, query: &str) -> Result<Vec<Instrument>, MarketDataError> {
        let _ = query;
        Err(MarketDataError::NotSupported {
            operation: "search".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch the latest quote for a symbol.
    ///
    /// Returns `Ok(None)` when the source does not know the symbol.
    async fn quote(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError>;

    /// Fetch latest quotes for several symbols in one upstream call.
    ///
    /// Only called by the gateway when `capabilities().supports_batch_quotes`
    /// is true. Symbols absent from the result are treated as unknown.
    async fn batch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>, MarketDataError> {
        let _ = symbols;
        Err(MarketDataError::NotSupported {
            operation: "batch_quotes".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch fundamental data for a symbol.
    ///
    /// Returns `Ok(None)` when the source has no fundamentals coverage
    /// for the symbol. Default implementation reports the operation as
    /// unsupported.
    async fn fundamentals(&self, symbol: &str) -> Result<Option<Fundamentals>, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::NotSupported {
            operation: "fundamentals".to_string(),
            provider: self.id().to_string(),
        })
    }

    /// Fetch a historical price series for a symbol.
    ///
    /// The points should be ordered by timestamp ascending. An empty
    /// series is a valid answer for a symbol with no data in the range.
    async fn history(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Vec<PricePoint>, MarketDataError>;
}
