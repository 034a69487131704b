//! Data source capabilities and quota configuration.
//!
//! This module defines structures for describing what an upstream data
//! source can do and how many chargeable calls per day it allows.

/// Describes the capabilities of an upstream data source.
///
/// Used by the gateway to decide how to shape requests - most importantly
/// whether a batch quote request can be served by a single upstream call
/// or must fall back to sequential per-symbol calls. Batching is a source
/// capability, not a gateway policy decision.
#[derive(Clone, Debug)]
pub struct SourceCapabilities {
    /// Whether multiple symbols can be quoted in one upstream call.
    pub supports_batch_quotes: bool,

    /// Whether the source supports symbol/asset search.
    pub supports_search: bool,

    /// Whether the source supplies fundamental data.
    pub supports_fundamentals: bool,

    /// Hard daily cap on chargeable calls to this source.
    pub daily_call_quota: u32,
}

impl Default for SourceCapabilities {
    fn default() -> Self {
        Self {
            supports_batch_quotes: false,
            supports_search: true,
            supports_fundamentals: true,
            daily_call_quota: 250,
        }
    }
}
