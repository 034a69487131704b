//! Stockdesk Analysis Crate
//!
//! AI analysis caching, the smart invalidation policy, and cost
//! accounting for the Stockdesk research dashboard.
//!
//! # Overview
//!
//! A cached analysis is served only while all of these hold:
//! - its age is under the analysis TTL (default 6 hours),
//! - the instrument price has drifted no more than 5% since generation,
//! - no macro trigger (volatility, long yield, dollar index) has fired.
//!
//! Anything else supersedes the record and forces a fresh reasoning
//! call, whose token cost lands in the monthly [`CostLedger`]. When the
//! facts needed to check validity cannot be fetched fresh, the policy
//! fails closed: an unverifiable record is never served.
//!
//! # Core Types
//!
//! - [`AnalysisService`] - Orchestrates cache, facts, reasoning, and cost
//! - [`AnalysisCache`] - Per-instrument records with the invalidation policy
//! - [`AnalysisRecord`] - One AI-generated analysis with its snapshots
//! - [`MacroSnapshot`] / [`Regime`] - Point-in-time macro backdrop
//! - [`ReasoningProvider`] - Capability trait for the model backend
//! - [`CostLedger`] - Monthly spend accounting with lazy rollover

pub mod cache;
pub mod cost;
pub mod error;
pub mod macro_source;
pub mod parse;
pub mod prompt;
pub mod reasoning;
pub mod regime;
pub mod service;
pub mod types;

// Re-export the primary surface
pub use cache::{AnalysisCache, AnalysisCacheConfig, CacheDecision, FreshnessProbe};
pub use cost::{BudgetAlert, ClosedPeriod, CostKind, CostLedger, PeriodUsage};
pub use error::AnalysisError;
pub use macro_source::{IndexMacroSource, MacroSource, MacroSymbols};
pub use parse::{parse_completion, ParsedAnalysis};
pub use prompt::build_analysis_prompt;
pub use reasoning::{Completion, ReasoningProvider};
pub use regime::{classify_regime, MacroSnapshot, MacroTrigger, MacroTriggerLimits, Regime};
pub use service::{AnalysisConfig, AnalysisService};
pub use types::{AnalysisRecord, TokenPricing, TokenUsage};
