//! Analysis record and token accounting types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::regime::MacroSnapshot;

/// Token counts reported by the reasoning capability for one call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub input_tokens: u32,
    /// Tokens in the reply.
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens across prompt and reply.
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Per-million-token pricing for the reasoning model.
#[derive(Clone, Debug)]
pub struct TokenPricing {
    /// Cost per million input tokens.
    pub input_per_million: Decimal,
    /// Cost per million output tokens.
    pub output_per_million: Decimal,
}

impl Default for TokenPricing {
    fn default() -> Self {
        Self {
            input_per_million: Decimal::new(300, 2),   // 3.00
            output_per_million: Decimal::new(1500, 2), // 15.00
        }
    }
}

impl TokenPricing {
    /// Monetary cost of one call at this pricing.
    pub fn cost_of(&self, usage: TokenUsage) -> Decimal {
        let million = Decimal::from(1_000_000u32);
        Decimal::from(usage.input_tokens) * self.input_per_million / million
            + Decimal::from(usage.output_tokens) * self.output_per_million / million
    }
}

/// One AI-generated analysis of an instrument.
///
/// Created only by a successful reasoning call; lifecycle is
/// create-once, invalidate-and-replace. The price and macro fields
/// describe the same moment as the thesis they justify - a fresh record
/// resnaps them, never patches them in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Record identity, for audit trails.
    pub id: Uuid,

    /// Instrument ticker (normalized, uppercase).
    pub symbol: String,

    /// When the reasoning call completed.
    pub generated_at: DateTime<Utc>,

    /// Instrument price at generation time.
    pub price_at_generation: Decimal,

    /// Macro backdrop at generation time.
    pub macro_at_generation: MacroSnapshot,

    /// Model confidence, 1 (weakest) to 5 (strongest).
    pub confidence_level: u8,

    /// The core investment thesis.
    pub thesis: String,

    /// Supporting factors, in the model's order.
    pub bullish_factors: Vec<String>,

    /// Opposing factors, in the model's order.
    pub bearish_factors: Vec<String>,

    /// Read of the chart and momentum picture.
    pub technical_setup: String,

    /// Upcoming events that could move the instrument.
    pub catalysts: Vec<String>,

    /// One-paragraph takeaway.
    pub bottom_line: String,

    /// Token counts for the generating call.
    pub token_usage: TokenUsage,

    /// Monetary cost of the generating call.
    pub estimated_cost: Decimal,
}
