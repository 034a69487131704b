//! Analysis orchestration.
//!
//! The control flow for "analysis of instrument X": verify the cached
//! record against current facts, and only when no usable record exists,
//! assemble the prompt, call the reasoning capability, and account the
//! cost. Retries are owned by the caller; this service makes at most one
//! reasoning call per request.

use std::sync::Arc;

use log::{debug, info};
use rust_decimal::Decimal;
use uuid::Uuid;

use stockdesk_market_data::{Clock, HistoryRange, MarketDataGateway};

use crate::cache::{AnalysisCache, AnalysisCacheConfig, FreshnessProbe};
use crate::cost::{CostKind, CostLedger};
use crate::error::AnalysisError;
use crate::macro_source::MacroSource;
use crate::parse::parse_completion;
use crate::prompt::build_analysis_prompt;
use crate::reasoning::ReasoningProvider;
use crate::types::{AnalysisRecord, TokenPricing};

/// Configuration for the analysis service.
#[derive(Clone, Debug, Default)]
pub struct AnalysisConfig {
    /// Invalidation thresholds for the cache.
    pub cache: AnalysisCacheConfig,
    /// Token pricing for the reasoning model.
    pub pricing: TokenPricing,
    /// Attributed cost per market data call (zero on free tiers).
    pub data_call_cost: Decimal,
}

impl AnalysisConfig {
    /// Build a config from `STOCKDESK_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            cache: AnalysisCacheConfig::from_env(),
            pricing: TokenPricing::default(),
            data_call_cost: Decimal::ZERO,
        }
    }
}

/// Orchestrates cached and fresh analyses for instruments.
pub struct AnalysisService {
    gateway: Arc<MarketDataGateway>,
    macro_source: Arc<dyn MacroSource>,
    reasoning: Arc<dyn ReasoningProvider>,
    cache: AnalysisCache,
    ledger: Arc<CostLedger>,
    clock: Arc<dyn Clock>,
    config: AnalysisConfig,
}

impl AnalysisService {
    pub fn new(
        gateway: Arc<MarketDataGateway>,
        macro_source: Arc<dyn MacroSource>,
        reasoning: Arc<dyn ReasoningProvider>,
        ledger: Arc<CostLedger>,
        clock: Arc<dyn Clock>,
        config: AnalysisConfig,
    ) -> Self {
        let cache = AnalysisCache::new(config.cache.clone(), clock.clone());
        Self {
            gateway,
            macro_source,
            reasoning,
            cache,
            ledger,
            clock,
            config,
        }
    }

    /// The most recently superseded record, for audit diffs.
    pub fn previous(&self, symbol: &str) -> Option<Arc<AnalysisRecord>> {
        self.cache.previous(&normalize(symbol))
    }

    /// Force the next request for `symbol` to regenerate.
    pub fn invalidate(&self, symbol: &str) -> bool {
        self.cache.invalidate(&normalize(symbol))
    }

    /// Get a usable analysis for `symbol`, generating one if needed.
    ///
    /// `force_refresh` bypasses all validity checks. When the facts
    /// needed to verify the cached record cannot be fetched fresh, the
    /// request fails rather than serving an unverifiable record.
    pub async fn analysis(
        &self,
        symbol: &str,
        force_refresh: bool,
    ) -> Result<Arc<AnalysisRecord>, AnalysisError> {
        let symbol = normalize(symbol);
        if force_refresh {
            self.cache.invalidate(&symbol);
        }

        let calls_before = self.gateway.budget_usage().used;

        // Current facts, both probe and prompt input. Stale values
        // cannot attest freshness, so they fail the request.
        let quote = match self.gateway.quote(&symbol).await {
            Ok(fetched) if !fetched.stale => fetched.value,
            Ok(_) => {
                self.cache.get_or_invalidate(&symbol, None);
                self.account_data_calls(calls_before);
                return Err(AnalysisError::Unverifiable(format!(
                    "only a stale quote for {symbol}"
                )));
            }
            Err(err) => {
                self.cache.get_or_invalidate(&symbol, None);
                self.account_data_calls(calls_before);
                return Err(err.into());
            }
        };
        let macro_snapshot = match self.macro_source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.cache.get_or_invalidate(&symbol, None);
                self.account_data_calls(calls_before);
                return Err(err);
            }
        };

        let probe = FreshnessProbe {
            price: quote.price,
            macro_snapshot: macro_snapshot.clone(),
        };
        if let Some(record) = self.cache.get_or_invalidate(&symbol, Some(&probe)) {
            debug!("Serving cached analysis for '{symbol}'");
            self.account_data_calls(calls_before);
            return Ok(record);
        }

        // Prompt enrichments; their absence degrades the prompt, not
        // the request.
        let fundamentals = match self.gateway.fundamentals(&symbol).await {
            Ok(fetched) => Some(fetched.value),
            Err(err) => {
                debug!("No fundamentals for '{symbol}': {err}");
                None
            }
        };
        let history = match self.gateway.history(&symbol, HistoryRange::ThreeMonths).await {
            Ok(fetched) => Some(fetched.value),
            Err(err) => {
                debug!("No history for '{symbol}': {err}");
                None
            }
        };
        self.account_data_calls(calls_before);

        info!(
            "Generating analysis for '{symbol}' with '{}'",
            self.reasoning.id()
        );
        let prompt = build_analysis_prompt(
            &symbol,
            &quote,
            fundamentals.as_ref(),
            history.as_deref(),
            &macro_snapshot,
        );
        let completion = self.reasoning.generate(&prompt).await?;
        let parsed = parse_completion(&completion.text)?;
        let cost = self.config.pricing.cost_of(completion.usage);

        // Price and macro are resnapped to the values this call saw;
        // they must describe the same moment as the thesis.
        let record = AnalysisRecord {
            id: Uuid::now_v7(),
            symbol: symbol.clone(),
            generated_at: self.clock.now(),
            price_at_generation: probe.price,
            macro_at_generation: probe.macro_snapshot,
            confidence_level: parsed.confidence_level,
            thesis: parsed.thesis,
            bullish_factors: parsed.bullish_factors,
            bearish_factors: parsed.bearish_factors,
            technical_setup: parsed.technical_setup,
            catalysts: parsed.catalysts,
            bottom_line: parsed.bottom_line,
            token_usage: completion.usage,
            estimated_cost: cost,
        };

        self.ledger.record_cost(cost, CostKind::Reasoning);
        Ok(self.cache.store(record))
    }

    /// Record one ledger entry per upstream data call this request made.
    fn account_data_calls(&self, used_before: u32) {
        let delta = self
            .gateway
            .budget_usage()
            .used
            .saturating_sub(used_before);
        for _ in 0..delta {
            self.ledger
                .record_cost(self.config.data_call_cost, CostKind::DataCall);
        }
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
