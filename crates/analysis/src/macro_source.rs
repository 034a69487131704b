//! Macro backdrop assembly from index quotes.
//!
//! The dashboard's macro snapshot is derived from four index symbols:
//! the volatility index, the long treasury yield, the dollar index, and
//! the broad equity index. They flow through the gateway like any other
//! quotes, so they are cached and budgeted the same way.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;

use stockdesk_market_data::{Clock, Fetched, MarketDataGateway, Quote};

use crate::error::AnalysisError;
use crate::regime::{classify_regime, MacroSnapshot};

/// Source of the current macro backdrop.
#[async_trait]
pub trait MacroSource: Send + Sync {
    /// Assemble a fresh point-in-time snapshot.
    async fn snapshot(&self) -> Result<MacroSnapshot, AnalysisError>;
}

/// Index symbols the snapshot is assembled from.
#[derive(Clone, Debug)]
pub struct MacroSymbols {
    /// Volatility index (e.g., "^VIX").
    pub volatility: String,
    /// Long treasury yield index (e.g., "^TNX", quoted in percent).
    pub long_yield: String,
    /// Dollar index (e.g., "DX-Y.NYB").
    pub dollar: String,
    /// Broad equity index (e.g., "^GSPC").
    pub equity: String,
}

impl Default for MacroSymbols {
    fn default() -> Self {
        Self {
            volatility: "^VIX".to_string(),
            long_yield: "^TNX".to_string(),
            dollar: "DX-Y.NYB".to_string(),
            equity: "^GSPC".to_string(),
        }
    }
}

/// Macro source backed by gateway quotes for the index symbols.
pub struct IndexMacroSource {
    gateway: Arc<MarketDataGateway>,
    symbols: MacroSymbols,
    clock: Arc<dyn Clock>,
}

impl IndexMacroSource {
    pub fn new(gateway: Arc<MarketDataGateway>, clock: Arc<dyn Clock>) -> Self {
        Self::with_symbols(gateway, clock, MacroSymbols::default())
    }

    pub fn with_symbols(
        gateway: Arc<MarketDataGateway>,
        clock: Arc<dyn Clock>,
        symbols: MacroSymbols,
    ) -> Self {
        Self {
            gateway,
            symbols,
            clock,
        }
    }

    /// Pull one index quote out of the batch, refusing stale values.
    ///
    /// A degraded index quote cannot attest that no macro trigger fired,
    /// so it is as unusable as a missing one.
    fn take(
        quotes: &mut HashMap<String, Fetched<Quote>>,
        symbol: &str,
    ) -> Result<Quote, AnalysisError> {
        let fetched = quotes
            .remove(&symbol.to_ascii_uppercase())
            .ok_or_else(|| AnalysisError::Unverifiable(format!("no quote for {symbol}")))?;
        if fetched.stale {
            return Err(AnalysisError::Unverifiable(format!(
                "only a stale quote for {symbol}"
            )));
        }
        Ok(fetched.value)
    }
}

#[async_trait]
impl MacroSource for IndexMacroSource {
    async fn snapshot(&self) -> Result<MacroSnapshot, AnalysisError> {
        let symbols = vec![
            self.symbols.volatility.clone(),
            self.symbols.long_yield.clone(),
            self.symbols.dollar.clone(),
            self.symbols.equity.clone(),
        ];
        let fetched = self.gateway.batch_quotes(&symbols).await?;
        let mut by_symbol: HashMap<String, Fetched<Quote>> = fetched
            .into_iter()
            .map(|quote| (quote.value.symbol.clone(), quote))
            .collect();

        let volatility = Self::take(&mut by_symbol, &self.symbols.volatility)?;
        let long_yield = Self::take(&mut by_symbol, &self.symbols.long_yield)?;
        let dollar = Self::take(&mut by_symbol, &self.symbols.dollar)?;
        let equity = Self::take(&mut by_symbol, &self.symbols.equity)?;

        let volatility_index = volatility.price.to_f64().unwrap_or(f64::NAN);
        let yield_change = long_yield.change.to_f64();
        let dollar_change_pct = dollar.change_percent.to_f64();

        Ok(MacroSnapshot {
            volatility_index,
            long_yield: long_yield.price.to_f64().unwrap_or(f64::NAN),
            dollar_index: dollar.price.to_f64().unwrap_or(f64::NAN),
            equity_index_level: equity.price.to_f64().unwrap_or(f64::NAN),
            equity_index_change_pct: equity.change_percent.to_f64().unwrap_or(0.0),
            regime: classify_regime(volatility_index, yield_change, dollar_change_pct),
            observed_at: self.clock.now(),
        })
    }
}
