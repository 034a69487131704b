use serde::{Deserialize, Serialize};

/// Fundamental data for an instrument.
///
/// Immutable value object fetched from upstream. All ratio and level
/// fields are optional because coverage varies by source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    /// Instrument ticker (normalized, uppercase)
    pub symbol: String,

    /// Company name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Business sector (e.g., "Technology")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,

    /// Industry within sector (e.g., "Consumer Electronics")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,

    /// Market capitalization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    /// Price-to-earnings ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,

    /// Earnings per share (trailing twelve months)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,

    /// Dividend yield (as decimal, e.g., 0.025 for 2.5%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,

    /// Beta versus the broad equity index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,

    /// 52-week high price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_52_high: Option<f64>,

    /// 52-week low price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_52_low: Option<f64>,

    /// Source that supplied the data (e.g., "ALPHA")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Fundamentals {
    /// Create fundamentals for a symbol with no data yet.
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Set the company name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the sector.
    pub fn sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Set the market capitalization.
    pub fn market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fundamentals_builder() {
        let fundamentals = Fundamentals::for_symbol("AAPL")
            .name("Apple Inc.")
            .sector("Technology")
            .market_cap(2.8e12);

        assert_eq!(fundamentals.symbol, "AAPL");
        assert_eq!(fundamentals.name, Some("Apple Inc.".to_string()));
        assert_eq!(fundamentals.market_cap, Some(2.8e12));
        assert!(fundamentals.pe_ratio.is_none());
    }

    #[test]
    fn test_fundamentals_serialization_skips_absent_fields() {
        let fundamentals = Fundamentals::for_symbol("AAPL").sector("Technology");
        let json = serde_json::to_string(&fundamentals).unwrap();
        assert!(json.contains("Technology"));
        assert!(!json.contains("peRatio"));
    }
}
