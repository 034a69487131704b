//! Instrument models for symbol search and screening.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Candidate instrument returned from a ticker/symbol search.
///
/// Carries the screening facts (capitalization, price, liquidity,
/// exchange) the quality filter narrows on. Fields an upstream source
/// cannot supply are `None` and fail the corresponding threshold.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    /// Symbol/ticker (e.g., "AAPL", "SHOP.TO")
    pub symbol: String,

    /// Short display name (e.g., "Apple Inc")
    pub name: String,

    /// Exchange name (e.g., "NASDAQ", "NYSE")
    pub exchange: String,

    /// Asset type (e.g., "EQUITY", "ETF")
    pub asset_type: String,

    /// Market capitalization in quote currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    /// Last traded price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Average daily trading volume (shares)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_volume: Option<f64>,

    /// Currency for the symbol (e.g., "USD", "CAD")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Instrument {
    /// Create a new instrument with required fields.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        exchange: impl Into<String>,
        asset_type: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            exchange: exchange.into(),
            asset_type: asset_type.into(),
            market_cap: None,
            price: None,
            avg_volume: None,
            currency: None,
        }
    }

    /// Set the market capitalization.
    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    /// Set the last traded price.
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// Set the average daily volume.
    pub fn with_avg_volume(mut self, avg_volume: f64) -> Self {
        self.avg_volume = Some(avg_volume);
        self
    }

    /// Set the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}
