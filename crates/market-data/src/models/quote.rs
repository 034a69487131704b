use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest market quote for a single instrument.
///
/// Immutable value object fetched from upstream. Price and volume fields
/// are non-negative; the change fields are signed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Instrument ticker (normalized, uppercase)
    pub symbol: String,

    /// Last traded price
    pub price: Decimal,

    /// Absolute change since previous close (signed)
    pub change: Decimal,

    /// Percent change since previous close (signed)
    pub change_percent: Decimal,

    /// Trading volume (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Quote currency
    pub currency: String,

    /// Timestamp of the quote
    pub timestamp: DateTime<Utc>,

    /// Source of the quote (e.g., "ALPHA")
    pub source: String,
}

impl Quote {
    /// Create a new quote with minimal required fields.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            volume: None,
            currency: "USD".to_string(),
            timestamp,
            source: source.into(),
        }
    }

    /// Set the daily change fields.
    pub fn with_change(mut self, change: Decimal, change_percent: Decimal) -> Self {
        self.change = change;
        self.change_percent = change_percent;
        self
    }

    /// Set the trading volume.
    pub fn with_volume(mut self, volume: Decimal) -> Self {
        self.volume = Some(volume);
        self
    }
}
