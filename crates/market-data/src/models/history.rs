//! Historical price series models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// A single OHLCV bar in a historical series.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    /// Bar timestamp
    pub timestamp: DateTime<Utc>,

    /// Opening price
    pub open: Decimal,

    /// High price
    pub high: Decimal,

    /// Low price
    pub low: Decimal,

    /// Closing price
    pub close: Decimal,

    /// Trading volume (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

/// Supported lookback ranges for historical series.
///
/// The range determines bar granularity upstream and the cache TTL in the
/// gateway: intraday ranges go stale in minutes, daily ranges only change
/// once per session.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryRange {
    /// Intraday bars for the current session
    OneDay,
    /// Intraday bars for the past five sessions
    FiveDays,
    /// Daily bars for one month
    OneMonth,
    /// Daily bars for three months
    ThreeMonths,
    /// Daily bars for six months
    SixMonths,
    /// Daily bars for one year
    OneYear,
    /// Weekly bars for five years
    FiveYears,
}

impl HistoryRange {
    /// Canonical string form, used in cache keys and upstream requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::FiveDays => "5d",
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
        }
    }

    /// Whether this range is served with intraday bars.
    ///
    /// Intraday series change throughout the session and get a much
    /// shorter TTL than daily series.
    pub fn is_intraday(&self) -> bool {
        matches!(self, Self::OneDay | Self::FiveDays)
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Self::OneDay),
            "5d" => Ok(Self::FiveDays),
            "1mo" => Ok(Self::OneMonth),
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "5y" => Ok(Self::FiveYears),
            other => Err(MarketDataError::InvalidInput(format!(
                "unsupported history range: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_round_trip() {
        for range in [
            HistoryRange::OneDay,
            HistoryRange::FiveDays,
            HistoryRange::OneMonth,
            HistoryRange::ThreeMonths,
            HistoryRange::SixMonths,
            HistoryRange::OneYear,
            HistoryRange::FiveYears,
        ] {
            assert_eq!(range.as_str().parse::<HistoryRange>().unwrap(), range);
        }
    }

    #[test]
    fn test_unsupported_range_is_invalid_input() {
        let err = "2w".parse::<HistoryRange>().unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidInput(_)));
    }

    #[test]
    fn test_intraday_classification() {
        assert!(HistoryRange::OneDay.is_intraday());
        assert!(HistoryRange::FiveDays.is_intraday());
        assert!(!HistoryRange::OneMonth.is_intraday());
        assert!(!HistoryRange::FiveYears.is_intraday());
    }
}
