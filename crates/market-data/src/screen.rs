//! Quality filter for narrowing search results to an investable universe.
//!
//! Pure functions over candidate instruments: no state, no I/O, fully
//! deterministic. A candidate passes only if it clears every threshold
//! simultaneously. Candidates missing a screened fact fail that
//! threshold - an unverifiable candidate is not investable.

use std::env;

use log::warn;
use rust_decimal::Decimal;

use crate::models::Instrument;

/// Exchanges considered primary listing venues.
const PRIMARY_EXCHANGES: &[&str] = &["NYSE", "NASDAQ", "AMEX"];

/// Threshold configuration for the quality filter.
#[derive(Clone, Debug)]
pub struct ScreenThresholds {
    /// Minimum market capitalization.
    pub min_market_cap: f64,
    /// Minimum last traded price.
    pub min_price: Decimal,
    /// Minimum average daily volume (shares).
    pub min_avg_volume: f64,
    /// Accepted listing exchanges.
    pub allowed_exchanges: Vec<String>,
}

impl Default for ScreenThresholds {
    fn default() -> Self {
        Self {
            min_market_cap: 500_000_000.0,
            min_price: Decimal::from(5),
            min_avg_volume: 500_000.0,
            allowed_exchanges: PRIMARY_EXCHANGES.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ScreenThresholds {
    /// Build thresholds from `STOCKDESK_MIN_*` environment variables,
    /// falling back to defaults for absent or malformed values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_market_cap: env_f64("STOCKDESK_MIN_MARKET_CAP", defaults.min_market_cap),
            min_price: env_decimal("STOCKDESK_MIN_PRICE", defaults.min_price),
            min_avg_volume: env_f64("STOCKDESK_MIN_AVG_VOLUME", defaults.min_avg_volume),
            allowed_exchanges: defaults.allowed_exchanges,
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed {key}={raw}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed {key}={raw}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

/// Whether a single candidate clears every threshold.
pub fn passes(candidate: &Instrument, thresholds: &ScreenThresholds) -> bool {
    let cap_ok = candidate
        .market_cap
        .is_some_and(|cap| cap.is_finite() && cap >= thresholds.min_market_cap);
    let price_ok = candidate
        .price
        .is_some_and(|price| price >= thresholds.min_price);
    let volume_ok = candidate
        .avg_volume
        .is_some_and(|volume| volume.is_finite() && volume >= thresholds.min_avg_volume);
    let exchange_ok = thresholds
        .allowed_exchanges
        .iter()
        .any(|exchange| exchange.eq_ignore_ascii_case(&candidate.exchange));

    cap_ok && price_ok && volume_ok && exchange_ok
}

/// Narrow candidates to the subset satisfying all thresholds.
///
/// A pure intersection: the result equals applying each threshold
/// predicate independently and intersecting, in input order.
pub fn screen(candidates: Vec<Instrument>, thresholds: &ScreenThresholds) -> Vec<Instrument> {
    candidates
        .into_iter()
        .filter(|candidate| passes(candidate, thresholds))
        .collect()
}
