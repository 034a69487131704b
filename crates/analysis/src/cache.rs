//! Analysis cache and invalidation policy.
//!
//! Validity of a cached [`AnalysisRecord`] is not a single TTL check. A
//! record is usable only while all three hold:
//!
//! - its age is under the analysis TTL,
//! - the price has not drifted more than the configured fraction from
//!   the price at generation,
//! - no macro trigger has fired since generation.
//!
//! Any failing condition supersedes the record (kept for audit, never
//! silently served) and forces a fresh reasoning call. When the current
//! facts needed to evaluate validity cannot be fetched, the policy
//! fails closed: an unverifiable record is as unusable as a stale one.

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;

use stockdesk_market_data::Clock;

use crate::regime::{MacroSnapshot, MacroTrigger, MacroTriggerLimits};
use crate::types::AnalysisRecord;

/// How many superseded records to retain per instrument for audit.
const SUPERSEDED_RETENTION: usize = 8;

/// Current market facts used to evaluate a cached record's validity.
#[derive(Clone, Debug)]
pub struct FreshnessProbe {
    /// The instrument's current price.
    pub price: Decimal,
    /// The current macro backdrop.
    pub macro_snapshot: MacroSnapshot,
}

/// Why a cached record was or was not usable.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheDecision {
    /// All three validity conditions hold.
    Valid,
    /// No record is cached for the instrument.
    Absent,
    /// The record's age exceeded the analysis TTL.
    Expired,
    /// Price drifted past the limit; carries the observed fraction.
    PriceDrift(Decimal),
    /// A macro indicator moved past its limit.
    MacroShift(MacroTrigger),
    /// The facts needed to evaluate validity were unavailable.
    Unverifiable,
}

/// Invalidation thresholds and retention for the analysis cache.
#[derive(Clone, Debug)]
pub struct AnalysisCacheConfig {
    /// Maximum record age before a refresh is forced.
    pub analysis_ttl: Duration,
    /// Price drift fraction that invalidates (0.05 = 5%).
    pub price_drift_limit: Decimal,
    /// Macro-trigger thresholds.
    pub macro_limits: MacroTriggerLimits,
}

impl Default for AnalysisCacheConfig {
    fn default() -> Self {
        Self {
            analysis_ttl: Duration::from_secs(6 * 60 * 60),
            price_drift_limit: Decimal::new(5, 2),
            macro_limits: MacroTriggerLimits::default(),
        }
    }
}

impl AnalysisCacheConfig {
    /// Build a config from `STOCKDESK_*` environment variables, falling
    /// back to defaults for absent or malformed values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let analysis_ttl = match env::var("STOCKDESK_ANALYSIS_TTL_SECS") {
            Ok(raw) => match raw.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    warn!("Ignoring malformed STOCKDESK_ANALYSIS_TTL_SECS={raw}");
                    defaults.analysis_ttl
                }
            },
            Err(_) => defaults.analysis_ttl,
        };
        Self {
            analysis_ttl,
            ..defaults
        }
    }
}

/// Per-instrument slot: the live record plus its superseded ancestors.
struct Slot {
    current: Option<Arc<AnalysisRecord>>,
    superseded: Vec<Arc<AnalysisRecord>>,
}

impl Slot {
    fn supersede(&mut self) {
        if let Some(record) = self.current.take() {
            self.superseded.push(record);
            if self.superseded.len() > SUPERSEDED_RETENTION {
                self.superseded.remove(0);
            }
        }
    }
}

/// Cache of the last AI analysis per instrument, with the smart
/// invalidation policy layered on top of plain TTL expiry.
///
/// Thread-safe; mutations serialize on an internal mutex.
pub struct AnalysisCache {
    slots: Mutex<HashMap<String, Slot>>,
    config: AnalysisCacheConfig,
    clock: Arc<dyn Clock>,
}

impl AnalysisCache {
    /// Create an empty cache.
    pub fn new(config: AnalysisCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Analysis cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Store a freshly generated record, superseding any live one.
    ///
    /// The record replaces its predecessor wholesale: price and macro
    /// snapshots were resnapped by the caller for this specific
    /// generation, so no field of the old record survives.
    pub fn store(&self, record: AnalysisRecord) -> Arc<AnalysisRecord> {
        let record = Arc::new(record);
        let mut slots = self.lock_slots();
        let slot = slots.entry(record.symbol.clone()).or_insert_with(|| Slot {
            current: None,
            superseded: Vec::new(),
        });
        slot.supersede();
        slot.current = Some(record.clone());
        record
    }

    /// The live record for an instrument, with no validity check.
    ///
    /// Callers wanting the policy applied use
    /// [`get_or_invalidate`](Self::get_or_invalidate).
    pub fn peek(&self, symbol: &str) -> Option<Arc<AnalysisRecord>> {
        self.lock_slots()
            .get(symbol)
            .and_then(|slot| slot.current.clone())
    }

    /// The most recently superseded record, for audit diffs.
    pub fn previous(&self, symbol: &str) -> Option<Arc<AnalysisRecord>> {
        self.lock_slots()
            .get(symbol)
            .and_then(|slot| slot.superseded.last().cloned())
    }

    /// Evaluate a record's validity against current facts.
    ///
    /// Pure with respect to cache state; exposed for tests and
    /// diagnostic surfaces.
    pub fn evaluate(
        &self,
        record: &AnalysisRecord,
        probe: &FreshnessProbe,
        now: DateTime<Utc>,
    ) -> CacheDecision {
        let ttl = chrono::Duration::from_std(self.config.analysis_ttl)
            .unwrap_or_else(|_| chrono::Duration::max_value());
        if now - record.generated_at >= ttl {
            return CacheDecision::Expired;
        }

        if record.price_at_generation <= Decimal::ZERO {
            // A record without a sane baseline cannot be verified
            return CacheDecision::Unverifiable;
        }
        let drift = ((probe.price - record.price_at_generation)
            / record.price_at_generation)
            .abs();
        if drift > self.config.price_drift_limit {
            return CacheDecision::PriceDrift(drift);
        }

        if let Some(trigger) = probe
            .macro_snapshot
            .trigger_since(&record.macro_at_generation, &self.config.macro_limits)
        {
            return CacheDecision::MacroShift(trigger);
        }

        CacheDecision::Valid
    }

    /// Return the cached record if it is still usable, superseding it
    /// otherwise.
    ///
    /// `probe` carries the current facts; passing `None` means they
    /// could not be fetched, and the policy fails closed: the record is
    /// not returned, but it is also retained, since it may still verify
    /// once upstream recovers.
    pub fn get_or_invalidate(
        &self,
        symbol: &str,
        probe: Option<&FreshnessProbe>,
    ) -> Option<Arc<AnalysisRecord>> {
        let mut slots = self.lock_slots();
        let slot = slots.get_mut(symbol)?;
        let record = slot.current.clone()?;

        let Some(probe) = probe else {
            warn!("Analysis for '{symbol}' is unverifiable; failing closed");
            return None;
        };

        match self.evaluate(&record, probe, self.clock.now()) {
            CacheDecision::Valid => Some(record),
            decision => {
                info!("Analysis for '{symbol}' invalidated: {decision:?}");
                slot.supersede();
                None
            }
        }
    }

    /// Force invalidation, bypassing all validity checks.
    ///
    /// Returns true when a live record was superseded.
    pub fn invalidate(&self, symbol: &str) -> bool {
        let mut slots = self.lock_slots();
        match slots.get_mut(symbol) {
            Some(slot) if slot.current.is_some() => {
                info!("Analysis for '{symbol}' invalidated on request");
                slot.supersede();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockdesk_market_data::ManualClock;
    use uuid::Uuid;

    use crate::regime::classify_regime;
    use crate::types::TokenUsage;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    fn macro_snapshot(volatility: f64, long_yield: f64, dollar: f64) -> MacroSnapshot {
        MacroSnapshot {
            volatility_index: volatility,
            long_yield,
            dollar_index: dollar,
            equity_index_level: 5000.0,
            equity_index_change_pct: 0.1,
            regime: classify_regime(volatility, None, None),
            observed_at: start_time(),
        }
    }

    fn record(symbol: &str, price: Decimal, generated_at: DateTime<Utc>) -> AnalysisRecord {
        AnalysisRecord {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            generated_at,
            price_at_generation: price,
            macro_at_generation: macro_snapshot(16.0, 4.2, 104.0),
            confidence_level: 4,
            thesis: "Holds up".to_string(),
            bullish_factors: vec!["growth".to_string()],
            bearish_factors: vec!["valuation".to_string()],
            technical_setup: "uptrend".to_string(),
            catalysts: vec!["earnings".to_string()],
            bottom_line: "Constructive".to_string(),
            token_usage: TokenUsage::new(1500, 900),
            estimated_cost: dec!(0.018),
        }
    }

    fn probe(price: Decimal) -> FreshnessProbe {
        FreshnessProbe {
            price,
            macro_snapshot: macro_snapshot(16.0, 4.2, 104.0),
        }
    }

    fn cache_with_clock() -> (AnalysisCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(start_time()));
        let cache = AnalysisCache::new(AnalysisCacheConfig::default(), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_four_percent_move_within_ttl_is_valid() {
        let (cache, clock) = cache_with_clock();
        cache.store(record("AAPL", dec!(100.00), clock.now()));

        clock.advance(chrono::Duration::hours(1));
        let hit = cache.get_or_invalidate("AAPL", Some(&probe(dec!(104.00))));
        assert!(hit.is_some());
    }

    #[test]
    fn test_six_percent_move_invalidates_despite_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.store(record("AAPL", dec!(100.00), clock.now()));

        clock.advance(chrono::Duration::hours(1));
        let hit = cache.get_or_invalidate("AAPL", Some(&probe(dec!(106.00))));
        assert!(hit.is_none());
        // The record was superseded, not silently kept
        assert!(cache.peek("AAPL").is_none());
        assert!(cache.previous("AAPL").is_some());
    }

    #[test]
    fn test_stale_ttl_invalidates_at_unchanged_price() {
        let (cache, clock) = cache_with_clock();
        cache.store(record("AAPL", dec!(100.00), clock.now()));

        clock.advance(chrono::Duration::hours(7));
        let hit = cache.get_or_invalidate("AAPL", Some(&probe(dec!(100.00))));
        assert!(hit.is_none());
    }

    #[test]
    fn test_macro_trigger_invalidates_despite_price_and_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.store(record("AAPL", dec!(100.00), clock.now()));

        clock.advance(chrono::Duration::hours(1));
        let shifted = FreshnessProbe {
            price: dec!(100.00),
            macro_snapshot: macro_snapshot(20.0, 4.2, 104.0),
        };
        let hit = cache.get_or_invalidate("AAPL", Some(&shifted));
        assert!(hit.is_none());
    }

    #[test]
    fn test_unverifiable_probe_fails_closed_but_retains() {
        let (cache, clock) = cache_with_clock();
        cache.store(record("AAPL", dec!(100.00), clock.now()));

        let hit = cache.get_or_invalidate("AAPL", None);
        assert!(hit.is_none());
        // The record is retained: it may verify once upstream recovers
        assert!(cache.peek("AAPL").is_some());
        let recovered = cache.get_or_invalidate("AAPL", Some(&probe(dec!(101.00))));
        assert!(recovered.is_some());
    }

    #[test]
    fn test_forced_invalidation_bypasses_checks() {
        let (cache, clock) = cache_with_clock();
        cache.store(record("AAPL", dec!(100.00), clock.now()));

        assert!(cache.invalidate("AAPL"));
        assert!(cache.peek("AAPL").is_none());
        // A second force is a no-op
        assert!(!cache.invalidate("AAPL"));
    }

    #[test]
    fn test_store_supersedes_and_retains_for_audit() {
        let (cache, clock) = cache_with_clock();
        let first = cache.store(record("AAPL", dec!(100.00), clock.now()));

        clock.advance(chrono::Duration::hours(1));
        let second = cache.store(record("AAPL", dec!(104.00), clock.now()));

        assert_eq!(cache.peek("AAPL").unwrap().id, second.id);
        assert_eq!(cache.previous("AAPL").unwrap().id, first.id);
    }

    #[test]
    fn test_decisions_name_the_failing_condition() {
        let (cache, clock) = cache_with_clock();
        let rec = record("AAPL", dec!(100.00), clock.now());

        clock.advance(chrono::Duration::hours(1));
        let now = clock.now();

        assert_eq!(
            cache.evaluate(&rec, &probe(dec!(104.00)), now),
            CacheDecision::Valid
        );
        assert!(matches!(
            cache.evaluate(&rec, &probe(dec!(106.00)), now),
            CacheDecision::PriceDrift(_)
        ));
        assert!(matches!(
            cache.evaluate(&rec, &probe(dec!(100.00)), now + chrono::Duration::hours(6)),
            CacheDecision::Expired
        ));
    }

    #[test]
    fn test_symbols_are_isolated() {
        let (cache, clock) = cache_with_clock();
        cache.store(record("AAPL", dec!(100.00), clock.now()));
        cache.store(record("MSFT", dec!(400.00), clock.now()));

        cache.invalidate("AAPL");
        assert!(cache.peek("AAPL").is_none());
        assert!(cache.peek("MSFT").is_some());
    }
}
