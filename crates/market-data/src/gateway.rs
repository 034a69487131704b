//! Market data gateway.
//!
//! Presents one search/quote/fundamentals/history contract regardless of
//! which upstream source answers, applying TTL caching and call budgeting
//! uniformly so source implementations never reimplement either concern.
//!
//! For each logical operation the gateway:
//! 1. Computes a cache key from the normalized arguments
//! 2. Returns the cached value if present and unexpired - no upstream
//!    call, no budget check
//! 3. Otherwise acquires a budget slot; a refused slot degrades to the
//!    last known good value (marked stale) or fails with `QuotaExhausted`
//! 4. Otherwise calls upstream with a bounded timeout, records the call,
//!    caches the result with the operation-specific TTL, and returns it
//!
//! Empty upstream results are valid answers and are cached too, so a
//! known-invalid symbol is not re-queried within the TTL window.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::env;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::time::timeout;

use crate::budget::{BudgetUsage, CallBudget};
use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::errors::MarketDataError;
use crate::models::{Fundamentals, HistoryRange, Instrument, PricePoint, Quote};
use crate::provider::DataSource;
use crate::screen::{screen, ScreenThresholds};

/// Operation TTLs, upstream timeout, and screening thresholds.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// TTL for search results (~5 min).
    pub search_ttl: Duration,
    /// TTL for latest quotes (~2 min).
    pub quote_ttl: Duration,
    /// TTL for fundamentals (~1 hour).
    pub fundamentals_ttl: Duration,
    /// TTL for intraday history (~15 min).
    pub intraday_history_ttl: Duration,
    /// TTL for daily-and-up history (~24 hours).
    pub daily_history_ttl: Duration,
    /// Bound on any single upstream call.
    pub upstream_timeout: Duration,
    /// Quality filter thresholds applied on the search path.
    pub screen: ScreenThresholds,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            search_ttl: Duration::from_secs(5 * 60),
            quote_ttl: Duration::from_secs(2 * 60),
            fundamentals_ttl: Duration::from_secs(60 * 60),
            intraday_history_ttl: Duration::from_secs(15 * 60),
            daily_history_ttl: Duration::from_secs(24 * 60 * 60),
            upstream_timeout: Duration::from_secs(10),
            screen: ScreenThresholds::default(),
        }
    }
}

impl GatewayConfig {
    /// Build a config from `STOCKDESK_*` environment variables, falling
    /// back to defaults for absent or malformed values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            search_ttl: env_secs("STOCKDESK_SEARCH_TTL_SECS", defaults.search_ttl),
            quote_ttl: env_secs("STOCKDESK_QUOTE_TTL_SECS", defaults.quote_ttl),
            fundamentals_ttl: env_secs("STOCKDESK_FUNDAMENTALS_TTL_SECS", defaults.fundamentals_ttl),
            intraday_history_ttl: env_secs(
                "STOCKDESK_INTRADAY_HISTORY_TTL_SECS",
                defaults.intraday_history_ttl,
            ),
            daily_history_ttl: env_secs(
                "STOCKDESK_DAILY_HISTORY_TTL_SECS",
                defaults.daily_history_ttl,
            ),
            upstream_timeout: env_secs("STOCKDESK_UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout),
            screen: ScreenThresholds::from_env(),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!(
                    "Ignoring malformed {key}={raw}, using default {}s",
                    default.as_secs()
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// A gateway result carrying its freshness.
///
/// `stale` is true when the value comes from the last-known-good store
/// because the upstream was unavailable or the call budget was spent.
/// `as_of` is when the value was actually obtained from upstream.
#[derive(Clone, Debug)]
pub struct Fetched<T> {
    /// The fetched or cached value.
    pub value: T,
    /// Whether the value is degraded (served past its TTL).
    pub stale: bool,
    /// When the value was obtained from upstream.
    pub as_of: DateTime<Utc>,
}

impl<T> Fetched<T> {
    fn fresh(value: T, as_of: DateTime<Utc>) -> Self {
        Self {
            value,
            stale: false,
            as_of,
        }
    }

    fn degraded(value: T, as_of: DateTime<Utc>) -> Self {
        Self {
            value,
            stale: true,
            as_of,
        }
    }
}

/// A value plus the instant it was obtained from upstream.
#[derive(Clone, Debug)]
struct Stamped<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

/// Last-known-good store backing the degraded-service path.
///
/// Holds the most recent successful result per key with no TTL, so a
/// quota-exhausted or upstream-down window can still show the user
/// something, clearly marked as stale. Kept separate from the TTL cache,
/// whose entries are evicted on expiry.
struct LastGood<T> {
    entries: Mutex<HashMap<String, Stamped<T>>>,
}

impl<T: Clone> LastGood<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Stamped<T>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Last-known-good mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn put(&self, key: String, value: T, fetched_at: DateTime<Utc>) {
        self.lock_entries().insert(key, Stamped { value, fetched_at });
    }

    fn get(&self, key: &str) -> Option<Stamped<T>> {
        self.lock_entries().get(key).cloned()
    }
}

/// Degrade a failed operation to the last known good value where one
/// exists; otherwise surface the error unchanged. Only recoverable
/// failures degrade - a bad request stays a bad request.
fn degrade<T: Clone>(
    fallback: &LastGood<T>,
    key: &str,
    err: MarketDataError,
) -> Result<Fetched<T>, MarketDataError> {
    if err.recovery_class().is_recoverable() {
        if let Some(stamped) = fallback.get(key) {
            warn!("Serving stale value for '{key}' after: {err}");
            return Ok(Fetched::degraded(stamped.value, stamped.fetched_at));
        }
    }
    Err(err)
}

/// Uniform facade over one upstream data source.
///
/// Constructed once at process start with the source selected by
/// configuration; passed by handle into whichever component needs market
/// facts.
pub struct MarketDataGateway {
    source: Arc<dyn DataSource>,
    budget: CallBudget,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
    search_cache: TtlCache<String, Stamped<Vec<Instrument>>>,
    quote_cache: TtlCache<String, Stamped<Option<Quote>>>,
    fundamentals_cache: TtlCache<String, Stamped<Option<Fundamentals>>>,
    history_cache: TtlCache<String, Stamped<Vec<PricePoint>>>,
    search_fallback: LastGood<Vec<Instrument>>,
    quote_fallback: LastGood<Quote>,
    fundamentals_fallback: LastGood<Fundamentals>,
    history_fallback: LastGood<Vec<PricePoint>>,
}

impl MarketDataGateway {
    /// Create a gateway over `source`, with the call budget sized from
    /// the source's declared daily quota.
    pub fn new(source: Arc<dyn DataSource>, clock: Arc<dyn Clock>, config: GatewayConfig) -> Self {
        let quota = source.capabilities().daily_call_quota;
        let budget = CallBudget::new(Cow::Borrowed(source.id()), quota, clock.clone());
        Self {
            source,
            budget,
            clock: clock.clone(),
            config,
            search_cache: TtlCache::new(clock.clone()),
            quote_cache: TtlCache::new(clock.clone()),
            fundamentals_cache: TtlCache::new(clock.clone()),
            history_cache: TtlCache::new(clock),
            search_fallback: LastGood::new(),
            quote_fallback: LastGood::new(),
            fundamentals_fallback: LastGood::new(),
            history_fallback: LastGood::new(),
        }
    }

    /// Current call-budget usage for reporting surfaces.
    pub fn budget_usage(&self) -> BudgetUsage {
        self.budget.usage()
    }

    /// Whether the daily quota has crossed its warning threshold.
    pub fn approaching_quota(&self) -> bool {
        self.budget.approaching_limit()
    }

    /// Search for instruments, narrowed by the quality filter.
    ///
    /// Raw upstream results are cached (including empty ones); the
    /// filter runs on the way out so a hit and a miss screen alike.
    pub async fn search(&self, query: &str) -> Result<Fetched<Vec<Instrument>>, MarketDataError> {
        let key = normalize_query(query)?;

        if let Some(hit) = self.search_cache.get(&key) {
            debug!("Search cache hit for '{key}'");
            return Ok(Fetched::fresh(
                screen(hit.value, &self.config.screen),
                hit.fetched_at,
            ));
        }

        if !self.source.capabilities().supports_search {
            return Err(MarketDataError::NotSupported {
                operation: "search".to_string(),
                provider: self.source.id().to_string(),
            });
        }

        if !self.budget.try_acquire() {
            return self.degrade_search(&key, self.quota_exhausted());
        }

        info!("Searching '{}' for '{key}'", self.source.id());
        let outcome = timeout(self.config.upstream_timeout, self.source.search(&key)).await;

        match outcome {
            Err(_) => self.degrade_search(&key, self.timeout_error()),
            Ok(Err(err)) => self.degrade_search(&key, err),
            Ok(Ok(results)) => {
                let now = self.clock.now();
                self.search_cache.set(
                    key.clone(),
                    Stamped {
                        value: results.clone(),
                        fetched_at: now,
                    },
                    self.config.search_ttl,
                );
                self.search_fallback.put(key, results.clone(), now);
                Ok(Fetched::fresh(screen(results, &self.config.screen), now))
            }
        }
    }

    fn degrade_search(
        &self,
        key: &str,
        err: MarketDataError,
    ) -> Result<Fetched<Vec<Instrument>>, MarketDataError> {
        degrade(&self.search_fallback, key, err).map(|fetched| Fetched {
            value: screen(fetched.value, &self.config.screen),
            stale: fetched.stale,
            as_of: fetched.as_of,
        })
    }

    /// Fetch the latest quote for a symbol.
    ///
    /// A symbol the source does not know is remembered as a negative
    /// entry for the quote TTL, and answers `SymbolNotFound` without an
    /// upstream call until it expires.
    pub async fn quote(&self, symbol: &str) -> Result<Fetched<Quote>, MarketDataError> {
        let key = normalize_symbol(symbol)?;

        match self.quote_cache.get(&key) {
            Some(Stamped {
                value: Some(quote),
                fetched_at,
            }) => {
                debug!("Quote cache hit for '{key}'");
                return Ok(Fetched::fresh(quote, fetched_at));
            }
            Some(Stamped { value: None, .. }) => {
                debug!("Negative quote cache hit for '{key}'");
                return Err(MarketDataError::SymbolNotFound(key));
            }
            None => {}
        }

        if !self.budget.try_acquire() {
            return degrade(&self.quote_fallback, &key, self.quota_exhausted());
        }

        info!("Fetching quote for '{key}' from '{}'", self.source.id());
        let outcome = timeout(self.config.upstream_timeout, self.source.quote(&key)).await;

        match outcome {
            Err(_) => degrade(&self.quote_fallback, &key, self.timeout_error()),
            Ok(Err(err)) => degrade(&self.quote_fallback, &key, err),
            Ok(Ok(None)) => {
                let now = self.clock.now();
                self.quote_cache.set(
                    key.clone(),
                    Stamped {
                        value: None,
                        fetched_at: now,
                    },
                    self.config.quote_ttl,
                );
                Err(MarketDataError::SymbolNotFound(key))
            }
            Ok(Ok(Some(quote))) => {
                let now = self.clock.now();
                self.quote_cache.set(
                    key.clone(),
                    Stamped {
                        value: Some(quote.clone()),
                        fetched_at: now,
                    },
                    self.config.quote_ttl,
                );
                self.quote_fallback.put(key, quote.clone(), now);
                Ok(Fetched::fresh(quote, now))
            }
        }
    }

    /// Fetch latest quotes for several symbols.
    ///
    /// Served by a single upstream call when the source supports
    /// batching (one budget slot), falling back to sequential per-symbol
    /// calls (each individually budgeted and cached) when it does not.
    /// Results come back in normalized symbol order; symbols the source
    /// does not know are omitted and negative-cached.
    pub async fn batch_quotes(
        &self,
        symbols: &[String],
    ) -> Result<Vec<Fetched<Quote>>, MarketDataError> {
        let mut normalized = BTreeSet::new();
        for symbol in symbols {
            normalized.insert(normalize_symbol(symbol)?);
        }
        if normalized.is_empty() {
            return Err(MarketDataError::InvalidInput("no symbols given".to_string()));
        }
        let ordered: Vec<String> = normalized.into_iter().collect();

        let mut results: HashMap<String, Fetched<Quote>> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        for symbol in &ordered {
            match self.quote_cache.get(symbol) {
                Some(Stamped {
                    value: Some(quote),
                    fetched_at,
                }) => {
                    results.insert(symbol.clone(), Fetched::fresh(quote, fetched_at));
                }
                Some(Stamped { value: None, .. }) => {
                    debug!("Negative quote cache hit for '{symbol}' in batch");
                }
                None => misses.push(symbol.clone()),
            }
        }

        let mut last_error: Option<MarketDataError> = None;
        if !misses.is_empty() {
            if self.source.capabilities().supports_batch_quotes {
                last_error = self.batched_fetch(&misses, &mut results).await;
            } else {
                // Per-symbol fallback path; each call is individually
                // budgeted and cached by `quote`.
                for symbol in &misses {
                    match self.quote(symbol).await {
                        Ok(fetched) => {
                            results.insert(symbol.clone(), fetched);
                        }
                        Err(MarketDataError::SymbolNotFound(_)) => {}
                        Err(err) => {
                            warn!("Batch quote for '{symbol}' failed: {err}");
                            last_error = Some(err);
                        }
                    }
                }
            }
        }

        if results.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        Ok(ordered
            .iter()
            .filter_map(|symbol| results.remove(symbol))
            .collect())
    }

    /// One upstream call for all missing symbols. Returns the error to
    /// surface if nothing could be served.
    async fn batched_fetch(
        &self,
        misses: &[String],
        results: &mut HashMap<String, Fetched<Quote>>,
    ) -> Option<MarketDataError> {
        if !self.budget.try_acquire() {
            let err = self.quota_exhausted();
            warn!("Batch quotes degraded for {} symbols: {err}", misses.len());
            for symbol in misses {
                if let Some(stamped) = self.quote_fallback.get(symbol) {
                    results.insert(
                        symbol.clone(),
                        Fetched::degraded(stamped.value, stamped.fetched_at),
                    );
                }
            }
            return Some(err);
        }

        info!(
            "Fetching batch of {} quotes from '{}'",
            misses.len(),
            self.source.id()
        );
        let to_fetch: Vec<String> = misses.to_vec();
        let outcome = timeout(
            self.config.upstream_timeout,
            self.source.batch_quotes(&to_fetch),
        )
        .await;

        let err = match outcome {
            Err(_) => self.timeout_error(),
            Ok(Err(err)) => err,
            Ok(Ok(quotes)) => {
                let now = self.clock.now();
                let mut seen: HashSet<String> = HashSet::new();
                for quote in quotes {
                    let symbol = quote.symbol.clone();
                    self.quote_cache.set(
                        symbol.clone(),
                        Stamped {
                            value: Some(quote.clone()),
                            fetched_at: now,
                        },
                        self.config.quote_ttl,
                    );
                    self.quote_fallback.put(symbol.clone(), quote.clone(), now);
                    seen.insert(symbol.clone());
                    results.insert(symbol, Fetched::fresh(quote, now));
                }
                // Symbols the source omitted are unknown; remember that
                // so the next request inside the TTL window stays local.
                for symbol in misses {
                    if !seen.contains(symbol) {
                        self.quote_cache.set(
                            symbol.clone(),
                            Stamped {
                                value: None,
                                fetched_at: now,
                            },
                            self.config.quote_ttl,
                        );
                    }
                }
                return None;
            }
        };

        warn!("Batch quotes failed, degrading where possible: {err}");
        for symbol in misses {
            if let Some(stamped) = self.quote_fallback.get(symbol) {
                results.insert(
                    symbol.clone(),
                    Fetched::degraded(stamped.value, stamped.fetched_at),
                );
            }
        }
        Some(err)
    }

    /// Fetch fundamental data for a symbol.
    pub async fn fundamentals(&self, symbol: &str) -> Result<Fetched<Fundamentals>, MarketDataError> {
        let key = normalize_symbol(symbol)?;

        match self.fundamentals_cache.get(&key) {
            Some(Stamped {
                value: Some(fundamentals),
                fetched_at,
            }) => {
                debug!("Fundamentals cache hit for '{key}'");
                return Ok(Fetched::fresh(fundamentals, fetched_at));
            }
            Some(Stamped { value: None, .. }) => {
                return Err(MarketDataError::SymbolNotFound(key));
            }
            None => {}
        }

        if !self.source.capabilities().supports_fundamentals {
            return Err(MarketDataError::NotSupported {
                operation: "fundamentals".to_string(),
                provider: self.source.id().to_string(),
            });
        }

        if !self.budget.try_acquire() {
            return degrade(&self.fundamentals_fallback, &key, self.quota_exhausted());
        }

        info!(
            "Fetching fundamentals for '{key}' from '{}'",
            self.source.id()
        );
        let outcome = timeout(self.config.upstream_timeout, self.source.fundamentals(&key)).await;

        match outcome {
            Err(_) => degrade(&self.fundamentals_fallback, &key, self.timeout_error()),
            Ok(Err(err)) => degrade(&self.fundamentals_fallback, &key, err),
            Ok(Ok(None)) => {
                let now = self.clock.now();
                self.fundamentals_cache.set(
                    key.clone(),
                    Stamped {
                        value: None,
                        fetched_at: now,
                    },
                    self.config.fundamentals_ttl,
                );
                Err(MarketDataError::SymbolNotFound(key))
            }
            Ok(Ok(Some(fundamentals))) => {
                let now = self.clock.now();
                self.fundamentals_cache.set(
                    key.clone(),
                    Stamped {
                        value: Some(fundamentals.clone()),
                        fetched_at: now,
                    },
                    self.config.fundamentals_ttl,
                );
                self.fundamentals_fallback
                    .put(key, fundamentals.clone(), now);
                Ok(Fetched::fresh(fundamentals, now))
            }
        }
    }

    /// Fetch a historical price series.
    ///
    /// Intraday ranges get the short TTL, daily-and-up ranges the long
    /// one. An empty series is a valid, cacheable answer.
    pub async fn history(
        &self,
        symbol: &str,
        range: HistoryRange,
    ) -> Result<Fetched<Vec<PricePoint>>, MarketDataError> {
        let normalized = normalize_symbol(symbol)?;
        let key = format!("{normalized}:{range}");
        let ttl = if range.is_intraday() {
            self.config.intraday_history_ttl
        } else {
            self.config.daily_history_ttl
        };

        if let Some(hit) = self.history_cache.get(&key) {
            debug!("History cache hit for '{key}'");
            return Ok(Fetched::fresh(hit.value, hit.fetched_at));
        }

        if !self.budget.try_acquire() {
            return degrade(&self.history_fallback, &key, self.quota_exhausted());
        }

        info!(
            "Fetching {range} history for '{normalized}' from '{}'",
            self.source.id()
        );
        let outcome = timeout(
            self.config.upstream_timeout,
            self.source.history(&normalized, range),
        )
        .await;

        match outcome {
            Err(_) => degrade(&self.history_fallback, &key, self.timeout_error()),
            Ok(Err(err)) => degrade(&self.history_fallback, &key, err),
            Ok(Ok(points)) => {
                let now = self.clock.now();
                self.history_cache.set(
                    key.clone(),
                    Stamped {
                        value: points.clone(),
                        fetched_at: now,
                    },
                    ttl,
                );
                self.history_fallback.put(key, points.clone(), now);
                Ok(Fetched::fresh(points, now))
            }
        }
    }

    fn quota_exhausted(&self) -> MarketDataError {
        MarketDataError::QuotaExhausted {
            provider: self.source.id().to_string(),
        }
    }

    fn timeout_error(&self) -> MarketDataError {
        MarketDataError::Timeout {
            provider: self.source.id().to_string(),
        }
    }
}

/// Normalize a ticker: trim, uppercase, validate shape.
///
/// Semantically identical requests must map to the same cache key, so
/// normalization lives here and nowhere else.
fn normalize_symbol(raw: &str) -> Result<String, MarketDataError> {
    let symbol = raw.trim().to_ascii_uppercase();
    if symbol.is_empty() || symbol.len() > 15 {
        return Err(MarketDataError::InvalidInput(format!(
            "malformed ticker: '{raw}'"
        )));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(MarketDataError::InvalidInput(format!(
            "malformed ticker: '{raw}'"
        )));
    }
    Ok(symbol)
}

/// Normalize a search query: trim and lowercase.
fn normalize_query(raw: &str) -> Result<String, MarketDataError> {
    let query = raw.trim().to_lowercase();
    if query.is_empty() {
        return Err(MarketDataError::InvalidInput("empty query".to_string()));
    }
    Ok(query)
}
