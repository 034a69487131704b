//! Monthly cost ledger for reasoning and data calls.
//!
//! Accumulates monetary cost into one live period keyed by calendar
//! month, with an append-only history of closed periods. Rollover is
//! lazy, on the same pattern as the call budget's daily window but
//! independently instantiated - a billing-period rollover and a data
//! quota rollover are different cadences and share no mutable state.

use std::env;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Datelike;
use log::{info, warn};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockdesk_market_data::Clock;

/// Fraction of budget at which the first alert fires.
const APPROACHING_BUDGET_THRESHOLD: f64 = 0.80;

/// Fraction of budget at which the critical alert fires.
const CRITICAL_BUDGET_THRESHOLD: f64 = 0.95;

/// What kind of chargeable call a cost belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CostKind {
    /// An AI reasoning call, priced by tokens.
    Reasoning,
    /// A market data call, priced per call.
    DataCall,
}

impl CostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::DataCall => "data-call",
        }
    }
}

/// A closed accounting period.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedPeriod {
    /// Period key, "YYYY-MM".
    pub period: String,
    /// Total cost accumulated in the period.
    pub total: Decimal,
    /// Number of recorded calls.
    pub call_count: u32,
}

/// Usage snapshot of the live period.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodUsage {
    /// Period key, "YYYY-MM".
    pub period: String,
    /// Total cost so far.
    pub total: Decimal,
    /// Reasoning-call share of the total.
    pub reasoning: Decimal,
    /// Data-call share of the total.
    pub data: Decimal,
    /// Number of recorded calls.
    pub call_count: u32,
    /// The configured monthly budget.
    pub budget: Decimal,
    /// Total as a percentage of the budget.
    pub percent_of_budget: f64,
}

/// Reportable budget conditions. Crossing a threshold is surfaced, not
/// blocking - the ledger never refuses a recording.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BudgetAlert {
    /// 80% of the monthly budget is spent.
    Approaching,
    /// 95% of the monthly budget is spent.
    Critical,
}

/// The one live period. Exactly one exists at any time.
#[derive(Debug)]
struct LivePeriod {
    period: String,
    total: Decimal,
    reasoning: Decimal,
    data: Decimal,
    call_count: u32,
}

impl LivePeriod {
    fn zeroed(period: String) -> Self {
        Self {
            period,
            total: Decimal::ZERO,
            reasoning: Decimal::ZERO,
            data: Decimal::ZERO,
            call_count: 0,
        }
    }
}

#[derive(Debug)]
struct LedgerState {
    current: LivePeriod,
    history: Vec<ClosedPeriod>,
}

/// Monthly cost ledger.
///
/// Thread-safe; mutations serialize on an internal mutex.
pub struct CostLedger {
    state: Mutex<LedgerState>,
    budget: Decimal,
    clock: Arc<dyn Clock>,
}

impl CostLedger {
    /// Create a ledger with the given monthly budget.
    pub fn new(budget: Decimal, clock: Arc<dyn Clock>) -> Self {
        let period = period_key(&clock);
        Self {
            state: Mutex::new(LedgerState {
                current: LivePeriod::zeroed(period),
                history: Vec::new(),
            }),
            budget,
            clock,
        }
    }

    /// Create a ledger with the budget from `STOCKDESK_MONTHLY_BUDGET`,
    /// defaulting to 25.00.
    pub fn from_env(clock: Arc<dyn Clock>) -> Self {
        let default = Decimal::new(2500, 2);
        let budget = match env::var("STOCKDESK_MONTHLY_BUDGET") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Ignoring malformed STOCKDESK_MONTHLY_BUDGET={raw}");
                default
            }),
            Err(_) => default,
        };
        Self::new(budget, clock)
    }

    fn lock_state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Cost ledger mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Close the live period into history if the calendar month changed.
    ///
    /// Runs before every read or write; closes at most once per
    /// boundary, so repeated calls within one period are no-ops.
    fn roll_if_needed(&self, state: &mut LedgerState) {
        let period = period_key(&self.clock);
        if state.current.period != period {
            info!(
                "Cost ledger: closing period {} at total {}",
                state.current.period, state.current.total
            );
            state.history.push(ClosedPeriod {
                period: state.current.period.clone(),
                total: state.current.total,
                call_count: state.current.call_count,
            });
            state.current = LivePeriod::zeroed(period);
        }
    }

    /// Accumulate a cost into the live period.
    ///
    /// Zero-cost calls still count toward the call count. Negative
    /// amounts are ignored - the ledger only ever grows within a period.
    pub fn record_cost(&self, amount: Decimal, kind: CostKind) {
        if amount < Decimal::ZERO {
            warn!("Ignoring negative cost {amount} for {}", kind.as_str());
            return;
        }
        let mut state = self.lock_state();
        self.roll_if_needed(&mut state);
        state.current.total += amount;
        state.current.call_count = state.current.call_count.saturating_add(1);
        match kind {
            CostKind::Reasoning => state.current.reasoning += amount,
            CostKind::DataCall => state.current.data += amount,
        }
    }

    /// Usage snapshot of the live period.
    pub fn current_usage(&self) -> PeriodUsage {
        let mut state = self.lock_state();
        self.roll_if_needed(&mut state);
        let percent = if self.budget > Decimal::ZERO {
            (state.current.total / self.budget * Decimal::from(100))
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        PeriodUsage {
            period: state.current.period.clone(),
            total: state.current.total,
            reasoning: state.current.reasoning,
            data: state.current.data,
            call_count: state.current.call_count,
            budget: self.budget,
            percent_of_budget: percent,
        }
    }

    /// Trigger the lazy rollover explicitly.
    ///
    /// Idempotent within a period: the second call at the same wall
    /// clock does nothing.
    pub fn rollover(&self) {
        let mut state = self.lock_state();
        self.roll_if_needed(&mut state);
    }

    /// The reportable budget condition, if any threshold is crossed.
    pub fn budget_alert(&self) -> Option<BudgetAlert> {
        let usage = self.current_usage();
        if usage.percent_of_budget >= CRITICAL_BUDGET_THRESHOLD * 100.0 {
            Some(BudgetAlert::Critical)
        } else if usage.percent_of_budget >= APPROACHING_BUDGET_THRESHOLD * 100.0 {
            Some(BudgetAlert::Approaching)
        } else {
            None
        }
    }

    /// Closed periods, oldest first.
    pub fn history(&self) -> Vec<ClosedPeriod> {
        let mut state = self.lock_state();
        self.roll_if_needed(&mut state);
        state.history.clone()
    }
}

fn period_key(clock: &Arc<dyn Clock>) -> String {
    let now = clock.now();
    format!("{:04}-{:02}", now.year(), now.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use stockdesk_market_data::ManualClock;

    fn ledger_with_clock(budget: Decimal) -> (CostLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        ));
        let ledger = CostLedger::new(budget, clock.clone());
        (ledger, clock)
    }

    #[test]
    fn test_costs_accumulate_by_kind() {
        let (ledger, _clock) = ledger_with_clock(dec!(25.00));

        ledger.record_cost(dec!(0.04), CostKind::Reasoning);
        ledger.record_cost(dec!(0.01), CostKind::DataCall);
        ledger.record_cost(dec!(0.05), CostKind::Reasoning);

        let usage = ledger.current_usage();
        assert_eq!(usage.total, dec!(0.10));
        assert_eq!(usage.reasoning, dec!(0.09));
        assert_eq!(usage.data, dec!(0.01));
        assert_eq!(usage.call_count, 3);
        assert_eq!(usage.period, "2024-03");
    }

    #[test]
    fn test_rollover_is_idempotent_within_a_period() {
        let (ledger, _clock) = ledger_with_clock(dec!(25.00));
        ledger.record_cost(dec!(1.00), CostKind::Reasoning);

        ledger.rollover();
        ledger.rollover();

        assert!(ledger.history().is_empty());
        assert_eq!(ledger.current_usage().total, dec!(1.00));
    }

    #[test]
    fn test_one_closed_entry_per_month_boundary() {
        let (ledger, clock) = ledger_with_clock(dec!(25.00));

        for month in 0..4 {
            ledger.record_cost(dec!(1.00), CostKind::Reasoning);
            clock.set(
                Utc.with_ymd_and_hms(2024, 4 + month, 1, 0, 0, 0).unwrap(),
            );
            ledger.rollover();
        }

        let history = ledger.history();
        assert_eq!(history.len(), 4);
        let periods: Vec<&str> = history.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2024-03", "2024-04", "2024-05", "2024-06"]);
        for closed in &history {
            assert_eq!(closed.total, dec!(1.00));
            assert_eq!(closed.call_count, 1);
        }
        assert_eq!(ledger.current_usage().total, Decimal::ZERO);
    }

    #[test]
    fn test_idle_ledger_self_heals_across_boundary() {
        let (ledger, clock) = ledger_with_clock(dec!(25.00));
        ledger.record_cost(dec!(2.00), CostKind::Reasoning);

        // No explicit rollover call; the next recording rolls lazily
        clock.set(Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap());
        ledger.record_cost(dec!(0.50), CostKind::Reasoning);

        assert_eq!(ledger.history().len(), 1);
        assert_eq!(ledger.current_usage().total, dec!(0.50));
        assert_eq!(ledger.current_usage().period, "2024-04");
    }

    #[test]
    fn test_budget_alerts() {
        let (ledger, _clock) = ledger_with_clock(dec!(10.00));

        ledger.record_cost(dec!(7.00), CostKind::Reasoning);
        assert_eq!(ledger.budget_alert(), None);

        ledger.record_cost(dec!(1.50), CostKind::Reasoning);
        assert_eq!(ledger.budget_alert(), Some(BudgetAlert::Approaching));

        ledger.record_cost(dec!(1.00), CostKind::Reasoning);
        assert_eq!(ledger.budget_alert(), Some(BudgetAlert::Critical));

        // Alerts report, they never block
        ledger.record_cost(dec!(5.00), CostKind::Reasoning);
        assert_eq!(ledger.current_usage().total, dec!(14.50));
    }

    #[test]
    fn test_negative_amounts_are_ignored() {
        let (ledger, _clock) = ledger_with_clock(dec!(25.00));
        ledger.record_cost(dec!(-1.00), CostKind::Reasoning);
        assert_eq!(ledger.current_usage().total, Decimal::ZERO);
        assert_eq!(ledger.current_usage().call_count, 0);
    }

    #[test]
    fn test_percent_of_budget() {
        let (ledger, _clock) = ledger_with_clock(dec!(20.00));
        ledger.record_cost(dec!(5.00), CostKind::Reasoning);
        let usage = ledger.current_usage();
        assert!((usage.percent_of_budget - 25.0).abs() < 1e-9);
    }
}
