//! Daily call budget limiter for upstream sources.
//!
//! Tracks a calendar-day count of chargeable upstream calls against a
//! fixed quota, one instance per upstream source. The window rolls over
//! lazily: every access compares the stored window key to the current
//! calendar date and resets the counter exactly once per boundary, so a
//! limiter that was idle across midnight self-heals on next use without
//! a background timer.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::clock::Clock;
use crate::models::SourceId;

/// Fraction of quota at which the "approaching limit" predicate fires.
const APPROACHING_LIMIT_THRESHOLD: f64 = 0.80;

/// Rolling window state: a calendar-date key and the count spent in it.
///
/// `count <= limit` is enforced by refusing calls, never by clamping
/// after the fact. Mutated only by the limiter itself.
#[derive(Debug)]
struct Window {
    /// Calendar date key for the current window (e.g., "2024-03-01").
    key: String,
    /// Calls recorded in the current window.
    count: u32,
}

/// Snapshot of the limiter's current usage for reporting surfaces.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetUsage {
    /// Calls recorded in the current window.
    pub used: u32,
    /// The window's quota.
    pub limit: u32,
    /// Calls still available in the current window.
    pub remaining: u32,
    /// Used as a percentage of the quota.
    pub percent_used: f64,
}

/// Per-source daily call budget.
///
/// Thread-safe; `can_make_call`/`record_call` mirror the check/record
/// contract, while [`try_acquire`](Self::try_acquire) performs both under
/// one lock so concurrent requests cannot double-spend a slot. The
/// limiter never raises errors - a refused call is a signal the caller
/// translates into a quota-exhausted condition.
pub struct CallBudget {
    source: SourceId,
    limit: u32,
    window: Mutex<Window>,
    clock: Arc<dyn Clock>,
}

impl CallBudget {
    /// Create a budget for `source` with a daily `limit`.
    pub fn new(source: SourceId, limit: u32, clock: Arc<dyn Clock>) -> Self {
        let key = clock.now().format("%Y-%m-%d").to_string();
        Self {
            source,
            limit,
            window: Mutex::new(Window { key, count: 0 }),
            clock,
        }
    }

    /// Lock the window mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly off count, which is
    /// better than panicking in a request handler.
    fn lock_window(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(|poisoned| {
            warn!("Call budget mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Advance the window to "now" if the calendar date changed.
    ///
    /// Must run before every read or write of the count; resets the
    /// counter exactly once per boundary.
    fn roll_window(&self, window: &mut Window) {
        let current = self.clock.now().format("%Y-%m-%d").to_string();
        if window.key != current {
            info!(
                "Call budget for '{}': window rolled {} -> {}, count reset",
                self.source, window.key, current
            );
            window.key = current;
            window.count = 0;
        }
    }

    /// Whether a chargeable call may be made right now.
    pub fn can_make_call(&self) -> bool {
        let mut window = self.lock_window();
        self.roll_window(&mut window);
        window.count < self.limit
    }

    /// Record a call that was actually made.
    ///
    /// Must be invoked exactly once per upstream call - not once per
    /// logical request, since a request served from cache makes zero
    /// calls.
    pub fn record_call(&self) {
        let mut window = self.lock_window();
        self.roll_window(&mut window);
        window.count = window.count.saturating_add(1);
        if window.count > self.limit {
            warn!(
                "Call budget for '{}': count {} exceeds limit {} - a call was recorded without acquisition",
                self.source, window.count, self.limit
            );
        }
    }

    /// Check and record in one step.
    ///
    /// Returns true and spends a slot if the quota allows it; returns
    /// false otherwise. Performed under a single lock so a concurrent
    /// request cannot interleave between the check and the record.
    pub fn try_acquire(&self) -> bool {
        let mut window = self.lock_window();
        self.roll_window(&mut window);
        if window.count < self.limit {
            window.count += 1;
            true
        } else {
            false
        }
    }

    /// Current usage for reporting surfaces.
    pub fn usage(&self) -> BudgetUsage {
        let mut window = self.lock_window();
        self.roll_window(&mut window);
        let used = window.count.min(self.limit);
        BudgetUsage {
            used: window.count,
            limit: self.limit,
            remaining: self.limit - used,
            percent_used: if self.limit == 0 {
                100.0
            } else {
                f64::from(window.count) / f64::from(self.limit) * 100.0
            },
        }
    }

    /// Whether usage has crossed 80% of the quota.
    ///
    /// Used by upstream warning surfaces before the budget actually runs
    /// out.
    pub fn approaching_limit(&self) -> bool {
        let usage = self.usage();
        usage.percent_used >= APPROACHING_LIMIT_THRESHOLD * 100.0
    }

    /// The upstream source this budget guards.
    pub fn source(&self) -> &str {
        &self.source
    }
}
