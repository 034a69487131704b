/// Classification for recovery policy.
///
/// Used to determine how callers should respond to errors from the gateway.
///
/// # Behavior Summary
///
/// | Class | Retry? | When |
/// |-------|--------|------|
/// | `Never` | No | Fix the request first |
/// | `WithBackoff` | Yes | After a caller-owned backoff delay |
/// | `AfterRollover` | Yes | Once the budget window resets |
/// | `Fatal` | No | Needs operator intervention |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecoveryClass {
    /// Never retry - malformed ticker, unsupported range, or unknown symbol.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Retry with backoff, owned by the calling layer.
    ///
    /// Used for transient upstream conditions: timeouts, malformed
    /// responses, non-2xx statuses. The gateway itself never retries in a
    /// loop; it surfaces the failure (degraded to a stale cached value
    /// where one exists) and leaves the backoff schedule to the caller.
    WithBackoff,

    /// Retry once the call-budget window rolls over.
    ///
    /// The daily quota for the upstream source is spent. Surfaced to the
    /// user as "try again later"; retrying before the window boundary is
    /// guaranteed to fail again.
    AfterRollover,

    /// Not recoverable until an operator acts.
    /// Typically a missing credential for a configured capability.
    Fatal,
}

impl RecoveryClass {
    /// Whether any retry (immediate or deferred) can eventually succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WithBackoff | Self::AfterRollover)
    }
}
