//! Global atomic counters for EvalAI observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    completions_requested: AtomicU64,
    instances_executed: AtomicU64,
    instances_skipped: AtomicU64,
    scoring_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            completions_requested: AtomicU64::new(0),
            instances_executed: AtomicU64::new(0),
            instances_skipped: AtomicU64::new(0),
            scoring_failures: AtomicU64::new(0),
        }
    }

    /// Increment the completions-requested counter by one.
    pub fn inc_completions(&self) {
        self.completions_requested.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "completions_requested", "counter incremented");
    }

    /// Increment the instances-executed counter by one.
    pub fn inc_executed(&self) {
        self.instances_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "instances_executed", "counter incremented");
    }

    /// Add `n` to the instances-skipped counter.
    pub fn add_skipped(&self, n: u64) {
        self.instances_skipped.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "instances_skipped", n, "counter incremented");
    }

    /// Increment the scoring-failures counter by one.
    pub fn inc_scoring_failures(&self) {
        self.scoring_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "scoring_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a run) rather than on every
    /// increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            completions_requested = self.completions_requested(),
            instances_executed = self.instances_executed(),
            instances_skipped = self.instances_skipped(),
            scoring_failures = self.scoring_failures(),
        );
    }

    pub fn completions_requested(&self) -> u64 {
        self.completions_requested.load(Ordering::Relaxed)
    }

    pub fn instances_executed(&self) -> u64 {
        self.instances_executed.load(Ordering::Relaxed)
    }

    pub fn instances_skipped(&self) -> u64 {
        self.instances_skipped.load(Ordering::Relaxed)
    }

    pub fn scoring_failures(&self) -> u64 {
        self.scoring_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.completions_requested.store(0, Ordering::Relaxed);
        self.instances_executed.store(0, Ordering::Relaxed);
        self.instances_skipped.store(0, Ordering::Relaxed);
        self.scoring_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.completions_requested(), 0);
        m.inc_completions();
        m.inc_completions();
        assert_eq!(m.completions_requested(), 2);

        m.inc_executed();
        assert_eq!(m.instances_executed(), 1);

        m.add_skipped(3);
        assert_eq!(m.instances_skipped(), 3);

        m.inc_scoring_failures();
        assert_eq!(m.scoring_failures(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_completions();
        m.inc_executed();
        m.add_skipped(2);
        m.inc_scoring_failures();
        m.reset();
        assert_eq!(m.completions_requested(), 0);
        assert_eq!(m.instances_executed(), 0);
        assert_eq!(m.instances_skipped(), 0);
        assert_eq!(m.scoring_failures(), 0);
    }
}
