//! Progress reporting collaborator.
//!
//! The runner reports the total pending count once, before execution, and
//! then advances by exactly one unit per executed instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::info;

/// Receives run progress.
pub trait ProgressReporter: Send + Sync {
    fn start(&self, total: u64);
    fn advance(&self, n: u64);
    fn finish(&self);
}

/// Reports progress as `info!` events.
#[derive(Debug, Default)]
pub struct LogProgress {
    total: AtomicU64,
    done: AtomicU64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for LogProgress {
    fn start(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        info!(event = "progress.start", total, "Evaluating {} instance(s)", total);
    }

    fn advance(&self, n: u64) {
        let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
        let total = self.total.load(Ordering::Relaxed);
        info!(event = "progress.advance", done, total, "[{}/{}]", done, total);
    }

    fn finish(&self) {
        info!(
            event = "progress.finish",
            done = self.done.load(Ordering::Relaxed),
            total = self.total.load(Ordering::Relaxed),
        );
    }
}

/// Call recorded by [`RecordingProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressCall {
    Start(u64),
    Advance(u64),
    Finish,
}

/// Reporter that records every call (testing only).
#[derive(Debug, Default)]
pub struct RecordingProgress {
    calls: Mutex<Vec<ProgressCall>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ProgressCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Sum of all `advance` calls.
    pub fn advanced(&self) -> u64 {
        self.calls()
            .iter()
            .map(|c| match c {
                ProgressCall::Advance(n) => *n,
                _ => 0,
            })
            .sum()
    }

    /// Total passed to the first `start` call.
    pub fn total(&self) -> Option<u64> {
        self.calls().iter().find_map(|c| match c {
            ProgressCall::Start(n) => Some(*n),
            _ => None,
        })
    }
}

impl ProgressReporter for RecordingProgress {
    fn start(&self, total: u64) {
        self.calls.lock().unwrap().push(ProgressCall::Start(total));
    }

    fn advance(&self, n: u64) {
        self.calls.lock().unwrap().push(ProgressCall::Advance(n));
    }

    fn finish(&self) {
        self.calls.lock().unwrap().push(ProgressCall::Finish);
    }
}
