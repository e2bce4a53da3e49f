//! Structured observability hooks for EvalAI run lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span, attached to the run future
//! - Emission functions for key lifecycle events: start, phase change,
//!   instance scored, scoring downgraded, finish
//!
//! Events are emitted at `info!` level (configurable via `EVALAI_LOG`).

use tracing::info;

use crate::domain::ExecutionKey;

/// Run-scoped span tagged with the run_id.
///
/// # Example
///
/// ```ignore
/// runner_future.instrument(run_span("6f1c...")).await;
/// // every tracing call inside is now associated with run_id = "6f1c..."
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("evalai.run", run_id = %run_id)
}

/// Emit event: run started with its pending and skipped work counts.
pub fn emit_run_started(run_id: &str, evaluations: usize, pending: usize, skipped: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        evaluations = evaluations,
        pending = pending,
        skipped = skipped,
    );
}

/// Emit event: runner moved to a new phase.
pub fn emit_phase(run_id: &str, phase: &str) {
    info!(event = "run.phase", run_id = %run_id, phase = %phase);
}

/// Emit event: one instance executed and scored.
pub fn emit_instance_scored(key: &ExecutionKey, score: f64) {
    info!(event = "instance.scored", key = %key, score = score);
}

/// Emit event: scoring could not run and was downgraded to 0 (warning level).
pub fn emit_scoring_failed(key: &ExecutionKey, diagnostic: &str) {
    tracing::warn!(event = "instance.scoring_failed", key = %key, diagnostic = %diagnostic);
}

/// Emit event: run finished with duration, executed count and success status.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, executed: usize, success: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        executed = executed,
        success = success,
    );
}
