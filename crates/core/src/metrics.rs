//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job queue (submissions, conversions, durations)
//! - Progress normalization (signal outcomes)
//! - Engine session (load attempts)
//! - Handle lifecycle (revocations)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Job Queue Metrics
// =============================================================================

/// Jobs submitted total.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("reelsmith_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Duplicate submissions dropped.
pub static DUPLICATES_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelsmith_duplicate_submissions_total",
        "Submissions dropped because a job with the same identity exists",
    )
    .unwrap()
});

/// Conversions total by result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_conversions_total", "Total conversion runs"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "reelsmith_conversion_duration_seconds",
            "Duration of conversion runs",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
    )
    .unwrap()
});

// =============================================================================
// Progress Normalizer Metrics
// =============================================================================

/// Progress signals by kind and outcome.
pub static PROGRESS_SIGNALS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelsmith_progress_signals_total",
            "Progress signals observed by the normalizer",
        ),
        &["kind", "outcome"], // kind: "ratio", "clock", "frame"; outcome: "applied", "dropped", "discarded"
    )
    .unwrap()
});

// =============================================================================
// Engine Session Metrics
// =============================================================================

/// Engine load attempts by result.
pub static ENGINE_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_engine_loads_total", "Engine load attempts"),
        &["result"], // "success", "error", "timeout", "fatal"
    )
    .unwrap()
});

// =============================================================================
// Resource Metrics
// =============================================================================

/// Handles revoked total.
pub static HANDLES_REVOKED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("reelsmith_handles_revoked_total", "Media handles revoked").unwrap()
});

/// Duration probe results.
pub static PROBE_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelsmith_probe_results_total", "Duration probe outcomes"),
        &["result"], // "found", "unknown"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Queue
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(DUPLICATES_DROPPED.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        // Progress
        Box::new(PROGRESS_SIGNALS.clone()),
        // Engine
        Box::new(ENGINE_LOADS.clone()),
        // Resources
        Box::new(HANDLES_REVOKED.clone()),
        Box::new(PROBE_RESULTS.clone()),
    ]
}
