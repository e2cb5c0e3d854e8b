//! Progress normalization for conversion runs.
//!
//! The codec engine exposes several independent, sometimes contradictory
//! progress indicators with ambiguous units: fractional ratios, elapsed-time
//! markers whose scale differs between engine builds, frame counters, and
//! free-text log lines with embedded timestamps. This module reframes them as
//! one tagged [`ProgressSignal`] union plus a [`ProgressNormalizer`] that
//! folds any sequence of signals into a single monotonically non-decreasing
//! percentage for the run.

mod normalizer;
mod signal;

pub use normalizer::{ProgressNormalizer, CLOCK_TOLERANCE, DEFAULT_TARGET_FPS};
pub use signal::{
    duration_from_log, parse_timestamp, signal_from_progress_line, signals_from_log, ClockUnit,
    ProgressSignal,
};
