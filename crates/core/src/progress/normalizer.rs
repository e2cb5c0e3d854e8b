//! Monotonic progress normalization for a single conversion run.

use tracing::trace;

use super::signal::{duration_from_log, signals_from_log, ClockUnit, ProgressSignal};
use crate::metrics;

/// Tolerance factor when disambiguating clock signals against the known
/// duration: an interpretation is plausible if it stays within 1.2x of it.
pub const CLOCK_TOLERANCE: f64 = 1.2;

/// Fallback output frame rate used to turn frame counters into fractions.
pub const DEFAULT_TARGET_FPS: f64 = 30.0;

/// Folds heterogeneous progress signals for one run into a non-decreasing
/// integer percentage in [0, 100].
///
/// One normalizer instance covers exactly one run; progress resets are
/// expressed by constructing a fresh normalizer, never by rewinding.
#[derive(Debug)]
pub struct ProgressNormalizer {
    best_duration_secs: Option<f64>,
    target_fps: f64,
    last_percent: u8,
}

impl ProgressNormalizer {
    /// Create a normalizer for a run, with the caller-supplied duration
    /// estimate if one is known at dispatch time.
    pub fn new(known_duration_secs: Option<f64>) -> Self {
        Self {
            best_duration_secs: known_duration_secs.filter(|d| *d > 0.0),
            target_fps: DEFAULT_TARGET_FPS,
            last_percent: 0,
        }
    }

    /// Override the target output frame rate used for frame-counter signals.
    pub fn with_target_fps(mut self, fps: f64) -> Self {
        if fps > 0.0 {
            self.target_fps = fps;
        }
        self
    }

    /// The best duration estimate seen so far, if any.
    pub fn duration_secs(&self) -> Option<f64> {
        self.best_duration_secs
    }

    /// The last emitted percentage (0 before the first emission).
    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    /// Supply a duration estimate. Only fills an unset estimate; once set,
    /// the duration is never replaced, so late or conflicting discoveries
    /// cannot make progress jump around mid-run.
    pub fn supply_duration(&mut self, secs: f64) {
        if self.best_duration_secs.is_none() && secs > 0.0 {
            self.best_duration_secs = Some(secs);
        }
    }

    /// Observe one progress signal. Returns the new percentage only when it
    /// strictly exceeds the last emitted value; ties, regressions and
    /// unusable signals are dropped silently.
    pub fn observe(&mut self, signal: &ProgressSignal) -> Option<u8> {
        let fraction = match self.fraction_for(signal) {
            Some(f) => f,
            None => {
                metrics::PROGRESS_SIGNALS
                    .with_label_values(&[signal_kind(signal), "discarded"])
                    .inc();
                return None;
            }
        };

        let candidate = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;
        if candidate > self.last_percent {
            self.last_percent = candidate;
            metrics::PROGRESS_SIGNALS
                .with_label_values(&[signal_kind(signal), "applied"])
                .inc();
            Some(candidate)
        } else {
            trace!(candidate, last = self.last_percent, "progress regression dropped");
            metrics::PROGRESS_SIGNALS
                .with_label_values(&[signal_kind(signal), "dropped"])
                .inc();
            None
        }
    }

    /// Observe a free-text engine log line: discovers the duration from
    /// `Duration:` lines and feeds any embedded progress markers through
    /// [`observe`](Self::observe). Returns the new percentage if one was
    /// emitted.
    pub fn observe_log(&mut self, line: &str) -> Option<u8> {
        if let Some(duration) = duration_from_log(line) {
            self.supply_duration(duration);
        }

        let mut emitted = None;
        for signal in signals_from_log(line) {
            if let Some(percent) = self.observe(&signal) {
                emitted = Some(percent);
            }
        }
        emitted
    }

    /// Run completed successfully: force-emit 100 regardless of the last
    /// observed value, so an engine that under-reports near the end never
    /// leaves the job stuck below full.
    pub fn complete(&mut self) -> u8 {
        self.last_percent = 100;
        100
    }

    fn fraction_for(&self, signal: &ProgressSignal) -> Option<f64> {
        match *signal {
            ProgressSignal::Ratio(value) => {
                if (0.0..=1.0).contains(&value) {
                    Some(value)
                } else if value > 1.0 && value <= 100.0 {
                    Some(value / 100.0)
                } else {
                    None
                }
            }
            ProgressSignal::Clock { value, unit } => {
                let duration = self.best_duration_secs?;
                let secs = resolve_clock_secs(value, unit, duration)?;
                Some((secs / duration).min(1.0))
            }
            ProgressSignal::Frame(frame) => {
                let duration = self.best_duration_secs?;
                let total_frames = duration * self.target_fps;
                if total_frames <= 0.0 {
                    return None;
                }
                Some((frame as f64 / total_frames).min(1.0))
            }
        }
    }
}

/// Resolve a clock value to seconds. Known units convert directly; an
/// unknown unit is tried as seconds, then milliseconds, then microseconds,
/// and the first interpretation that stays within [`CLOCK_TOLERANCE`] of the
/// duration wins. Values no interpretation can explain are unusable.
fn resolve_clock_secs(value: f64, unit: ClockUnit, duration_secs: f64) -> Option<f64> {
    if value < 0.0 || !value.is_finite() {
        return None;
    }

    let limit = duration_secs * CLOCK_TOLERANCE;
    let plausible = |secs: f64| secs <= limit;

    match unit {
        ClockUnit::Seconds => Some(value),
        ClockUnit::Millis => Some(value / 1_000.0),
        ClockUnit::Micros => Some(value / 1_000_000.0),
        ClockUnit::Unknown => [1.0, 1_000.0, 1_000_000.0]
            .iter()
            .map(|scale| value / scale)
            .find(|secs| plausible(*secs)),
    }
}

fn signal_kind(signal: &ProgressSignal) -> &'static str {
    match signal {
        ProgressSignal::Ratio(_) => "ratio",
        ProgressSignal::Clock { .. } => "clock",
        ProgressSignal::Frame(_) => "frame",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_fraction() {
        let mut normalizer = ProgressNormalizer::new(None);
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(0.5)), Some(50));
    }

    #[test]
    fn test_ratio_percentage() {
        let mut normalizer = ProgressNormalizer::new(None);
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(42.0)), Some(42));
    }

    #[test]
    fn test_ratio_out_of_range_discarded() {
        let mut normalizer = ProgressNormalizer::new(None);
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(250.0)), None);
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(-0.1)), None);
        assert_eq!(normalizer.last_percent(), 0);
    }

    #[test]
    fn test_monotonic_ties_and_regressions_dropped() {
        let mut normalizer = ProgressNormalizer::new(None);
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(0.6)), Some(60));
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(0.6)), None);
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(0.3)), None);
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(0.61)), Some(61));
    }

    #[test]
    fn test_emitted_sequence_is_non_decreasing_and_bounded() {
        // Arbitrary mix of noisy signals; the emitted sequence must still be
        // strictly increasing and inside [0, 100].
        let signals = [
            ProgressSignal::Ratio(0.1),
            ProgressSignal::Ratio(0.05),
            ProgressSignal::Clock {
                value: 30.0,
                unit: ClockUnit::Seconds,
            },
            ProgressSignal::Ratio(900.0),
            ProgressSignal::Frame(2700),
            ProgressSignal::Clock {
                value: 15_000.0,
                unit: ClockUnit::Unknown,
            },
            ProgressSignal::Ratio(0.99),
            ProgressSignal::Ratio(0.2),
        ];

        let mut normalizer = ProgressNormalizer::new(Some(120.0));
        let mut emitted = Vec::new();
        for signal in &signals {
            if let Some(percent) = normalizer.observe(signal) {
                emitted.push(percent);
            }
        }

        assert!(!emitted.is_empty());
        for window in emitted.windows(2) {
            assert!(window[1] > window[0]);
        }
        assert!(emitted.iter().all(|p| *p <= 100));
    }

    #[test]
    fn test_clock_unknown_unit_disambiguation() {
        // duration=120s, raw value 60000: seconds is out of range, millis
        // fits (60s -> 50%), micros would be implausibly small but millis
        // is tried first.
        let mut normalizer = ProgressNormalizer::new(Some(120.0));
        let percent = normalizer.observe(&ProgressSignal::Clock {
            value: 60_000.0,
            unit: ClockUnit::Unknown,
        });
        assert_eq!(percent, Some(50));
    }

    #[test]
    fn test_clock_unknown_unit_plain_seconds() {
        let mut normalizer = ProgressNormalizer::new(Some(120.0));
        let percent = normalizer.observe(&ProgressSignal::Clock {
            value: 90.0,
            unit: ClockUnit::Unknown,
        });
        assert_eq!(percent, Some(75));
    }

    #[test]
    fn test_clock_no_plausible_interpretation_discarded() {
        let mut normalizer = ProgressNormalizer::new(Some(1.0));
        // 10^9 of anything is beyond 1.2x a one-second clip... except as
        // microseconds it would be 1000s, still out; nothing fits.
        let percent = normalizer.observe(&ProgressSignal::Clock {
            value: 1e10,
            unit: ClockUnit::Unknown,
        });
        assert_eq!(percent, None);
    }

    #[test]
    fn test_clock_without_duration_discarded() {
        let mut normalizer = ProgressNormalizer::new(None);
        let percent = normalizer.observe(&ProgressSignal::Clock {
            value: 60.0,
            unit: ClockUnit::Seconds,
        });
        assert_eq!(percent, None);
    }

    #[test]
    fn test_frame_signal_uses_duration_and_fps() {
        // 120s at 30 fps -> 3600 frames; frame 1800 is 50%.
        let mut normalizer = ProgressNormalizer::new(Some(120.0));
        assert_eq!(normalizer.observe(&ProgressSignal::Frame(1800)), Some(50));
    }

    #[test]
    fn test_frame_signal_without_duration_discarded() {
        let mut normalizer = ProgressNormalizer::new(None);
        assert_eq!(normalizer.observe(&ProgressSignal::Frame(1800)), None);
    }

    #[test]
    fn test_frame_overshoot_clamped() {
        let mut normalizer = ProgressNormalizer::new(Some(10.0));
        assert_eq!(normalizer.observe(&ProgressSignal::Frame(9999)), Some(100));
    }

    #[test]
    fn test_duration_discovered_from_log() {
        let mut normalizer = ProgressNormalizer::new(None);
        assert_eq!(normalizer.duration_secs(), None);

        normalizer.observe_log("  Duration: 00:02:00.00, start: 0.000000, bitrate: 2540 kb/s");
        assert_eq!(normalizer.duration_secs(), Some(120.0));

        // A clock signal is now usable.
        let percent = normalizer.observe(&ProgressSignal::Clock {
            value: 60.0,
            unit: ClockUnit::Seconds,
        });
        assert_eq!(percent, Some(50));
    }

    #[test]
    fn test_duration_never_replaced_once_set() {
        let mut normalizer = ProgressNormalizer::new(Some(120.0));
        normalizer.observe_log("  Duration: 00:00:10.00, start: 0.000000");
        assert_eq!(normalizer.duration_secs(), Some(120.0));

        normalizer.supply_duration(5.0);
        assert_eq!(normalizer.duration_secs(), Some(120.0));
    }

    #[test]
    fn test_observe_log_stats_line_emits() {
        let mut normalizer = ProgressNormalizer::new(Some(8.0));
        let percent = normalizer
            .observe_log("frame=  120 fps= 30 q=28.0 size= 512KiB time=00:00:04.00 bitrate=1k");
        assert_eq!(percent, Some(50));
    }

    #[test]
    fn test_complete_forces_100() {
        let mut normalizer = ProgressNormalizer::new(Some(120.0));
        normalizer.observe(&ProgressSignal::Ratio(0.37));
        assert_eq!(normalizer.complete(), 100);
        assert_eq!(normalizer.last_percent(), 100);
    }

    #[test]
    fn test_complete_from_zero() {
        let mut normalizer = ProgressNormalizer::new(None);
        assert_eq!(normalizer.complete(), 100);
    }

    #[test]
    fn test_time_derived_wins_over_conflicting_ratio_at_same_instant() {
        // The runtime contract orders clock signals before ratio signals for
        // a given instant; the conflicting lower ratio is then dropped by
        // monotonicity.
        let mut normalizer = ProgressNormalizer::new(Some(100.0));
        let clock = normalizer.observe(&ProgressSignal::Clock {
            value: 50.0,
            unit: ClockUnit::Seconds,
        });
        assert_eq!(clock, Some(50));
        assert_eq!(normalizer.observe(&ProgressSignal::Ratio(0.4)), None);
        assert_eq!(normalizer.last_percent(), 50);
    }
}
