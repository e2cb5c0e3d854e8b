//! Progress signal types and log-line scraping.
//!
//! All knowledge about the engine's textual output formats lives here, so
//! call sites consume typed signals instead of scraping text themselves.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Unit of an elapsed-time progress marker.
///
/// `Unknown` covers markers whose scale the engine does not state reliably:
/// ffmpeg's `out_time_ms` key has carried microseconds on some builds and
/// milliseconds on others, so the normalizer disambiguates against the known
/// duration instead of trusting the field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockUnit {
    Unknown,
    Seconds,
    Millis,
    Micros,
}

/// One transient progress indication observed during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressSignal {
    /// A ratio-style value: a fraction in [0, 1] or a percentage in (1, 100].
    Ratio(f64),
    /// An elapsed-time marker.
    Clock { value: f64, unit: ClockUnit },
    /// A frame counter.
    Frame(u64),
}

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duration:\s*(\d{2,}):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btime=(\d{2,}):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

static FRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bframe=\s*(\d+)").unwrap());

static OUT_TIME_MS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^out_time_ms=(\d+)").unwrap());

static PROGRESS_FRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^frame=(\d+)\s*$").unwrap());

/// Parse an `HH:MM:SS[.frac]` timestamp into seconds.
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let mut parts = text.splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn hms_to_secs(captures: &regex_lite::Captures<'_>) -> Option<f64> {
    let hours: f64 = captures.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = captures.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = captures.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Extract a media duration from a free-text engine log line, e.g.
/// `  Duration: 00:02:00.04, start: 0.000000, bitrate: 2540 kb/s`.
pub fn duration_from_log(line: &str) -> Option<f64> {
    DURATION_RE.captures(line).and_then(|c| hms_to_secs(&c))
}

/// Extract progress signals embedded in a free-text engine log line, e.g.
/// `frame=  120 fps= 30 q=28.0 size=    512KiB time=00:00:04.00 bitrate=...`.
pub fn signals_from_log(line: &str) -> Vec<ProgressSignal> {
    let mut signals = Vec::new();

    // Time-derived signals are reported before frame counters so that, at a
    // given instant, the preferred source reaches the normalizer first.
    if let Some(secs) = TIME_RE.captures(line).and_then(|c| hms_to_secs(&c)) {
        signals.push(ProgressSignal::Clock {
            value: secs,
            unit: ClockUnit::Seconds,
        });
    }

    if let Some(frame) = FRAME_RE
        .captures(line)
        .and_then(|c| c.get(1)?.as_str().parse::<u64>().ok())
    {
        signals.push(ProgressSignal::Frame(frame));
    }

    signals
}

/// Parse one line of the engine's machine-readable progress stream
/// (`-progress pipe:2` output: one `key=value` pair per line).
pub fn signal_from_progress_line(line: &str) -> Option<ProgressSignal> {
    if let Some(captures) = OUT_TIME_MS_RE.captures(line) {
        let value: f64 = captures.get(1)?.as_str().parse().ok()?;
        return Some(ProgressSignal::Clock {
            value,
            unit: ClockUnit::Unknown,
        });
    }

    if let Some(captures) = PROGRESS_FRAME_RE.captures(line) {
        let frame: u64 = captures.get(1)?.as_str().parse().ok()?;
        return Some(ProgressSignal::Frame(frame));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:10"), Some(10.0));
        assert_eq!(parse_timestamp("00:02:00.50"), Some(120.5));
        assert_eq!(parse_timestamp("01:00:00"), Some(3600.0));
        assert_eq!(parse_timestamp("10:30:05.25"), Some(37805.25));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("not a time"), None);
        assert_eq!(parse_timestamp("00:99:00"), None);
        assert_eq!(parse_timestamp("00:00:75"), None);
        assert_eq!(parse_timestamp("12:34"), None);
    }

    #[test]
    fn test_duration_from_log() {
        let line = "  Duration: 00:02:00.04, start: 0.000000, bitrate: 2540 kb/s";
        let duration = duration_from_log(line).unwrap();
        assert!((duration - 120.04).abs() < 0.001);
    }

    #[test]
    fn test_duration_from_unrelated_line() {
        assert_eq!(duration_from_log("Stream #0:0: Video: vp9"), None);
        assert_eq!(duration_from_log(""), None);
    }

    #[test]
    fn test_signals_from_stats_line() {
        let line =
            "frame=  120 fps= 30 q=28.0 size=     512KiB time=00:00:04.00 bitrate=1048.6kbits/s";
        let signals = signals_from_log(line);
        assert_eq!(signals.len(), 2);
        // Clock first: the time-derived source takes precedence at this instant.
        assert_eq!(
            signals[0],
            ProgressSignal::Clock {
                value: 4.0,
                unit: ClockUnit::Seconds
            }
        );
        assert_eq!(signals[1], ProgressSignal::Frame(120));
    }

    #[test]
    fn test_signals_from_log_without_progress() {
        assert!(signals_from_log("Press [q] to stop, [?] for help").is_empty());
    }

    #[test]
    fn test_signal_from_progress_line_out_time_ms() {
        let signal = signal_from_progress_line("out_time_ms=4000000").unwrap();
        assert_eq!(
            signal,
            ProgressSignal::Clock {
                value: 4_000_000.0,
                unit: ClockUnit::Unknown
            }
        );
    }

    #[test]
    fn test_signal_from_progress_line_frame() {
        assert_eq!(
            signal_from_progress_line("frame=42"),
            Some(ProgressSignal::Frame(42))
        );
    }

    #[test]
    fn test_signal_from_progress_line_ignores_other_keys() {
        assert_eq!(signal_from_progress_line("speed=1.5x"), None);
        assert_eq!(signal_from_progress_line("progress=continue"), None);
        // Stats lines are not progress-stream lines.
        assert_eq!(
            signal_from_progress_line("frame=  120 fps= 30 time=00:00:04.00"),
            None
        );
    }
}
