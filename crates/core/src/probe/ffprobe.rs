//! FFprobe-based duration probe.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::traits::DurationProbe;
use crate::metrics;

/// Probes media duration by staging the bytes to a scratch file and asking
/// ffprobe for the container format metadata.
pub struct FfprobeDurationProbe {
    ffprobe_path: PathBuf,
    scratch_dir: PathBuf,
}

impl FfprobeDurationProbe {
    /// Creates a probe using the given ffprobe binary and scratch directory.
    pub fn new(ffprobe_path: PathBuf, scratch_dir: PathBuf) -> Self {
        Self {
            ffprobe_path,
            scratch_dir,
        }
    }

    /// Parses ffprobe JSON output into a duration in seconds.
    fn parse_duration(output: &str) -> Option<f64> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output).ok()?;
        probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0)
    }

    async fn probe_inner(&self, file_name: &str, data: &[u8]) -> Option<f64> {
        let staged = self
            .scratch_dir
            .join(format!("probe-{}.bin", Uuid::new_v4()));

        tokio::fs::create_dir_all(&self.scratch_dir).await.ok()?;
        tokio::fs::write(&staged, data).await.ok()?;

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(&staged)
            .stdin(Stdio::null())
            .output()
            .await;

        let _ = tokio::fs::remove_file(&staged).await;

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                Self::parse_duration(&stdout)
            }
            Ok(output) => {
                debug!(
                    file = file_name,
                    code = ?output.status.code(),
                    "ffprobe exited abnormally"
                );
                None
            }
            Err(e) => {
                debug!(file = file_name, error = %e, "ffprobe invocation failed");
                None
            }
        }
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe_duration(&self, file_name: &str, data: &[u8]) -> Option<f64> {
        let result = self.probe_inner(file_name, data).await;
        let label = if result.is_some() { "found" } else { "unknown" };
        metrics::PROBE_RESULTS.with_label_values(&[label]).inc();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = r#"{
            "format": {
                "filename": "probe-x.bin",
                "format_name": "matroska,webm",
                "duration": "120.500000",
                "size": "1048576"
            }
        }"#;
        let duration = FfprobeDurationProbe::parse_duration(json).unwrap();
        assert!((duration - 120.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_duration_missing_field() {
        let json = r#"{"format": {"format_name": "webm"}}"#;
        assert_eq!(FfprobeDurationProbe::parse_duration(json), None);
    }

    #[test]
    fn test_parse_duration_rejects_non_positive() {
        let json = r#"{"format": {"duration": "0.0"}}"#;
        assert_eq!(FfprobeDurationProbe::parse_duration(json), None);
    }

    #[test]
    fn test_parse_duration_garbage() {
        assert_eq!(FfprobeDurationProbe::parse_duration("not json"), None);
        assert_eq!(
            FfprobeDurationProbe::parse_duration(r#"{"format":{"duration":"abc"}}"#),
            None
        );
    }
}
