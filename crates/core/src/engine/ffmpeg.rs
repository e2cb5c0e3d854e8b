//! FFmpeg-based engine runtime.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::EngineRuntime;
use super::types::{EngineEvent, EngineOutput, EngineRequest};
use crate::progress::signal_from_progress_line;

/// How many trailing engine log lines are kept for the failure diagnostic.
const DIAGNOSTIC_TAIL_LINES: usize = 40;

/// Engine runtime that shells out to ffmpeg.
///
/// Each run stages its input in a private sub-directory of the scratch dir,
/// encodes to MP4 (H.264/AAC), and streams the process's stderr back as
/// events: free-text lines as logs, `-progress pipe:2` keys as typed
/// progress signals.
pub struct FfmpegRuntime {
    config: EngineConfig,
}

impl FfmpegRuntime {
    /// Creates a new ffmpeg runtime with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Builds the ffmpeg argument list for one run.
    fn build_args(
        &self,
        input_path: &Path,
        output_path: &Path,
        request: &EngineRequest,
    ) -> Vec<String> {
        let preset = &request.preset;
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            preset.speed_tier.x264_preset().to_string(),
            "-b:v".to_string(),
            format!("{}k", preset.video_bitrate_kbps),
            "-maxrate".to_string(),
            format!("{}k", preset.max_bitrate_kbps),
            "-bufsize".to_string(),
            format!("{}k", preset.buffer_size_kbps),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.config.audio_bitrate_kbps),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];

        args.extend(self.config.extra_args.iter().cloned());
        args.push(output_path.to_string_lossy().to_string());
        args
    }

    /// Staging extension for the input file, taken from the submitted name.
    fn input_extension(input_name: &str) -> &str {
        Path::new(input_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("webm")
    }
}

#[async_trait]
impl EngineRuntime for FfmpegRuntime {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn start(&self) -> Result<(), EngineError> {
        // Both binaries must answer before the session is declared ready.
        for binary in [&self.config.ffmpeg_path, &self.config.ffprobe_path] {
            let result = Command::new(binary)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;

            match result {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    return Err(EngineError::load(format!(
                        "{} -version exited with {:?}",
                        binary.display(),
                        status.code()
                    )))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(EngineError::load(format!(
                        "binary not found: {}",
                        binary.display()
                    )))
                }
                Err(e) => return Err(EngineError::Io(e)),
            }
        }

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        Ok(())
    }

    async fn execute(
        &self,
        request: EngineRequest,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<EngineOutput, EngineError> {
        let run_dir = self.config.scratch_dir.join(format!("run-{}", request.job_id));
        tokio::fs::create_dir_all(&run_dir).await?;

        let input_path = run_dir.join(format!(
            "input.{}",
            Self::input_extension(&request.input_name)
        ));
        let output_path = run_dir.join("output.mp4");
        tokio::fs::write(&input_path, &request.input).await?;

        let args = self.build_args(&input_path, &output_path, &request);
        debug!(job = %request.job_id, "spawning ffmpeg");

        let spawn_result = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawn_result {
            Ok(child) => child,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&run_dir).await;
                return Err(if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::load(format!(
                        "binary not found: {}",
                        self.config.ffmpeg_path.display()
                    ))
                } else {
                    EngineError::Io(e)
                });
            }
        };

        let stderr = child.stderr.take().expect("stderr should be captured");
        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);

        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(signal) = signal_from_progress_line(&line) {
                // Machine-readable progress keys become typed signals and do
                // not clutter the log stream.
                let _ = events.send(EngineEvent::Progress(signal)).await;
                continue;
            }

            if tail.len() == DIAGNOSTIC_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());
            let _ = events.send(EngineEvent::Log(line)).await;
        }

        let status = child.wait().await?;
        if !status.success() {
            let _ = tokio::fs::remove_dir_all(&run_dir).await;
            let diagnostic = if tail.is_empty() {
                format!("ffmpeg exited with code {:?}", status.code())
            } else {
                tail.make_contiguous().join("\n")
            };
            return Err(EngineError::runtime(diagnostic));
        }

        let data = tokio::fs::read(&output_path).await?;
        let _ = tokio::fs::remove_dir_all(&run_dir).await;

        if data.is_empty() {
            return Err(EngineError::runtime("engine produced an empty output file"));
        }

        Ok(EngineOutput {
            data: data.into(),
            content_type: "video/mp4",
        })
    }
}
