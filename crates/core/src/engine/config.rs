//! Configuration for the codec engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the ffmpeg-backed engine runtime and its gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to the ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Private scratch directory for per-run working files. The isolation
    /// probe requires this directory to be exclusively owned.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Safety timeout bounding engine initialization. Conversions themselves
    /// are unbounded; their progress is observable.
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,

    /// Engine log level (quiet, panic, fatal, error, warning, info, verbose,
    /// debug, trace). Duration discovery needs at least `info`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Audio bitrate for the encoded track in kbps.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Whether the isolation precondition is enforced. Disabling this is
    /// only meant for constrained development environments.
    #[serde(default = "default_require_isolation")]
    pub require_isolation: bool,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("reelsmith-engine")
}

fn default_load_timeout() -> u64 {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_audio_bitrate() -> u32 {
    128
}

fn default_require_isolation() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            scratch_dir: default_scratch_dir(),
            load_timeout_secs: default_load_timeout(),
            log_level: default_log_level(),
            audio_bitrate_kbps: default_audio_bitrate(),
            extra_args: Vec::new(),
            require_isolation: default_require_isolation(),
        }
    }
}

impl EngineConfig {
    /// Creates a config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, scratch_dir: PathBuf) -> Self {
        self.scratch_dir = scratch_dir;
        self
    }

    /// Sets the load timeout in seconds.
    pub fn with_load_timeout(mut self, load_timeout_secs: u64) -> Self {
        self.load_timeout_secs = load_timeout_secs;
        self
    }
}
