//! Quality presets for video conversion.
//!
//! A preset maps a user-facing quality level to the concrete rate-control
//! parameters handed to the codec engine. The mapping is pure and immutable;
//! the queue resolves the globally selected level at the moment a run starts,
//! so changing the selection never affects a job that is already converting.

use serde::{Deserialize, Serialize};

/// User-facing quality selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    /// Highest quality, slowest encode.
    High,
    /// Balanced quality and speed.
    Medium,
    /// Smallest output, fastest encode.
    Low,
}

impl Default for QualityLevel {
    fn default() -> Self {
        Self::High
    }
}

impl QualityLevel {
    /// Parse a textual tag. Unknown tags fail closed to the highest quality
    /// rather than silently degrading the output.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" | "mid" => Self::Medium,
            "low" => Self::Low,
            _ => Self::High,
        }
    }

    /// Returns the level as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encoder speed/quality trade-off tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedTier {
    /// Spend encode time for quality.
    Slow,
    /// Encoder default trade-off.
    Medium,
    /// Favor throughput over quality.
    Veryfast,
}

impl SpeedTier {
    /// Returns the x264 preset name for this tier.
    pub fn x264_preset(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Medium => "medium",
            Self::Veryfast => "veryfast",
        }
    }
}

/// Concrete encoding parameters resolved from a quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPreset {
    /// Target video bitrate in kbps.
    pub video_bitrate_kbps: u32,
    /// Rate-control ceiling, 1.15x the target.
    pub max_bitrate_kbps: u32,
    /// Rate-control buffer size, 2x the target.
    pub buffer_size_kbps: u32,
    /// Encoder speed tier.
    pub speed_tier: SpeedTier,
}

/// Resolve a quality level to concrete encoding parameters.
pub fn resolve(level: QualityLevel) -> ResolvedPreset {
    let (bitrate, tier) = match level {
        QualityLevel::High => (8000, SpeedTier::Slow),
        QualityLevel::Medium => (4500, SpeedTier::Medium),
        QualityLevel::Low => (2500, SpeedTier::Veryfast),
    };

    ResolvedPreset {
        video_bitrate_kbps: bitrate,
        max_bitrate_kbps: bitrate * 115 / 100,
        buffer_size_kbps: bitrate * 2,
        speed_tier: tier,
    }
}
