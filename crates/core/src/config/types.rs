use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::engine::EngineConfig;
use crate::presets::QualityLevel;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Conversion behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Quality level selected at startup; changeable at runtime through the
    /// queue.
    #[serde(default)]
    pub default_quality: QualityLevel,

    /// Target output frame rate, used to normalize frame-counter progress
    /// signals.
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            default_quality: QualityLevel::default(),
            target_fps: default_target_fps(),
        }
    }
}

fn default_target_fps() -> f64 {
    30.0
}
