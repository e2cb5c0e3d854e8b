//! The codec engine and its gateway.
//!
//! The engine itself is opaque: the rest of the system consumes it through
//! the narrow [`EngineRuntime`] trait (submit one run, receive events) and
//! the [`EngineGateway`], which owns the process-wide session lifecycle:
//! readiness gating on the isolation precondition, bounded initialization,
//! and strict one-run-at-a-time serialization.
//!
//! # Example
//!
//! ```ignore
//! use reelsmith_core::engine::{EngineConfig, EngineGateway, FfmpegRuntime, ScratchDirIsolation};
//!
//! let config = EngineConfig::default();
//! let gateway = EngineGateway::new(
//!     Arc::new(FfmpegRuntime::new(config.clone())),
//!     Arc::new(ScratchDirIsolation::new(config.scratch_dir.clone())),
//!     config,
//! );
//!
//! gateway.initialize(Arc::new(|line| println!("{line}"))).await?;
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! let output = gateway.run(request, tx).await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod gateway;
mod isolation;
mod traits;
mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::FfmpegRuntime;
pub use gateway::{EngineGateway, EngineLogSink};
pub use isolation::{IsolationProbe, ScratchDirIsolation};
pub use traits::EngineRuntime;
pub use types::{EngineEvent, EngineOutput, EngineRequest, SessionPhase};
