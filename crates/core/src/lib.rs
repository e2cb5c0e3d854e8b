//! Reelsmith core: the batch transcoding orchestrator.
//!
//! Turns submitted video clips into MP4s through an opaque codec engine,
//! one run at a time, normalizing the engine's heterogeneous progress
//! signals into a monotonic percentage per job and managing every
//! externally visible byte buffer through revocable handles.

pub mod config;
pub mod engine;
pub mod jobs;
pub mod metrics;
pub mod presets;
pub mod probe;
pub mod progress;
pub mod resources;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ConversionConfig,
    ServerConfig,
};
pub use engine::{
    EngineConfig, EngineError, EngineEvent, EngineGateway, EngineLogSink, EngineRuntime,
    FfmpegRuntime, IsolationProbe, ScratchDirIsolation, SessionPhase,
};
pub use jobs::{
    JobError, JobId, JobQueue, JobSnapshot, JobState, QueueEvent, QueueEventCallback, SourceFile,
};
pub use presets::{QualityLevel, ResolvedPreset, SpeedTier};
pub use probe::{DurationProbe, FfprobeDurationProbe};
pub use progress::{ProgressNormalizer, ProgressSignal};
pub use resources::{HandleId, HandleStore, MediaHandle};
