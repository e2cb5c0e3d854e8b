//! Types for the engine module.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::presets::ResolvedPreset;
use crate::progress::ProgressSignal;

/// One conversion request handed to the engine. The engine is a pure
/// execution surface: all job bookkeeping stays in the queue.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Identifier of the job this run belongs to, used for scratch naming
    /// and diagnostics only.
    pub job_id: String,
    /// Original file name of the input, used to pick the staging extension.
    pub input_name: String,
    /// Raw input bytes.
    pub input: Bytes,
    /// Duration estimate in seconds, if known at dispatch time.
    pub known_duration_secs: Option<f64>,
    /// Encoding parameters resolved when the run started.
    pub preset: ResolvedPreset,
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Encoded bytes, tagged as a playable container.
    pub data: Bytes,
    /// MIME type of the output container.
    pub content_type: &'static str,
}

/// An event emitted by the engine during one active run.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A progress indication.
    Progress(ProgressSignal),
    /// A free-text log line.
    Log(String),
}

/// Lifecycle phase of the engine session.
///
/// The session is constructed once per process and never reloaded once
/// ready. A failed isolation check is terminal (`Fatal`); a failed load
/// returns to `Idle` and may be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Not yet loaded (or a previous load attempt failed).
    Idle,
    /// A load is in progress.
    Loading,
    /// Loaded and accepting runs.
    Ready,
    /// The isolation precondition failed; permanently unusable.
    Fatal { reason: String },
}

impl SessionPhase {
    /// Phase name for presentation and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Fatal { .. } => "fatal",
        }
    }

    /// Whether runs are accepted in this phase.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
