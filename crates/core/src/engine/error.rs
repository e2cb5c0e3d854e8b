//! Error types for the engine module.

use thiserror::Error;

/// Errors surfaced by the engine gateway and runtimes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The host environment cannot provide the isolation the engine
    /// requires. Terminal for the session; retrying without an environment
    /// change is pointless, which distinguishes this from a load failure.
    #[error("engine isolation precondition failed: {detail}")]
    SecurityPrecondition { detail: String },

    /// Bootstrapping the engine failed. Retryable by re-invoking
    /// initialization.
    #[error("engine load failed: {reason}")]
    Load { reason: String },

    /// Engine initialization exceeded the safety timeout.
    #[error("engine load timed out after {timeout_secs} seconds")]
    LoadTimeout { timeout_secs: u64 },

    /// A run was requested before the engine finished loading.
    #[error("engine is not ready")]
    NotReady,

    /// A run was requested while another run is in flight. The job queue is
    /// expected to prevent this; the gateway rejects it independently.
    #[error("engine is busy with another run")]
    Busy,

    /// The engine run exited abnormally. Carries the engine's own
    /// diagnostic text verbatim.
    #[error("engine run failed: {diagnostic}")]
    Runtime { diagnostic: String },

    /// I/O error while staging run files.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a load error.
    pub fn load(reason: impl Into<String>) -> Self {
        Self::Load {
            reason: reason.into(),
        }
    }

    /// Creates a runtime error carrying the engine diagnostic.
    pub fn runtime(diagnostic: impl Into<String>) -> Self {
        Self::Runtime {
            diagnostic: diagnostic.into(),
        }
    }

    /// Whether the session is permanently unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SecurityPrecondition { .. })
    }

    /// Whether re-invoking the failed operation can succeed without an
    /// environment change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Load { .. } | Self::LoadTimeout { .. } | Self::Io(_)
        )
    }
}
