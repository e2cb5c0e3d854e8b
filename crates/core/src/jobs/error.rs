//! Error types for the job queue.

use thiserror::Error;

use crate::engine::EngineError;

/// Errors surfaced by queue operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// A conversion was requested while another job is converting.
    #[error("a conversion is already running")]
    AlreadyRunning,

    /// The referenced job does not exist.
    #[error("job not found: {0}")]
    NotFound(String),

    /// Removal was requested for a job whose run is active.
    #[error("job {0} is converting and cannot be removed")]
    RemoveWhileConverting(String),

    /// Engine-level failure that blocks conversion globally.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}
