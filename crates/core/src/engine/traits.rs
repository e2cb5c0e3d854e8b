//! Trait definitions for the engine module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::EngineError;
use super::types::{EngineEvent, EngineOutput, EngineRequest};

/// The opaque codec engine behind the gateway.
///
/// Implementations perform the actual transcoding; they hold no job state
/// and know nothing about the queue. Progress and log lines are streamed
/// through the event channel for the duration of one `execute` call; the
/// channel belongs to exactly that run.
#[async_trait]
pub trait EngineRuntime: Send + Sync {
    /// Returns the name of this runtime implementation.
    fn name(&self) -> &str;

    /// Bootstrap the engine. Called once by the gateway; expensive work
    /// (binary validation, workspace setup) belongs here, not in `execute`.
    async fn start(&self) -> Result<(), EngineError>;

    /// Run one conversion to completion, emitting events along the way.
    ///
    /// If the event receiver is dropped, the run continues without
    /// reporting.
    async fn execute(
        &self,
        request: EngineRequest,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<EngineOutput, EngineError>;
}
