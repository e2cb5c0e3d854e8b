//! Mock implementations and fixtures for testing.
//!
//! These mocks implement the seams the orchestrator is built against
//! (engine runtime, duration probe, isolation probe) with controllable
//! behavior, so queue and gateway semantics can be exercised without an
//! actual ffmpeg installation.

mod mock_engine;
mod mock_probe;

pub use mock_engine::{MockEngineRuntime, RecordedRun};
pub use mock_probe::MockDurationProbe;

use bytes::Bytes;

use crate::engine::IsolationProbe;
use crate::jobs::SourceFile;

/// Isolation probe with a fixed verdict.
pub struct FixedIsolation {
    isolated: bool,
}

impl FixedIsolation {
    /// Create a probe that always reports the given verdict.
    pub fn new(isolated: bool) -> Self {
        Self { isolated }
    }
}

impl IsolationProbe for FixedIsolation {
    fn verify(&self) -> Result<(), String> {
        if self.isolated {
            Ok(())
        } else {
            Err("host environment does not provide engine isolation".to_string())
        }
    }
}

/// Fixtures for building test inputs.
pub mod fixtures {
    use super::*;

    /// Build a source file with deterministic identity components.
    pub fn source_file(name: &str, size_hint: usize, modified_ms: i64) -> SourceFile {
        let data = vec![0xAB; size_hint];
        SourceFile {
            name: name.to_string(),
            size_bytes: data.len() as u64,
            modified_ms,
            content_type: "video/webm".to_string(),
            data: Bytes::from(data),
        }
    }
}
