//! Mock engine runtime for testing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use crate::engine::{EngineError, EngineEvent, EngineOutput, EngineRequest, EngineRuntime};
use crate::presets::ResolvedPreset;

/// A recorded run for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRun {
    /// Job id of the run.
    pub job_id: String,
    /// Input length in bytes.
    pub input_len: usize,
    /// Duration estimate the run was dispatched with.
    pub known_duration_secs: Option<f64>,
    /// Preset resolved when the run started.
    pub preset: ResolvedPreset,
}

/// Mock implementation of the EngineRuntime trait.
///
/// Provides controllable behavior for testing:
/// - Track runs for assertions
/// - Simulate bootstrap and run failures
/// - Script progress/log events emitted during runs
/// - Observe concurrency (the gateway must never overlap runs)
///
/// # Example
///
/// ```rust,ignore
/// use reelsmith_core::testing::MockEngineRuntime;
///
/// let runtime = Arc::new(MockEngineRuntime::new());
/// runtime.fail_job("job-a", "simulated encoder crash").await;
///
/// // ... drive the queue ...
///
/// let runs = runtime.recorded_runs().await;
/// assert_eq!(runs.len(), 2);
/// assert_eq!(runtime.max_observed_concurrency(), 1);
/// ```
pub struct MockEngineRuntime {
    /// If set, the next start() call fails with this error.
    start_error: RwLock<Option<EngineError>>,
    /// Delay injected into start(), to exercise the load timeout.
    start_delay_ms: RwLock<u64>,
    /// Number of successful start() calls.
    start_count: AtomicUsize,
    /// Job ids whose runs fail, with the diagnostic to report.
    failing_jobs: RwLock<HashSet<String>>,
    /// Diagnostic used for failing jobs.
    failure_diagnostic: RwLock<String>,
    /// Events emitted during each run, in order.
    scripted_events: RwLock<Vec<EngineEvent>>,
    /// Delay injected into each run.
    run_delay_ms: RwLock<u64>,
    /// Output bytes returned by successful runs.
    output: RwLock<Bytes>,
    /// Recorded runs.
    recorded: RwLock<Vec<RecordedRun>>,
    /// Currently executing runs.
    active_runs: AtomicUsize,
    /// Highest overlap ever observed; must stay at 1 under the gateway.
    max_concurrency: AtomicUsize,
}

impl Default for MockEngineRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngineRuntime {
    /// Create a new mock runtime.
    pub fn new() -> Self {
        Self {
            start_error: RwLock::new(None),
            start_delay_ms: RwLock::new(0),
            start_count: AtomicUsize::new(0),
            failing_jobs: RwLock::new(HashSet::new()),
            failure_diagnostic: RwLock::new("simulated engine failure".to_string()),
            scripted_events: RwLock::new(Vec::new()),
            run_delay_ms: RwLock::new(0),
            output: RwLock::new(Bytes::from_static(b"mock-mp4-output")),
            recorded: RwLock::new(Vec::new()),
            active_runs: AtomicUsize::new(0),
            max_concurrency: AtomicUsize::new(0),
        }
    }

    /// Configure the next start() call to fail. The error is consumed.
    pub async fn set_start_error(&self, error: EngineError) {
        *self.start_error.write().await = Some(error);
    }

    /// Inject a delay into start().
    pub async fn set_start_delay_ms(&self, delay_ms: u64) {
        *self.start_delay_ms.write().await = delay_ms;
    }

    /// Number of successful start() calls.
    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    /// Make runs for the given job id fail.
    pub async fn fail_job(&self, job_id: &str, diagnostic: &str) {
        self.failing_jobs.write().await.insert(job_id.to_string());
        *self.failure_diagnostic.write().await = diagnostic.to_string();
    }

    /// Script the events emitted during each run.
    pub async fn set_scripted_events(&self, events: Vec<EngineEvent>) {
        *self.scripted_events.write().await = events;
    }

    /// Inject a delay into each run.
    pub async fn set_run_delay_ms(&self, delay_ms: u64) {
        *self.run_delay_ms.write().await = delay_ms;
    }

    /// Set the output bytes returned by successful runs.
    pub async fn set_output(&self, output: Bytes) {
        *self.output.write().await = output;
    }

    /// All recorded runs, in execution order.
    pub async fn recorded_runs(&self) -> Vec<RecordedRun> {
        self.recorded.read().await.clone()
    }

    /// Number of runs executed.
    pub async fn run_count(&self) -> usize {
        self.recorded.read().await.len()
    }

    /// The highest number of overlapping runs ever observed.
    pub fn max_observed_concurrency(&self) -> usize {
        self.max_concurrency.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineRuntime for MockEngineRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self) -> Result<(), EngineError> {
        let delay = *self.start_delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Some(error) = self.start_error.write().await.take() {
            return Err(error);
        }

        self.start_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn execute(
        &self,
        request: EngineRequest,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<EngineOutput, EngineError> {
        let active = self.active_runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrency.fetch_max(active, Ordering::SeqCst);

        let result = self.execute_inner(&request, events).await;

        self.active_runs.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MockEngineRuntime {
    async fn execute_inner(
        &self,
        request: &EngineRequest,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<EngineOutput, EngineError> {
        for event in self.scripted_events.read().await.iter() {
            let _ = events.send(event.clone()).await;
        }

        let delay = *self.run_delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.recorded.write().await.push(RecordedRun {
            job_id: request.job_id.clone(),
            input_len: request.input.len(),
            known_duration_secs: request.known_duration_secs,
            preset: request.preset,
        });

        if self.failing_jobs.read().await.contains(&request.job_id) {
            return Err(EngineError::runtime(
                self.failure_diagnostic.read().await.clone(),
            ));
        }

        Ok(EngineOutput {
            data: self.output.read().await.clone(),
            content_type: "video/mp4",
        })
    }
}
