//! The job queue and state machine.
//!
//! Holds the ordered set of submitted files and drives them through the
//! engine gateway, strictly one run at a time. Submission, removal and
//! preset changes stay synchronous against the job table and never block on
//! an in-flight run; they are reflected the next time a run is dispatched.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use super::error::JobError;
use super::types::{Job, JobId, JobSnapshot, JobState, SourceFile};
use crate::config::ConversionConfig;
use crate::engine::{EngineError, EngineEvent, EngineGateway, EngineRequest};
use crate::metrics;
use crate::presets::{resolve, QualityLevel};
use crate::probe::DurationProbe;
use crate::progress::ProgressNormalizer;
use crate::resources::HandleStore;

/// A change notification emitted by the queue.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A job was created or its state/progress changed.
    Updated(JobSnapshot),
    /// A job was removed.
    Removed(JobId),
}

/// Callback invoked on every queue event, e.g. to push WebSocket updates.
pub type QueueEventCallback = Arc<dyn Fn(QueueEvent) + Send + Sync>;

struct QueueInner {
    gateway: Arc<EngineGateway>,
    handles: Arc<HandleStore>,
    probe: Arc<dyn DurationProbe>,
    conversion: ConversionConfig,
    jobs: RwLock<Vec<Job>>,
    quality: RwLock<QualityLevel>,
    /// Owned by exactly one run or batch at a time. `try_lock` failure is
    /// the queue-level already-running rejection; the gateway's own busy
    /// guard backs it up.
    run_gate: Arc<Mutex<()>>,
    callback: RwLock<Option<QueueEventCallback>>,
}

/// The batch transcoding orchestrator.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    /// Create a queue around an engine gateway, a handle store and a
    /// duration probe.
    pub fn new(
        gateway: Arc<EngineGateway>,
        handles: Arc<HandleStore>,
        probe: Arc<dyn DurationProbe>,
        conversion: ConversionConfig,
    ) -> Self {
        let quality = conversion.default_quality;
        Self {
            inner: Arc::new(QueueInner {
                gateway,
                handles,
                probe,
                conversion,
                jobs: RwLock::new(Vec::new()),
                quality: RwLock::new(quality),
                run_gate: Arc::new(Mutex::new(())),
                callback: RwLock::new(None),
            }),
        }
    }

    /// Install the event callback. Replaces any previous callback.
    pub async fn set_event_callback(&self, callback: QueueEventCallback) {
        *self.inner.callback.write().await = Some(callback);
    }

    /// Submit files. Duplicates (same name, size and modification time) are
    /// silently dropped; existing jobs are never mutated or restarted by a
    /// re-submission. Returns snapshots of the newly created jobs.
    pub async fn add_files(&self, files: Vec<SourceFile>) -> Vec<JobSnapshot> {
        let mut created = Vec::new();
        let mut probe_targets = Vec::new();

        {
            let mut jobs = self.inner.jobs.write().await;
            for file in files {
                let id = file.identity();
                if jobs.iter().any(|j| j.id == id) {
                    debug!(job = %id, name = %file.name, "duplicate submission dropped");
                    metrics::DUPLICATES_DROPPED.inc();
                    continue;
                }

                let input_handle = self
                    .inner
                    .handles
                    .create_input(file.name.clone(), file.content_type.clone(), file.data.clone())
                    .await;
                let job = Job::new(&file, input_handle);
                info!(job = %job.id, name = %job.display_name, size = job.size_bytes, "job created");
                metrics::JOBS_SUBMITTED.inc();
                created.push(job.snapshot());
                probe_targets.push((job.id.clone(), file.name, file.data));
                jobs.push(job);
            }
        }

        for snapshot in &created {
            self.inner.notify(QueueEvent::Updated(snapshot.clone())).await;
        }

        // Duration probing is best-effort and races freely with runs.
        for (id, name, data) in probe_targets {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                if let Some(duration) = inner.probe.probe_duration(&name, &data).await {
                    let snapshot = {
                        let mut jobs = inner.jobs.write().await;
                        jobs.iter_mut().find(|j| j.id == id).map(|job| {
                            if job.duration_secs.is_none() {
                                job.duration_secs = Some(duration);
                                job.touch();
                            }
                            job.snapshot()
                        })
                    };
                    if let Some(snapshot) = snapshot {
                        inner.notify(QueueEvent::Updated(snapshot)).await;
                    }
                }
            });
        }

        created
    }

    /// Read-only snapshot of all jobs in submission order.
    pub async fn snapshot(&self) -> Vec<JobSnapshot> {
        self.inner.jobs.read().await.iter().map(Job::snapshot).collect()
    }

    /// Read-only snapshot of one job.
    pub async fn job(&self, id: &JobId) -> Option<JobSnapshot> {
        self.inner
            .jobs
            .read()
            .await
            .iter()
            .find(|j| &j.id == id)
            .map(Job::snapshot)
    }

    /// The input handle of a job, for preview.
    pub async fn input_handle(&self, id: &JobId) -> Option<crate::resources::HandleId> {
        self.inner
            .jobs
            .read()
            .await
            .iter()
            .find(|j| &j.id == id)
            .map(|j| j.input_handle.clone())
    }

    /// The output handle of a job, present only when it is completed.
    pub async fn output_handle(&self, id: &JobId) -> Option<crate::resources::HandleId> {
        self.inner
            .jobs
            .read()
            .await
            .iter()
            .find(|j| &j.id == id)
            .and_then(|j| j.output_handle.clone())
    }

    /// Change the global quality selection. Not retroactive: a job already
    /// converting keeps the preset resolved when its run started.
    pub async fn set_quality(&self, level: QualityLevel) {
        *self.inner.quality.write().await = level;
        info!(quality = %level, "quality selection changed");
    }

    /// The current global quality selection.
    pub async fn quality(&self) -> QualityLevel {
        *self.inner.quality.read().await
    }

    /// Convert one job and wait for its terminal state.
    ///
    /// Rejected with [`JobError::AlreadyRunning`] if any job is converting.
    /// An engine runtime failure is contained in the job's own state; the
    /// returned snapshot carries it.
    pub async fn convert(&self, id: &JobId) -> Result<JobSnapshot, JobError> {
        let guard = self.acquire_run_slot()?;
        self.ensure_engine_ready().await?;
        self.ensure_exists(id).await?;

        QueueInner::run_batch(Arc::clone(&self.inner), guard, vec![id.clone()]).await;
        self.job(id)
            .await
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Convert one job in the background. Validation (existence, engine
    /// readiness, single-flight) happens before this returns.
    pub async fn spawn_convert(&self, id: &JobId) -> Result<(), JobError> {
        let guard = self.acquire_run_slot()?;
        self.ensure_engine_ready().await?;
        self.ensure_exists(id).await?;

        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        tokio::spawn(async move {
            QueueInner::run_batch(inner, guard, vec![id]).await;
        });
        Ok(())
    }

    /// Convert every non-completed job, strictly sequentially in submission
    /// order, waiting for the batch to finish. The run set is computed now;
    /// jobs added while the batch is in progress are not included. One
    /// job's failure does not halt the batch.
    pub async fn convert_all(&self) -> Result<usize, JobError> {
        let guard = self.acquire_run_slot()?;
        self.ensure_engine_ready().await?;

        let ids = self.inner.mark_queued().await;
        let count = ids.len();
        QueueInner::run_batch(Arc::clone(&self.inner), guard, ids).await;
        Ok(count)
    }

    /// Convert every non-completed job in the background. Returns the size
    /// of the captured run set.
    pub async fn spawn_convert_all(&self) -> Result<usize, JobError> {
        let guard = self.acquire_run_slot()?;
        self.ensure_engine_ready().await?;

        let ids = self.inner.mark_queued().await;
        let count = ids.len();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            QueueInner::run_batch(inner, guard, ids).await;
        });
        Ok(count)
    }

    /// Remove a job and release its handles. Rejected while the job is
    /// converting; the engine still references its buffers.
    pub async fn remove(&self, id: &JobId) -> Result<(), JobError> {
        let (input_handle, output_handle) = {
            let mut jobs = self.inner.jobs.write().await;
            let idx = jobs
                .iter()
                .position(|j| &j.id == id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            if !jobs[idx].state.is_removable() {
                return Err(JobError::RemoveWhileConverting(id.to_string()));
            }
            let job = jobs.remove(idx);
            (job.input_handle, job.output_handle)
        };

        self.inner.handles.revoke(&input_handle).await;
        if let Some(handle) = output_handle {
            self.inner.handles.revoke(&handle).await;
        }
        info!(job = %id, "job removed");
        self.inner.notify(QueueEvent::Removed(id.clone())).await;
        Ok(())
    }

    /// Remove every job. Rejected if any job is converting.
    pub async fn clear(&self) -> Result<usize, JobError> {
        let removed: Vec<Job> = {
            let mut jobs = self.inner.jobs.write().await;
            if let Some(converting) = jobs.iter().find(|j| j.state == JobState::Converting) {
                return Err(JobError::RemoveWhileConverting(converting.id.to_string()));
            }
            jobs.drain(..).collect()
        };

        let count = removed.len();
        for job in removed {
            self.inner.handles.revoke(&job.input_handle).await;
            if let Some(handle) = job.output_handle {
                self.inner.handles.revoke(&handle).await;
            }
            self.inner.notify(QueueEvent::Removed(job.id)).await;
        }
        if count > 0 {
            info!(count, "queue cleared");
        }
        Ok(count)
    }

    fn acquire_run_slot(&self) -> Result<OwnedMutexGuard<()>, JobError> {
        Arc::clone(&self.inner.run_gate)
            .try_lock_owned()
            .map_err(|_| JobError::AlreadyRunning)
    }

    async fn ensure_engine_ready(&self) -> Result<(), JobError> {
        if self.inner.gateway.is_ready().await {
            Ok(())
        } else {
            Err(EngineError::NotReady.into())
        }
    }

    async fn ensure_exists(&self, id: &JobId) -> Result<(), JobError> {
        if self.inner.jobs.read().await.iter().any(|j| &j.id == id) {
            Ok(())
        } else {
            Err(JobError::NotFound(id.to_string()))
        }
    }
}

impl QueueInner {
    async fn notify(&self, event: QueueEvent) {
        let callback = self.callback.read().await.clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    /// Mark every non-completed job as queued and return their ids in
    /// submission order. This is the visible "will run soon" state.
    async fn mark_queued(&self) -> Vec<JobId> {
        let mut queued = Vec::new();
        let snapshots: Vec<JobSnapshot> = {
            let mut jobs = self.jobs.write().await;
            jobs.iter_mut()
                .filter(|job| job.state != JobState::Completed)
                .map(|job| {
                    job.set_state(JobState::Queued);
                    queued.push(job.id.clone());
                    job.snapshot()
                })
                .collect()
        };
        for snapshot in snapshots {
            self.notify(QueueEvent::Updated(snapshot)).await;
        }
        queued
    }

    /// Run the captured set of jobs sequentially. The run-gate guard is
    /// held until every job in the set has reached a terminal state.
    async fn run_batch(inner: Arc<Self>, _guard: OwnedMutexGuard<()>, ids: Vec<JobId>) {
        for id in ids {
            Self::run_one(&inner, &id).await;
        }
    }

    /// Execute one job's run. A job removed after the batch was captured is
    /// skipped; an engine failure is contained in the job's state.
    async fn run_one(inner: &Arc<Self>, id: &JobId) {
        let preset = resolve(*inner.quality.read().await);

        // Transition to Converting: reset progress, clear the prior error
        // and detach the superseded output before the new run starts.
        let (snapshot, input_handle, stale_output, duration, display_name) = {
            let mut jobs = inner.jobs.write().await;
            let Some(job) = jobs.iter_mut().find(|j| &j.id == id) else {
                debug!(job = %id, "job removed before its run; skipping");
                return;
            };
            let stale_output = job.output_handle.take();
            job.begin_run();
            (
                job.snapshot(),
                job.input_handle.clone(),
                stale_output,
                job.duration_secs,
                job.display_name.clone(),
            )
        };

        if let Some(handle) = stale_output {
            inner.handles.revoke(&handle).await;
        }
        inner.notify(QueueEvent::Updated(snapshot)).await;
        info!(job = %id, name = %display_name, "conversion started");

        let Some(input) = inner.handles.get(&input_handle).await else {
            // The input handle should outlive the job; treat its absence as
            // a contained failure rather than poisoning the batch.
            warn!(job = %id, "input handle missing at run start");
            inner.finish_with_error(id, "input buffer is no longer available")
                .await;
            return;
        };

        let request = EngineRequest {
            job_id: id.to_string(),
            input_name: display_name,
            input: input.data,
            known_duration_secs: duration,
            preset,
        };

        let (events_tx, events_rx) = tokio::sync::mpsc::channel::<EngineEvent>(64);
        let consumer = Self::spawn_progress_consumer(inner, id.clone(), duration, events_rx);

        let started = Instant::now();
        let result = inner.gateway.run(request, events_tx).await;
        let _ = consumer.await;
        metrics::CONVERSION_DURATION.observe(started.elapsed().as_secs_f64());

        match result {
            Ok(output) => {
                let output_name = {
                    let jobs = inner.jobs.read().await;
                    jobs.iter()
                        .find(|j| &j.id == id)
                        .map(|j| j.output_file_name())
                        .unwrap_or_else(|| "converted_output.mp4".to_string())
                };
                let handle = inner
                    .handles
                    .create_output(output_name, output.content_type, output.data)
                    .await;

                let snapshot = {
                    let mut jobs = inner.jobs.write().await;
                    jobs.iter_mut().find(|j| &j.id == id).map(|job| {
                        job.complete(handle.clone());
                        job.snapshot()
                    })
                };
                metrics::CONVERSIONS_TOTAL.with_label_values(&["success"]).inc();
                info!(job = %id, "conversion completed");
                if let Some(snapshot) = snapshot {
                    inner.notify(QueueEvent::Updated(snapshot)).await;
                }
            }
            Err(e) => {
                warn!(job = %id, error = %e, "conversion failed");
                inner.finish_with_error(id, e.to_string()).await;
            }
        }
    }

    /// Consume the run's event stream through a fresh normalizer, updating
    /// the job's percentage on every strict increase.
    fn spawn_progress_consumer(
        inner: &Arc<Self>,
        id: JobId,
        known_duration: Option<f64>,
        mut events: tokio::sync::mpsc::Receiver<EngineEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(inner);
        let target_fps = inner.conversion.target_fps;
        tokio::spawn(async move {
            let mut normalizer =
                ProgressNormalizer::new(known_duration).with_target_fps(target_fps);

            while let Some(event) = events.recv().await {
                let emitted = match event {
                    EngineEvent::Progress(signal) => normalizer.observe(&signal),
                    EngineEvent::Log(line) => normalizer.observe_log(&line),
                };

                if let Some(percent) = emitted {
                    let snapshot = {
                        let mut jobs = inner.jobs.write().await;
                        jobs.iter_mut().find(|j| j.id == id).map(|job| {
                            job.progress_pct = percent;
                            if job.duration_secs.is_none() {
                                job.duration_secs = normalizer.duration_secs();
                            }
                            job.touch();
                            job.snapshot()
                        })
                    };
                    if let Some(snapshot) = snapshot {
                        inner.notify(QueueEvent::Updated(snapshot)).await;
                    }
                }
            }
        })
    }

    async fn finish_with_error(&self, id: &JobId, message: impl Into<String>) {
        let snapshot = {
            let mut jobs = self.jobs.write().await;
            jobs.iter_mut().find(|j| &j.id == id).map(|job| {
                job.fail(message);
                job.snapshot()
            })
        };
        metrics::CONVERSIONS_TOTAL.with_label_values(&["failed"]).inc();
        if let Some(snapshot) = snapshot {
            self.notify(QueueEvent::Updated(snapshot)).await;
        }
    }
}

// Integration-style coverage for the queue lives in `tests/queue_lifecycle.rs`;
// the unit tests here pin the pure pieces of the scheduling contract.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::ResolvedPreset;

    #[test]
    fn test_resolved_preset_is_copied_per_run() {
        // ResolvedPreset is Copy: a preset captured at run start cannot be
        // mutated by a later selection change.
        fn assert_copy<T: Copy>() {}
        assert_copy::<ResolvedPreset>();
    }

    #[test]
    fn test_queue_event_clone() {
        let event = QueueEvent::Removed(JobId::from("abc"));
        match event.clone() {
            QueueEvent::Removed(id) => assert_eq!(id.as_str(), "abc"),
            _ => panic!("wrong variant"),
        }
    }
}
