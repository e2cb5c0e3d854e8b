//! Job queue lifecycle integration tests.
//!
//! These tests drive the full orchestrator against mock seams: submission
//! and dedupe, single-flight conversion, batch runs with contained
//! failures, removal rules, and handle lifecycle across re-runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use reelsmith_core::engine::{EngineConfig, EngineEvent, EngineGateway};
use reelsmith_core::jobs::{JobId, JobQueue, QueueEvent};
use reelsmith_core::progress::{ClockUnit, ProgressSignal};
use reelsmith_core::resources::HandleStore;
use reelsmith_core::testing::{fixtures, FixedIsolation, MockDurationProbe, MockEngineRuntime};
use reelsmith_core::{ConversionConfig, EngineError, JobError, QualityLevel};

/// Test helper bundling the queue and its mock collaborators.
struct TestHarness {
    queue: JobQueue,
    runtime: Arc<MockEngineRuntime>,
    handles: Arc<HandleStore>,
    probe: Arc<MockDurationProbe>,
    events: Arc<Mutex<Vec<QueueEvent>>>,
}

impl TestHarness {
    async fn new() -> Self {
        Self::build(true).await
    }

    async fn new_without_engine() -> Self {
        Self::build(false).await
    }

    async fn build(initialize_engine: bool) -> Self {
        let runtime = Arc::new(MockEngineRuntime::new());
        let gateway = Arc::new(EngineGateway::new(
            Arc::clone(&runtime) as Arc<dyn reelsmith_core::EngineRuntime>,
            Arc::new(FixedIsolation::new(true)),
            EngineConfig::default().with_load_timeout(2),
        ));

        if initialize_engine {
            gateway
                .initialize(Arc::new(|_line: &str| {}))
                .await
                .expect("engine should initialize");
        }

        let handles = Arc::new(HandleStore::new());
        let probe = Arc::new(MockDurationProbe::new());
        let queue = JobQueue::new(
            gateway,
            Arc::clone(&handles),
            Arc::clone(&probe) as Arc<dyn reelsmith_core::DurationProbe>,
            ConversionConfig::default(),
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        queue
            .set_event_callback(Arc::new(move |event| {
                sink.lock().unwrap().push(event);
            }))
            .await;

        Self {
            queue,
            runtime,
            handles,
            probe,
            events,
        }
    }

    async fn add_one(&self, name: &str) -> JobId {
        let created = self
            .queue
            .add_files(vec![fixtures::source_file(name, 64, 1)])
            .await;
        assert_eq!(created.len(), 1, "expected one job for {}", name);
        created[0].id.clone()
    }

    async fn wait_for_state(&self, id: &JobId, expected: &str, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if let Some(job) = self.queue.job(id).await {
                if job.state == expected {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn progress_updates_for(&self, id: &JobId) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                QueueEvent::Updated(snapshot) if &snapshot.id == id => {
                    Some(snapshot.progress_pct)
                }
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn test_duplicate_submission_yields_one_job() {
    let harness = TestHarness::new().await;

    let first = harness
        .queue
        .add_files(vec![fixtures::source_file("clip.webm", 64, 42)])
        .await;
    assert_eq!(first.len(), 1);

    // Same name, size and modification time: silently dropped, the existing
    // job is untouched.
    let second = harness
        .queue
        .add_files(vec![fixtures::source_file("clip.webm", 64, 42)])
        .await;
    assert!(second.is_empty());
    assert_eq!(harness.queue.snapshot().await.len(), 1);

    // A different modification time is a different identity.
    let third = harness
        .queue
        .add_files(vec![fixtures::source_file("clip.webm", 64, 43)])
        .await;
    assert_eq!(third.len(), 1);
    assert_eq!(harness.queue.snapshot().await.len(), 2);
}

#[tokio::test]
async fn test_convert_success_lifecycle() {
    let harness = TestHarness::new().await;
    let id = harness.add_one("clip.webm").await;

    let snapshot = harness.queue.convert(&id).await.unwrap();
    assert_eq!(snapshot.state, "completed");
    assert_eq!(snapshot.progress_pct, 100);
    assert!(snapshot.error.is_none());

    // The output handle exists and carries the renamed file.
    let output = harness.queue.output_handle(&id).await.unwrap();
    let handle = harness.handles.get(&output).await.unwrap();
    assert_eq!(handle.file_name, "converted_clip.mp4");
    assert_eq!(handle.content_type, "video/mp4");
    assert_eq!(handle.data, Bytes::from_static(b"mock-mp4-output"));
}

#[tokio::test]
async fn test_convert_failure_is_contained() {
    let harness = TestHarness::new().await;
    let failing = harness.add_one("broken.webm").await;
    let healthy = harness.add_one("fine.webm").await;
    harness
        .runtime
        .fail_job(failing.as_str(), "Conversion failed: corrupt bitstream")
        .await;

    let snapshot = harness.queue.convert(&failing).await.unwrap();
    assert_eq!(snapshot.state, "error");
    let diagnostic = snapshot.error.unwrap();
    assert!(diagnostic.contains("corrupt bitstream"));

    // The failure never propagates to other jobs.
    let other = harness.queue.job(&healthy).await.unwrap();
    assert_eq!(other.state, "idle");
    assert!(harness.queue.output_handle(&failing).await.is_none());
}

#[tokio::test]
async fn test_convert_all_continues_past_failures() {
    let harness = TestHarness::new().await;
    let a = harness.add_one("a.webm").await;
    let b = harness.add_one("b.webm").await;
    harness.runtime.fail_job(a.as_str(), "encoder crash").await;

    let count = harness.queue.convert_all().await.unwrap();
    assert_eq!(count, 2);

    let a_snapshot = harness.queue.job(&a).await.unwrap();
    let b_snapshot = harness.queue.job(&b).await.unwrap();
    assert_eq!(a_snapshot.state, "error");
    assert_eq!(b_snapshot.state, "completed");

    // B's run executed even though A failed, in submission order.
    let runs = harness.runtime.recorded_runs().await;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].job_id, a.to_string());
    assert_eq!(runs[1].job_id, b.to_string());
}

#[tokio::test]
async fn test_convert_all_skips_completed_and_reruns_errored() {
    let harness = TestHarness::new().await;
    let done = harness.add_one("done.webm").await;
    harness.queue.convert(&done).await.unwrap();

    let errored = harness.add_one("errored.webm").await;
    harness.runtime.fail_job(errored.as_str(), "boom").await;
    harness.queue.convert(&errored).await.unwrap();

    let idle = harness.add_one("idle.webm").await;

    let before = harness.runtime.run_count().await;
    let count = harness.queue.convert_all().await.unwrap();

    // Completed jobs are excluded; errored and idle ones run.
    assert_eq!(count, 2);
    assert_eq!(harness.runtime.run_count().await, before + 2);
    assert_eq!(harness.queue.job(&idle).await.unwrap().state, "completed");
}

#[tokio::test]
async fn test_convert_all_excludes_late_arrivals() {
    let harness = TestHarness::new().await;
    harness.add_one("a.webm").await;
    harness.add_one("b.webm").await;
    harness.runtime.set_run_delay_ms(100).await;

    let count = harness.queue.spawn_convert_all().await.unwrap();
    assert_eq!(count, 2);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let late = harness.add_one("late.webm").await;

    // Wait for the batch to drain.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(harness.runtime.run_count().await, 2);
    assert_eq!(harness.queue.job(&late).await.unwrap().state, "idle");
}

#[tokio::test]
async fn test_single_conversion_in_flight() {
    let harness = TestHarness::new().await;
    let a = harness.add_one("a.webm").await;
    let b = harness.add_one("b.webm").await;
    harness.runtime.set_run_delay_ms(150).await;

    harness.queue.spawn_convert(&a).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = harness.queue.convert(&b).await.unwrap_err();
    assert!(matches!(err, JobError::AlreadyRunning));
    let err = harness.queue.spawn_convert_all().await.unwrap_err();
    assert!(matches!(err, JobError::AlreadyRunning));

    assert!(harness.wait_for_state(&a, "completed", Duration::from_secs(2)).await);
    assert_eq!(harness.runtime.max_observed_concurrency(), 1);

    // The slot is free again.
    harness.queue.convert(&b).await.unwrap();
}

#[tokio::test]
async fn test_remove_while_converting_rejected() {
    let harness = TestHarness::new().await;
    let id = harness.add_one("clip.webm").await;
    harness.runtime.set_run_delay_ms(150).await;

    harness.queue.spawn_convert(&id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let err = harness.queue.remove(&id).await.unwrap_err();
    assert!(matches!(err, JobError::RemoveWhileConverting(_)));
    assert_eq!(harness.queue.job(&id).await.unwrap().state, "converting");

    let err = harness.queue.clear().await.unwrap_err();
    assert!(matches!(err, JobError::RemoveWhileConverting(_)));

    // Once the run finishes the job can be removed normally.
    assert!(harness.wait_for_state(&id, "completed", Duration::from_secs(2)).await);
    harness.queue.remove(&id).await.unwrap();
}

#[tokio::test]
async fn test_remove_releases_both_handles_exactly_once() {
    let harness = TestHarness::new().await;
    let id = harness.add_one("clip.webm").await;
    harness.queue.convert(&id).await.unwrap();

    let input = harness.queue.input_handle(&id).await.unwrap();
    let output = harness.queue.output_handle(&id).await.unwrap();
    assert_eq!(harness.handles.live_count().await, 2);

    harness.queue.remove(&id).await.unwrap();
    assert_eq!(harness.handles.live_count().await, 0);
    assert!(harness.handles.get(&input).await.is_none());
    assert!(harness.handles.get(&output).await.is_none());

    // Both handles were already released; a second revocation is refused.
    assert!(!harness.handles.revoke(&input).await);
    assert!(!harness.handles.revoke(&output).await);

    let err = harness.queue.remove(&id).await.unwrap_err();
    assert!(matches!(err, JobError::NotFound(_)));
}

#[tokio::test]
async fn test_clear_removes_all_jobs_and_handles() {
    let harness = TestHarness::new().await;
    harness.add_one("a.webm").await;
    let b = harness.add_one("b.webm").await;
    harness.queue.convert(&b).await.unwrap();
    assert_eq!(harness.handles.live_count().await, 3);

    let removed = harness.queue.clear().await.unwrap();
    assert_eq!(removed, 2);
    assert!(harness.queue.snapshot().await.is_empty());
    assert_eq!(harness.handles.live_count().await, 0);
}

#[tokio::test]
async fn test_rerun_resets_progress_and_revokes_prior_output() {
    let harness = TestHarness::new().await;
    let id = harness.add_one("clip.webm").await;

    harness.queue.convert(&id).await.unwrap();
    let first_output = harness.queue.output_handle(&id).await.unwrap();

    harness.queue.convert(&id).await.unwrap();
    let second_output = harness.queue.output_handle(&id).await.unwrap();

    assert_ne!(first_output, second_output);
    assert!(harness.handles.get(&first_output).await.is_none());
    assert!(harness.handles.get(&second_output).await.is_some());

    // The second run started from zero: its first update shows converting
    // at progress 0 after the completed 100.
    let updates = harness.progress_updates_for(&id);
    let after_first_completion: Vec<u8> = updates
        .iter()
        .copied()
        .skip_while(|p| *p != 100)
        .collect();
    assert!(after_first_completion.contains(&0));
}

#[tokio::test]
async fn test_preset_resolved_when_run_starts() {
    let harness = TestHarness::new().await;
    let a = harness.add_one("a.webm").await;
    let b = harness.add_one("b.webm").await;

    harness.queue.convert(&a).await.unwrap();
    harness.queue.set_quality(QualityLevel::Low).await;
    harness.queue.convert(&b).await.unwrap();

    let runs = harness.runtime.recorded_runs().await;
    assert_eq!(runs[0].preset.video_bitrate_kbps, 8000);
    assert_eq!(runs[1].preset.video_bitrate_kbps, 2500);
}

#[tokio::test]
async fn test_convert_rejected_before_engine_ready() {
    let harness = TestHarness::new_without_engine().await;
    let id = harness.add_one("clip.webm").await;

    let err = harness.queue.convert(&id).await.unwrap_err();
    assert!(matches!(err, JobError::Engine(EngineError::NotReady)));
    assert_eq!(harness.queue.job(&id).await.unwrap().state, "idle");
}

#[tokio::test]
async fn test_noisy_event_stream_yields_monotonic_progress() {
    let harness = TestHarness::new().await;
    harness
        .runtime
        .set_scripted_events(vec![
            EngineEvent::Log("  Duration: 00:02:00.00, start: 0.000000".to_string()),
            EngineEvent::Progress(ProgressSignal::Ratio(0.10)),
            EngineEvent::Progress(ProgressSignal::Ratio(0.05)),
            EngineEvent::Progress(ProgressSignal::Clock {
                value: 60_000.0,
                unit: ClockUnit::Unknown,
            }),
            EngineEvent::Progress(ProgressSignal::Ratio(900.0)),
            EngineEvent::Log(
                "frame= 2700 fps= 30 q=28.0 size= 9216KiB time=00:01:30.00 bitrate=...".to_string(),
            ),
            EngineEvent::Progress(ProgressSignal::Ratio(0.20)),
        ])
        .await;

    let id = harness.add_one("clip.webm").await;
    let snapshot = harness.queue.convert(&id).await.unwrap();
    assert_eq!(snapshot.progress_pct, 100);

    let updates = harness.progress_updates_for(&id);
    // Drop the initial 0s from creation and run start, then require strict
    // increase through completion at exactly 100.
    let emitted: Vec<u8> = updates.iter().copied().filter(|p| *p > 0).collect();
    assert!(!emitted.is_empty());
    for window in emitted.windows(2) {
        assert!(window[1] > window[0], "updates regressed: {:?}", emitted);
    }
    assert_eq!(*emitted.last().unwrap(), 100);
    assert!(emitted.contains(&50)); // 60000 resolved as milliseconds of 120s
    assert!(emitted.contains(&75)); // time=00:01:30 of 120s
}

#[tokio::test]
async fn test_duration_probe_fills_in_asynchronously() {
    let harness = TestHarness::new().await;
    harness.probe.set_duration("clip.webm", 90.0).await;

    let id = harness.add_one("clip.webm").await;

    let start = std::time::Instant::now();
    let mut probed = None;
    while start.elapsed() < Duration::from_secs(2) {
        probed = harness.queue.job(&id).await.unwrap().duration_secs;
        if probed.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(probed, Some(90.0));

    // The run is dispatched with the probed duration.
    harness.queue.convert(&id).await.unwrap();
    let runs = harness.runtime.recorded_runs().await;
    assert_eq!(runs[0].known_duration_secs, Some(90.0));
}

#[tokio::test]
async fn test_probe_failure_never_fails_a_run() {
    let harness = TestHarness::new().await;
    // No duration configured: the probe fails silently.
    let id = harness.add_one("clip.webm").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = harness.queue.convert(&id).await.unwrap();
    assert_eq!(snapshot.state, "completed");
    assert_eq!(snapshot.progress_pct, 100);

    let runs = harness.runtime.recorded_runs().await;
    assert_eq!(runs[0].known_duration_secs, None);
}
