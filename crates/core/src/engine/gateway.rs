//! The engine gateway.
//!
//! Owns the single codec engine instance for the process: readiness gating
//! on the isolation precondition, bounded initialization, and strict
//! serialization of runs. The gateway mutates no job-level state; all
//! bookkeeping belongs to the job queue.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::isolation::IsolationProbe;
use super::traits::EngineRuntime;
use super::types::{EngineEvent, EngineOutput, EngineRequest, SessionPhase};
use crate::metrics;

/// Receives engine log lines for the lifetime of the session. Established
/// at initialization; lines from initialization and from every subsequent
/// run are delivered to it.
pub type EngineLogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Gateway to the process-wide engine session.
pub struct EngineGateway {
    runtime: Arc<dyn EngineRuntime>,
    isolation: Arc<dyn IsolationProbe>,
    config: EngineConfig,
    phase: RwLock<SessionPhase>,
    log_sink: RwLock<Option<EngineLogSink>>,
    /// Serializes initialization; a second caller waits for the in-flight
    /// load instead of starting a duplicate one.
    load_lock: Mutex<()>,
    /// Held for the duration of one run. `try_lock` failure means a run is
    /// in flight and the call is rejected as busy.
    run_lock: Mutex<()>,
}

impl EngineGateway {
    /// Create a gateway around a runtime and an isolation probe.
    pub fn new(
        runtime: Arc<dyn EngineRuntime>,
        isolation: Arc<dyn IsolationProbe>,
        config: EngineConfig,
    ) -> Self {
        Self {
            runtime,
            isolation,
            config,
            phase: RwLock::new(SessionPhase::Idle),
            log_sink: RwLock::new(None),
            load_lock: Mutex::new(()),
            run_lock: Mutex::new(()),
        }
    }

    /// Current session phase.
    pub async fn phase(&self) -> SessionPhase {
        self.phase.read().await.clone()
    }

    /// Whether the engine accepts runs.
    pub async fn is_ready(&self) -> bool {
        self.phase.read().await.is_ready()
    }

    /// Initialize the engine session.
    ///
    /// The isolation precondition is checked before any load attempt; its
    /// failure puts the session into the terminal `Fatal` phase. Load
    /// failures (binary missing, bootstrap error, timeout) return the
    /// session to `Idle` and may be retried. Idempotent: a call on a ready
    /// session is a no-op, and a call during an in-flight load waits for
    /// that load rather than starting another.
    pub async fn initialize(&self, log_sink: EngineLogSink) -> Result<(), EngineError> {
        {
            let phase = self.phase.read().await;
            match &*phase {
                SessionPhase::Ready => return Ok(()),
                SessionPhase::Fatal { reason } => {
                    return Err(EngineError::SecurityPrecondition {
                        detail: reason.clone(),
                    })
                }
                _ => {}
            }
        }

        let _load = self.load_lock.lock().await;

        // Re-check after acquiring the lock: a concurrent caller may have
        // finished the load while we waited.
        match &*self.phase.read().await {
            SessionPhase::Ready => return Ok(()),
            SessionPhase::Fatal { reason } => {
                return Err(EngineError::SecurityPrecondition {
                    detail: reason.clone(),
                })
            }
            _ => {}
        }

        *self.log_sink.write().await = Some(Arc::clone(&log_sink));
        log_sink("initializing codec engine");

        if self.config.require_isolation {
            if let Err(detail) = self.isolation.verify() {
                error!(detail = %detail, "engine isolation precondition failed");
                log_sink(&format!("isolation precondition failed: {}", detail));
                *self.phase.write().await = SessionPhase::Fatal {
                    reason: detail.clone(),
                };
                metrics::ENGINE_LOADS.with_label_values(&["fatal"]).inc();
                return Err(EngineError::SecurityPrecondition { detail });
            }
        }

        *self.phase.write().await = SessionPhase::Loading;
        info!(runtime = self.runtime.name(), "loading codec engine");

        let load_timeout = Duration::from_secs(self.config.load_timeout_secs);
        match timeout(load_timeout, self.runtime.start()).await {
            Ok(Ok(())) => {
                *self.phase.write().await = SessionPhase::Ready;
                metrics::ENGINE_LOADS.with_label_values(&["success"]).inc();
                info!(runtime = self.runtime.name(), "codec engine ready");
                log_sink("codec engine ready");
                Ok(())
            }
            Ok(Err(e)) => {
                *self.phase.write().await = SessionPhase::Idle;
                metrics::ENGINE_LOADS.with_label_values(&["error"]).inc();
                warn!(error = %e, "engine load failed");
                log_sink(&format!("engine load failed: {}", e));
                Err(e)
            }
            Err(_) => {
                *self.phase.write().await = SessionPhase::Idle;
                metrics::ENGINE_LOADS.with_label_values(&["timeout"]).inc();
                warn!(
                    timeout_secs = self.config.load_timeout_secs,
                    "engine load timed out"
                );
                log_sink("engine load timed out");
                Err(EngineError::LoadTimeout {
                    timeout_secs: self.config.load_timeout_secs,
                })
            }
        }
    }

    /// Run one conversion.
    ///
    /// Events are delivered to exactly this run's channel; log lines are
    /// additionally forwarded to the session log sink. A second concurrent
    /// call is rejected with [`EngineError::Busy`]. The queue is expected
    /// to prevent it, but the gateway rejects it independently.
    pub async fn run(
        &self,
        request: EngineRequest,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<EngineOutput, EngineError> {
        match &*self.phase.read().await {
            SessionPhase::Ready => {}
            SessionPhase::Fatal { reason } => {
                return Err(EngineError::SecurityPrecondition {
                    detail: reason.clone(),
                })
            }
            _ => return Err(EngineError::NotReady),
        }

        let _run = self.run_lock.try_lock().map_err(|_| EngineError::Busy)?;

        let sink = self.log_sink.read().await.clone();
        let (runtime_tx, mut runtime_rx) = mpsc::channel::<EngineEvent>(64);

        // Tee: log lines go to the session sink as well as the run's
        // consumer. The forwarder ends when the runtime drops its sender.
        let forwarder = tokio::spawn(async move {
            while let Some(event) = runtime_rx.recv().await {
                if let EngineEvent::Log(line) = &event {
                    if let Some(sink) = &sink {
                        sink(line);
                    }
                }
                let _ = events.send(event).await;
            }
        });

        let result = self.runtime.execute(request, runtime_tx).await;
        let _ = forwarder.await;
        result
    }
}
