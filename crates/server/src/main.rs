use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelsmith_core::{
    load_config, validate_config, Config, DurationProbe, EngineGateway, EngineLogSink,
    FfmpegRuntime, FfprobeDurationProbe, HandleStore, JobQueue, QueueEvent, ScratchDirIsolation,
    SessionPhase,
};

use reelsmith_server::{create_router, AppState, WsBroadcaster};

/// Interval between WebSocket heartbeats.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("REELSMITH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration; a missing file means defaults.
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!(
            "No configuration file at {:?}, using defaults",
            config_path
        );
        Config::default()
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Engine scratch dir: {:?}", config.engine.scratch_dir);
    info!(
        "Default quality: {}",
        config.conversion.default_quality.as_str()
    );

    // Engine gateway: the single codec engine session for this process.
    let runtime = Arc::new(FfmpegRuntime::new(config.engine.clone()));
    let isolation = Arc::new(ScratchDirIsolation::new(config.engine.scratch_dir.clone()));
    let gateway = Arc::new(EngineGateway::new(runtime, isolation, config.engine.clone()));

    // Handle store and duration probe.
    let handles = Arc::new(HandleStore::new());
    let probe: Arc<dyn DurationProbe> = Arc::new(FfprobeDurationProbe::new(
        config.engine.ffprobe_path.clone(),
        config.engine.scratch_dir.join("probe"),
    ));

    // Job queue wired to the gateway.
    let queue = JobQueue::new(
        Arc::clone(&gateway),
        Arc::clone(&handles),
        probe,
        config.conversion.clone(),
    );

    // WebSocket broadcaster for real-time updates.
    let ws_broadcaster = WsBroadcaster::default();
    info!("WebSocket broadcaster initialized");

    // Queue events flow straight into the broadcast channel.
    let broadcaster_for_queue = ws_broadcaster.clone();
    queue
        .set_event_callback(Arc::new(move |event: QueueEvent| match event {
            QueueEvent::Updated(snapshot) => broadcaster_for_queue.job_updated(&snapshot),
            QueueEvent::Removed(id) => broadcaster_for_queue.job_removed(id.as_str()),
        }))
        .await;

    // Initialize the engine in the background; clients watch the banner via
    // the WebSocket stream or GET /engine.
    spawn_engine_init(Arc::clone(&gateway), ws_broadcaster.clone());

    // Heartbeats keep idle WebSocket connections alive.
    let heartbeat_broadcaster = ws_broadcaster.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        loop {
            interval.tick().await;
            heartbeat_broadcaster.heartbeat();
        }
    });

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        queue,
        gateway,
        Arc::clone(&handles),
        ws_broadcaster,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Teardown: every outstanding handle is revoked.
    info!("Server shutting down...");
    let revoked = handles.revoke_all().await;
    info!("Revoked {} outstanding media handles", revoked);

    Ok(())
}

/// Kick off engine initialization and broadcast the resulting phase.
fn spawn_engine_init(gateway: Arc<EngineGateway>, broadcaster: WsBroadcaster) {
    tokio::spawn(async move {
        let sink_broadcaster = broadcaster.clone();
        let sink: EngineLogSink = Arc::new(move |line: &str| {
            sink_broadcaster.engine_log(line);
        });

        broadcaster.engine_status("loading", None);
        match gateway.initialize(sink).await {
            Ok(()) => info!("Engine initialized"),
            Err(e) => warn!("Engine initialization failed: {}", e),
        }

        let phase = gateway.phase().await;
        let detail = match &phase {
            SessionPhase::Fatal { reason } => Some(reason.clone()),
            _ => None,
        };
        broadcaster.engine_status(phase.as_str(), detail);
    });
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
