//! Engine session endpoints: the global banner state and load retry.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use reelsmith_core::{EngineError, EngineLogSink, SessionPhase};

use crate::state::AppState;

#[derive(Serialize)]
pub struct EngineStatusResponse {
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl EngineStatusResponse {
    fn from_phase(phase: &SessionPhase) -> Self {
        let detail = match phase {
            SessionPhase::Fatal { reason } => Some(reason.clone()),
            _ => None,
        };
        Self {
            phase: phase.as_str().to_string(),
            detail,
        }
    }
}

/// GET /engine - the session banner: loading/ready/fatal.
pub async fn engine_status(State(state): State<Arc<AppState>>) -> Json<EngineStatusResponse> {
    let phase = state.gateway().phase().await;
    Json(EngineStatusResponse::from_phase(&phase))
}

/// POST /engine/load - (re)try engine initialization.
///
/// A no-op on a ready session. A fatal session answers 503 with the
/// precondition detail; load failures answer 502 and can be retried.
pub async fn engine_load(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let broadcaster = state.ws_broadcaster().clone();
    let sink_broadcaster = broadcaster.clone();
    let sink: EngineLogSink = Arc::new(move |line: &str| {
        sink_broadcaster.engine_log(line);
    });

    let result = state.gateway().initialize(sink).await;
    let phase = state.gateway().phase().await;
    broadcaster.engine_status(
        phase.as_str(),
        match &phase {
            SessionPhase::Fatal { reason } => Some(reason.clone()),
            _ => None,
        },
    );

    match result {
        Ok(()) => (StatusCode::OK, Json(EngineStatusResponse::from_phase(&phase))).into_response(),
        Err(e @ EngineError::SecurityPrecondition { .. }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(EngineStatusResponse {
                phase: "fatal".to_string(),
                detail: Some(e.to_string()),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(EngineStatusResponse {
                phase: phase.as_str().to_string(),
                detail: Some(e.to_string()),
            }),
        )
            .into_response(),
    }
}
