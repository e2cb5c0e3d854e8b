use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{engine, handlers, jobs, middleware as api_middleware, ws};
use crate::state::AppState;

/// Upper bound for one upload request.
const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Engine session
        .route("/engine", get(engine::engine_status))
        .route("/engine/load", post(engine::engine_load))
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs", post(jobs::upload_jobs))
        .route("/jobs", delete(jobs::clear_jobs))
        .route("/jobs/convert-all", post(jobs::convert_all))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}", delete(jobs::delete_job))
        .route("/jobs/{id}/convert", post(jobs::convert_job))
        .route("/jobs/{id}/download", get(jobs::download_output))
        .route("/jobs/{id}/preview", get(jobs::preview_input))
        // Quality selection
        .route("/quality", get(jobs::get_quality))
        .route("/quality", put(jobs::set_quality))
        // Real-time updates
        .route("/ws", get(ws::ws_handler))
        // Uploads are whole clips; the default 2 MB body cap is far too low.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(Arc::clone(&state));

    let metrics_route = Router::new()
        .route("/metrics", get(handlers::metrics))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(metrics_route)
        .layer(middleware::from_fn(api_middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
