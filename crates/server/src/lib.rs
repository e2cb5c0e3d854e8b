//! Reelsmith server: HTTP/WebSocket surface over the conversion
//! orchestrator.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::{create_router, WsBroadcaster};
pub use state::AppState;
