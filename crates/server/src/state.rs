use std::sync::Arc;

use reelsmith_core::{Config, EngineGateway, HandleStore, JobQueue};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    queue: JobQueue,
    gateway: Arc<EngineGateway>,
    handles: Arc<HandleStore>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        queue: JobQueue,
        gateway: Arc<EngineGateway>,
        handles: Arc<HandleStore>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            queue,
            gateway,
            handles,
            ws_broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn gateway(&self) -> &Arc<EngineGateway> {
        &self.gateway
    }

    pub fn handles(&self) -> &Arc<HandleStore> {
        &self.handles
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
