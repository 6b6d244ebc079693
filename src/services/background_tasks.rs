// Background maintenance: periodic RAG collection TTL sweeps (§4.4.6) and the
// WebSocket stale-connection sweeper (§4.5.8), both spawned once at startup
// and left running for the process lifetime.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::services::vector_store::VectorStoreService;
use crate::ws::WsRegistry;

const VECTOR_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct BackgroundTaskManager {
    vector_store: Arc<VectorStoreService>,
    ws_registry: Arc<WsRegistry>,
}

impl BackgroundTaskManager {
    pub fn new(vector_store: Arc<VectorStoreService>, ws_registry: Arc<WsRegistry>) -> Self {
        Self { vector_store, ws_registry }
    }

    pub fn start_all_tasks(&self) {
        info!("starting background maintenance tasks");
        tokio::spawn(sweep_expired_collections(self.vector_store.clone()));
        tokio::spawn(crate::ws::sweeper::run(self.ws_registry.clone()));
    }
}

async fn sweep_expired_collections(vector_store: Arc<VectorStoreService>) {
    let mut interval = tokio::time::interval(VECTOR_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        match vector_store.cleanup_expired().await {
            Ok(deleted) if deleted > 0 => info!(deleted, "swept expired RAG collections"),
            Ok(_) => {},
            Err(e) => error!(error = %e, "failed to sweep expired RAG collections"),
        }
    }
}

pub fn initialize_background_tasks(vector_store: Arc<VectorStoreService>, ws_registry: Arc<WsRegistry>) {
    BackgroundTaskManager::new(vector_store, ws_registry).start_all_tasks();
}
