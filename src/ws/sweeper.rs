// Periodic stale-connection sweep, mirroring `check_stale_connections` in
// `websocket.py`: every `SWEEP_INTERVAL` close any client whose last ping is
// older than `STALE_THRESHOLD` with close code 1000 and reason
// "Heartbeat timeout", then drop it from the registry.

use std::sync::Arc;

use super::registry::{WsRegistry, SWEEP_INTERVAL};

pub async fn run(registry: Arc<WsRegistry>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        for client_id in registry.stale_clients() {
            tracing::info!(client_id = %client_id, "closing stale websocket connection");
            registry.close(&client_id, 1000, "Heartbeat timeout").await;
        }
    }
}
