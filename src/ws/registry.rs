// Shared registry: `connections`, `pending`, `client_requests`, `last_ping`.
// A single `DashMap`-backed structure guarded per-key (§5 "Shared resources")
// rather than one global mutex, following `WsState` in
// `nisarsyed-openconv/apps/server/src/ws/state.rs`.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::WsError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const STALE_THRESHOLD: Duration = Duration::from_secs(60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Server→client frame. `request_id` lets the client's eventual reply be
/// correlated back to the awaiter that sent this.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    FetchFileContent { request_id: String, title: String },
    FetchSearchResults {
        request_id: String,
        query: String,
        search_type: String,
    },
}

/// Client→server frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    FileContentResponse {
        request_id: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    SearchResultsResponse {
        request_id: String,
        #[serde(default)]
        results: Option<JsonValue>,
        #[serde(default)]
        error: Option<String>,
    },
}

type Awaiter = oneshot::Sender<Result<JsonValue, String>>;

/// What the connection's send task actually receives. `ServerMessage` is the
/// wire protocol; `Close` is an internal instruction so the stale-connection
/// sweeper can force-close a live socket instead of only forgetting about it
/// in the registry (§4.5.8's "force-closed with code 1000").
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Send(ServerMessage),
    Close { code: u16, reason: String },
}

pub struct WsRegistry {
    connections: DashMap<String, mpsc::Sender<ConnectionEvent>>,
    pending: DashMap<String, Awaiter>,
    client_requests: DashMap<String, HashSet<String>>,
    last_ping: DashMap<String, Instant>,
}

impl WsRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            pending: DashMap::new(),
            client_requests: DashMap::new(),
            last_ping: DashMap::new(),
        }
    }

    pub fn register(&self, client_id: &str, sender: mpsc::Sender<ConnectionEvent>) {
        self.connections.insert(client_id.to_string(), sender);
        self.client_requests.insert(client_id.to_string(), HashSet::new());
        self.last_ping.insert(client_id.to_string(), Instant::now());
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.connections.contains_key(client_id)
    }

    pub fn touch_ping(&self, client_id: &str) {
        self.last_ping.insert(client_id.to_string(), Instant::now());
    }

    /// Every awaiter belonging to `client_id` fails with `Disconnected`; the
    /// registry's invariant is that `pending` never retains an entry whose
    /// owning connection is gone.
    pub fn disconnect(&self, client_id: &str) {
        self.connections.remove(client_id);
        self.last_ping.remove(client_id);
        if let Some((_, request_ids)) = self.client_requests.remove(client_id) {
            for request_id in request_ids {
                if let Some((_, awaiter)) = self.pending.remove(&request_id) {
                    let _ = awaiter.send(Err("client disconnected".to_string()));
                }
            }
        }
    }

    fn register_pending(&self, client_id: &str, request_id: &str, awaiter: Awaiter) {
        self.pending.insert(request_id.to_string(), awaiter);
        self.client_requests
            .entry(client_id.to_string())
            .or_default()
            .insert(request_id.to_string());
    }

    fn unregister_pending(&self, client_id: &str, request_id: &str) {
        self.pending.remove(request_id);
        if let Some(mut set) = self.client_requests.get_mut(client_id) {
            set.remove(request_id);
        }
    }

    /// Fulfils a pending request from the client's reply frame.
    pub fn resolve(&self, request_id: &str, result: Result<JsonValue, String>) {
        if let Some((_, awaiter)) = self.pending.remove(&request_id.to_string()) {
            let _ = awaiter.send(result);
        } else {
            tracing::warn!(request_id, "resolved an unknown or already-cleaned-up ws request");
        }
    }

    async fn correlate(
        &self,
        client_id: &str,
        frame: ServerMessage,
        request_id: String,
        timeout: Duration,
    ) -> Result<JsonValue, WsError> {
        let sender = self
            .connections
            .get(client_id)
            .map(|s| s.clone())
            .ok_or(WsError::NotConnected)?;

        let (tx, rx) = oneshot::channel();
        self.register_pending(client_id, &request_id, tx);

        if sender.send(ConnectionEvent::Send(frame)).await.is_err() {
            self.unregister_pending(client_id, &request_id);
            return Err(WsError::NotConnected);
        }

        let result = tokio::time::timeout(timeout, rx).await;
        self.unregister_pending(client_id, &request_id);

        match result {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(_))) => Err(WsError::Disconnected),
            Ok(Err(_)) => Err(WsError::Disconnected),
            Err(_) => Err(WsError::Timeout),
        }
    }

    /// §4.5.8 `request_file_content`.
    pub async fn request_file_content(
        &self,
        client_id: &str,
        title: &str,
        timeout: Option<Duration>,
    ) -> Result<String, WsError> {
        let request_id = Uuid::new_v4().to_string();
        let frame = ServerMessage::FetchFileContent {
            request_id: request_id.clone(),
            title: title.to_string(),
        };
        let value = self
            .correlate(client_id, frame, request_id, timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// §4.5.8 `request_search_results`.
    pub async fn request_search_results(
        &self,
        client_id: &str,
        query: &str,
        search_type: &str,
        timeout: Option<Duration>,
    ) -> Result<JsonValue, WsError> {
        let request_id = Uuid::new_v4().to_string();
        let frame = ServerMessage::FetchSearchResults {
            request_id: request_id.clone(),
            query: query.to_string(),
            search_type: search_type.to_string(),
        };
        self.correlate(client_id, frame, request_id, timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .await
    }

    /// Drives the stale-connection sweeper (§4.5.8): clients whose last ping
    /// is older than `STALE_THRESHOLD` are returned for the caller to close.
    pub fn stale_clients(&self) -> Vec<String> {
        let now = Instant::now();
        self.last_ping
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) > STALE_THRESHOLD)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Force-closes a live socket (§4.5.8: code 1000, "Heartbeat timeout")
    /// and cleans up registry state as if the client had disconnected. A
    /// send failure means the connection task is already gone, in which case
    /// `disconnect` alone is sufficient.
    pub async fn close(&self, client_id: &str, code: u16, reason: &str) {
        if let Some(sender) = self.connections.get(client_id).map(|s| s.clone()) {
            let _ = sender
                .send(ConnectionEvent::Close { code, reason: reason.to_string() })
                .await;
        }
        self.disconnect(client_id);
    }
}

impl Default for WsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_fails_immediately_when_not_connected() {
        let registry = WsRegistry::new();
        let result = registry
            .request_file_content("nobody", "notes.md", Some(Duration::from_millis(50)))
            .await;
        assert_eq!(result, Err(WsError::NotConnected));
    }

    #[tokio::test]
    async fn round_trip_resolves_with_client_payload() {
        let registry = std::sync::Arc::new(WsRegistry::new());
        let (tx, mut rx) = mpsc::channel(4);
        registry.register("client-a", tx);

        let registry_clone = registry.clone();
        let responder = tokio::spawn(async move {
            let event = rx.recv().await.unwrap();
            let request_id = match event {
                ConnectionEvent::Send(ServerMessage::FetchFileContent { request_id, .. }) => {
                    request_id
                },
                _ => panic!("wrong frame"),
            };
            registry_clone.resolve(&request_id, Ok(JsonValue::String("hello".to_string())));
        });

        let content = registry
            .request_file_content("client-a", "notes.md", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(content, "hello");
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn times_out_and_cleans_up_pending() {
        let registry = WsRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        registry.register("client-b", tx);

        let result = registry
            .request_file_content("client-b", "notes.md", Some(Duration::from_millis(30)))
            .await;
        assert_eq!(result, Err(WsError::Timeout));
        assert!(registry.pending.is_empty());
    }

    #[tokio::test]
    async fn disconnect_fails_every_pending_request_for_that_client() {
        let registry = std::sync::Arc::new(WsRegistry::new());
        let (tx, _rx) = mpsc::channel(4);
        registry.register("client-c", tx);

        let registry_clone = registry.clone();
        let waiter = tokio::spawn(async move {
            registry_clone
                .request_file_content("client-c", "notes.md", Some(Duration::from_secs(5)))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.disconnect("client-c");

        let result = waiter.await.unwrap();
        assert_eq!(result, Err(WsError::Disconnected));
        assert!(registry.pending.is_empty());
    }

    #[tokio::test]
    async fn close_sends_close_event_and_cleans_up_registry() {
        let registry = WsRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        registry.register("client-d", tx);

        registry.close("client-d", 1000, "Heartbeat timeout").await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            ConnectionEvent::Close { code: 1000, .. }
        ));
        assert!(!registry.is_connected("client-d"));
    }

    #[test]
    fn stale_clients_detects_only_expired_pings() {
        let registry = WsRegistry::new();
        registry.last_ping.insert("fresh".to_string(), Instant::now());
        registry
            .last_ping
            .insert("stale".to_string(), Instant::now() - Duration::from_secs(120));

        let stale = registry.stale_clients();
        assert_eq!(stale, vec!["stale".to_string()]);
    }
}
