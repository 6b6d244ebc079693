// HTTP/WS route tables, grouped by component: auth (C2), billing (C3),
// chat (C5), knowledge-base (C4), the WS upgrade endpoint (C5), and the
// hand-built OpenAPI/Swagger docs.

pub mod auth;
pub mod billing;
pub mod chat;
pub mod docs;
pub mod knowledge_base;
pub mod websocket;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::app::AppState;

/// `/api/auth/*` (§6). `register` is additionally rate-limited at the
/// handler level (10 req/min/IP); everything else here is either public
/// (the OAuth legs) or gated by `auth_middleware` in the caller's router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify))
        .route("/refresh", post(auth::refresh_token))
        .route("/logout", post(auth::logout))
        .route("/google/start", post(auth::google_auth_start))
        .route("/google/callback", get(auth::google_callback))
        .route("/devices", get(auth::list_devices))
        .route("/devices/{device_id}", delete(auth::delete_device))
}

/// `/api/billing/*` (§6) — every route requires `AuthenticatedUser`.
pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/balance", get(billing::balance))
        .route("/purchase", post(billing::purchase))
        .route("/allocate", post(billing::allocate))
        .route("/consume", post(billing::consume))
        .route("/transactions", get(billing::transactions))
        .route("/pricing", get(billing::pricing))
}

/// Chat + tool/provider discovery (§6) — every route requires `AuthenticatedUser`.
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/chat/summarize", post(chat::summarize))
        .route("/llm-providers", get(chat::llm_providers))
        .route("/tools", get(chat::tools))
}

/// `/api/knowledge-base/*` (§6) — every route requires `AuthenticatedUser`.
pub fn knowledge_base_routes() -> Router<AppState> {
    Router::new()
        .route("/documents/upload", post(knowledge_base::upload_document))
        .route("/documents/upload-text", post(knowledge_base::upload_text))
        .route("/documents/stats", get(knowledge_base::document_stats))
        .route("/documents/clear", delete(knowledge_base::clear_documents))
}
