// API documentation: hand-built OpenAPI JSON served alongside swagger-ui,
// the teacher's own pattern (utoipa-swagger-ui for the HTML shell, plain
// `serde_json::json!` for the spec body rather than derive-macro schemas).

pub mod health;
pub mod swagger_ui;

use axum::{
    extract::OriginalUri,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

pub async fn serve_openapi_spec() -> Response {
    let spec = build_openapi_spec();
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], serde_json::to_string(&spec).unwrap_or_default())
        .into_response()
}

pub async fn redirect_to_docs(original_uri: OriginalUri) -> impl IntoResponse {
    let mut path = original_uri.0.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, path)]).into_response()
}

pub use swagger_ui::serve_swagger_ui;

fn bearer_secured(body: serde_json::Value) -> serde_json::Value {
    let mut body = body;
    if let serde_json::Value::Object(ref mut map) = body {
        map.insert("security".to_string(), json!([{ "bearerAuth": [] }]));
    }
    body
}

fn build_openapi_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Notebook Backend API",
            "description": "Per-device authenticated backend for an AI-assisted note-taking app: credit/token billing, agentic chat, and pgvector-backed retrieval.",
            "version": "1.0.0"
        },
        "tags": [
            { "name": "Auth", "description": "Device registration, Google OAuth, token refresh" },
            { "name": "Billing", "description": "Credit purchases and per-model token allocation" },
            { "name": "Chat", "description": "Agentic chat completion and summarization" },
            { "name": "Knowledge Base", "description": "RAG document ingestion and collection management" },
            { "name": "Health", "description": "Service health checks" }
        ],
        "paths": {
            "/api/auth/register": { "post": auth_register_endpoint() },
            "/api/auth/google/start": { "get": auth_google_start_endpoint() },
            "/api/auth/google/callback": { "get": auth_google_callback_endpoint() },
            "/api/auth/refresh": { "post": auth_refresh_endpoint() },
            "/api/auth/logout": { "post": bearer_secured(auth_logout_endpoint()) },
            "/api/auth/devices": { "get": bearer_secured(auth_devices_endpoint()) },
            "/api/billing/balance": { "get": bearer_secured(billing_balance_endpoint()) },
            "/api/billing/purchase": { "post": bearer_secured(billing_purchase_endpoint()) },
            "/api/billing/allocate": { "post": bearer_secured(billing_allocate_endpoint()) },
            "/api/chat": { "post": bearer_secured(chat_endpoint()) },
            "/api/chat/summarize": { "post": bearer_secured(summarize_endpoint()) },
            "/v1/health": health::health_endpoint(),
        },
        "components": {
            "securitySchemes": {
                "bearerAuth": {
                    "type": "http",
                    "scheme": "bearer",
                    "bearerFormat": "JWT",
                    "description": "JWT access token obtained from /api/auth/register, /api/auth/google/callback, or /api/auth/refresh"
                }
            }
        }
    })
}

fn auth_register_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Auth"],
        "summary": "Register a new device",
        "operationId": "registerDevice",
        "responses": { "200": { "description": "A token pair and user id" } }
    })
}

fn auth_google_start_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Auth"],
        "summary": "Begin the Google OAuth flow for a device",
        "operationId": "startGoogleOAuth",
        "responses": { "200": { "description": "Authorization URL to redirect the user to" } }
    })
}

fn auth_google_callback_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Auth"],
        "summary": "Complete the Google OAuth flow",
        "operationId": "completeGoogleOAuth",
        "responses": { "200": { "description": "A token pair bound to the device" } }
    })
}

fn auth_refresh_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Auth"],
        "summary": "Rotate a refresh token for a new token pair",
        "operationId": "refreshToken",
        "responses": { "200": { "description": "A freshly issued token pair" } }
    })
}

fn auth_logout_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Auth"],
        "summary": "Blacklist the caller's access and refresh tokens",
        "operationId": "logout",
        "responses": { "204": { "description": "Logged out" } }
    })
}

fn auth_devices_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Auth"],
        "summary": "List the caller's registered devices",
        "operationId": "listDevices",
        "responses": { "200": { "description": "Device list" } }
    })
}

fn billing_balance_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Billing"],
        "summary": "Get the caller's credit balance and per-model token allocations",
        "operationId": "getBalance",
        "responses": { "200": { "description": "Balance" } }
    })
}

fn billing_purchase_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Billing"],
        "summary": "Record an in-app purchase of credits",
        "operationId": "purchaseCredits",
        "responses": { "200": { "description": "Updated balance" } }
    })
}

fn billing_allocate_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Billing"],
        "summary": "Convert credits into tokens allocated to a model",
        "operationId": "allocateTokens",
        "responses": { "200": { "description": "Updated balance" } }
    })
}

fn chat_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Chat"],
        "summary": "One agentic chat turn",
        "operationId": "chat",
        "responses": { "200": { "description": "Assistant response, extracted commands, token usage" } }
    })
}

fn summarize_endpoint() -> serde_json::Value {
    json!({
        "tags": ["Chat"],
        "summary": "Summarize a conversation history to reclaim context budget",
        "operationId": "summarizeConversation",
        "responses": { "200": { "description": "Summary and the preserved recent messages" } }
    })
}
