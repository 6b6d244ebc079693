// Chat handlers (C5): one agentic turn, conversation summarization, and the
// provider/tool discovery endpoints. §6 — all routes authenticated. The
// caller's `device_id` doubles as the WS `client_id` a server-executed tool
// correlates its request against (the same id the device connects to
// `/ws/{device_id}` with).

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    services::{
        billing::PricingInfo,
        orchestrator::{ChatRequest, ChatResponse, SummarizeRequest, SummarizeResponse},
        tools::tool_catalog,
    },
    utils::ServiceError,
};

/// `POST /api/chat {message, provider, model, context?}`.
pub async fn chat(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServiceError> {
    let unix_seconds = chrono::Utc::now().timestamp();
    let response = app_state
        .chat_orchestrator
        .chat(&user.user_id, &user.device_id, payload, unix_seconds)
        .await?;
    Ok(Json(response))
}

/// `POST /api/chat/summarize {conversationHistory, max_tokens, preserve_recent, provider, model?}`.
pub async fn summarize(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, ServiceError> {
    let response = app_state.chat_orchestrator.summarize(&user.user_id, payload).await?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct LlmProviderInfo {
    pub provider: String,
    pub models: std::collections::HashMap<String, PricingInfo>,
}

/// `GET /api/llm-providers` → provider list with models and pricing
/// metadata. Every configured `LlmClient` is paired with the pricing table
/// wholesale — the orchestrator doesn't track which models belong to which
/// provider, so a provider's "models" is simply the full catalog it can be
/// asked to serve.
pub async fn llm_providers(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<LlmProviderInfo>>, ServiceError> {
    let pricing = app_state.billing_service.pricing().await?;
    let providers = app_state
        .llm_clients
        .keys()
        .map(|provider| LlmProviderInfo {
            provider: provider.clone(),
            models: pricing.clone(),
        })
        .collect();
    Ok(Json(providers))
}

/// `GET /api/tools` — the fixed agent tool catalog, exposed read-only for
/// client-side introspection (e.g. a settings screen listing capabilities).
pub async fn tools(_user: AuthenticatedUser) -> Json<serde_json::Value> {
    let catalog = tool_catalog();
    let json = catalog
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
                "side": match t.side {
                    crate::services::tools::ToolSide::Client => "client",
                    crate::services::tools::ToolSide::Server => "server",
                },
            })
        })
        .collect::<Vec<_>>();
    Json(serde_json::Value::Array(json))
}
