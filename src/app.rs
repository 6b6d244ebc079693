// Application state shared across handlers.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    services::{
        BillingService, ChatOrchestrator, GoogleOAuthClient, JwtService, LlmClient,
        RateLimitService, TokenBlacklistService, VectorStoreService,
    },
    ws::WsRegistry,
    RedisPool,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub max_connections: u32,

    pub jwt_service: Arc<JwtService>,
    pub token_blacklist: Arc<TokenBlacklistService>,
    pub oauth_client: Arc<GoogleOAuthClient>,
    pub rate_limit_service: Arc<RateLimitService>,

    pub billing_service: Arc<BillingService>,
    pub vector_store_service: Arc<VectorStoreService>,
    pub ws_registry: Arc<WsRegistry>,
    pub llm_clients: Arc<HashMap<String, Arc<dyn LlmClient>>>,
    pub chat_orchestrator: Arc<ChatOrchestrator>,
}
