// Binary entrypoint: composition root. Builds every C1-C5 service, wires the
// HTTP/WS router, and starts the background maintenance tasks (§5).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noted_backend_core::{
    app::AppState,
    db::{check_diesel_health, create_diesel_pool, mask_connection_string, DieselDatabaseConfig, RedisConfig, RedisPool},
    handlers::{auth_routes, billing_routes, chat_routes, docs as docs_handlers, knowledge_base_routes, websocket},
    middleware::auth_middleware,
    migrations,
    services::{
        embeddings::{GeminiEmbeddingConfig, GeminiEmbeddingProvider},
        iap::{GooglePlayConfig, GooglePlayIapVerifier},
        llm::{GeminiAgentClient, GeminiConfig},
        oauth::{GoogleOAuthClient, GoogleOAuthConfig},
        orchestrator::ChatOrchestrator,
        tools::web_search::{CseConfig, WebSearchRagTool},
        BillingService, IapVerifier, JwtService, LlmClient, RateLimitService,
        TokenBlacklistService, VectorStoreService,
    },
    ws::WsRegistry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--version" {
        println!("noted-backend-core v{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noted_backend_core=debug,axum=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();

    let config = noted_backend_core::app_config::config();
    info!("=== STARTING NOTED BACKEND CORE ===");
    info!("binding on {}", config.bind_address);

    info!("initializing database pool...");
    let db_config = DieselDatabaseConfig::default();
    info!("database url: {}", mask_connection_string(&db_config.url));
    let max_connections = db_config.max_connections;
    let diesel_pool = create_diesel_pool(db_config).await.map_err(|e| {
        error!("failed to initialize database pool: {e}");
        e
    })?;

    if migrations::should_run_migrations() {
        info!("running embedded migrations...");
        migrations::run_all_migrations(&diesel_pool, migrations::MigrationConfig::default())
            .await
            .map_err(|e| format!("migration failed: {e}"))?;
    } else {
        info!("embedded migrations disabled");
    }

    info!("initializing redis pool...");
    let redis_pool = RedisPool::new(RedisConfig::from_env()).await.map_err(|e| {
        error!("failed to initialize redis pool: {e}");
        e
    })?;

    let rate_limit_service = Arc::new(RateLimitService::new(redis_pool.clone()));

    let token_blacklist = Arc::new(TokenBlacklistService::new(redis_pool.clone()));
    let jwt_service = Arc::new(JwtService::from_secret(&config.jwt_secret, token_blacklist.clone())?);

    let oauth_client = Arc::new(GoogleOAuthClient::new(GoogleOAuthConfig {
        client_id: config.google_oauth_client_id.clone(),
        client_secret: config.google_oauth_client_secret.clone(),
        redirect_uri: config.google_oauth_redirect_uri.clone(),
    }));

    let iap_verifier: Arc<dyn IapVerifier> = Arc::new(GooglePlayIapVerifier::new(GooglePlayConfig {
        package_name: config.google_play_package_name.clone(),
        service_account_email: config.google_play_service_account_email.clone(),
        service_account_private_key_pem: config.google_play_service_account_private_key.clone(),
    }));
    let billing_service = Arc::new(BillingService::new(diesel_pool.clone(), iap_verifier));

    let embedding_provider: Arc<dyn noted_backend_core::services::EmbeddingProvider> =
        Arc::new(GeminiEmbeddingProvider::new(GeminiEmbeddingConfig {
            api_key: config.gemini_api_key.clone(),
        }));
    let vector_store_service = Arc::new(VectorStoreService::new(diesel_pool.clone(), embedding_provider));

    let ws_registry = Arc::new(WsRegistry::new());

    let gemini_client: Arc<dyn LlmClient> = Arc::new(GeminiAgentClient::new(GeminiConfig {
        api_key: config.gemini_api_key.clone(),
    }));
    let mut llm_clients: HashMap<String, Arc<dyn LlmClient>> = HashMap::new();
    llm_clients.insert("gemini".to_string(), gemini_client.clone());
    llm_clients.insert("google".to_string(), gemini_client);
    let llm_clients = Arc::new(llm_clients);

    let web_search = if config.google_cse_api_key.is_empty() || config.google_cse_id.is_empty() {
        info!("google cse not configured, web_search_with_rag tool disabled");
        None
    } else {
        Some(Arc::new(WebSearchRagTool::new(
            CseConfig {
                api_key: config.google_cse_api_key.clone(),
                cse_id: config.google_cse_id.clone(),
            },
            vector_store_service.clone(),
        )))
    };

    let chat_orchestrator = Arc::new(ChatOrchestrator::new(
        billing_service.clone(),
        vector_store_service.clone(),
        ws_registry.clone(),
        (*llm_clients).clone(),
        web_search,
    ));

    let app_state = AppState {
        config: Arc::new(config.clone()),
        diesel_pool: diesel_pool.clone(),
        redis_pool: redis_pool.clone(),
        max_connections,
        jwt_service,
        token_blacklist,
        oauth_client,
        rate_limit_service,
        billing_service,
        vector_store_service: vector_store_service.clone(),
        ws_registry: ws_registry.clone(),
        llm_clients,
        chat_orchestrator,
    };

    info!(
        "cors: {} environment, origins {:?}",
        config.environment, config.cors_allowed_origins
    );

    let mut app = Router::new().route("/v1/health", get(comprehensive_health_check));

    if config.enable_swagger_ui {
        info!("swagger ui enabled at /v1/docs");
        app = app
            .route("/v1/docs", get(docs_handlers::redirect_to_docs))
            .route("/v1/docs/", get(docs_handlers::serve_swagger_ui))
            .route("/v1/docs/openapi.json", get(docs_handlers::serve_openapi_spec));
    }

    let app = app
        .nest("/api/auth", auth_routes())
        .nest(
            "/api/billing",
            billing_routes().route_layer(axum_middleware::from_fn_with_state(
                app_state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/api",
            chat_routes().route_layer(axum_middleware::from_fn_with_state(
                app_state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/api/knowledge-base",
            knowledge_base_routes().route_layer(axum_middleware::from_fn_with_state(
                app_state.clone(),
                auth_middleware,
            )),
        )
        .route("/ws/{client_id}", get(websocket::ws_upgrade))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(noted_backend_core::middleware::cors::dynamic_cors_middleware)),
        )
        .with_state(app_state.clone());

    noted_backend_core::services::background_tasks::initialize_background_tasks(
        vector_store_service,
        ws_registry,
    );
    info!("background maintenance tasks started");

    let addr: SocketAddr = config.bind_address.parse()?;
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

async fn comprehensive_health_check(State(state): State<AppState>) -> impl IntoResponse {
    use serde_json::json;

    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    let postgres_health = match check_diesel_health(&state.diesel_pool).await {
        Ok(_) => json!({
            "status": "healthy",
            "max_connections": state.max_connections,
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            json!({ "status": "unhealthy", "error": format!("database connection failed: {e}") })
        },
    };

    let redis_health_result = state.redis_pool.health_check().await;
    if !redis_health_result.is_healthy {
        overall_healthy = false;
    }
    let redis_health = json!({
        "status": if redis_health_result.is_healthy { "healthy" } else { "unhealthy" },
        "latency_ms": redis_health_result.latency_ms,
        "active_connections": redis_health_result.active_connections,
        "total_connections": redis_health_result.total_connections,
        "error": redis_health_result.error,
    });

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "noted-backend-core",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "redis": redis_health,
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
