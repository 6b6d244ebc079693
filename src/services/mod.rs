// Services module: business logic layer for the application.

pub mod background_tasks;
pub mod billing;
pub mod command_extractor;
pub mod embeddings;
pub mod iap;
pub mod jwt;
pub mod llm;
pub mod oauth;
pub mod orchestrator;
pub mod rate_limit;
pub mod token_blacklist;
pub mod tools;
pub mod vector_store;

// Re-export commonly used services.
pub use background_tasks::BackgroundTaskManager;
pub use billing::{BalanceResponse, BillingError, BillingService};
pub use command_extractor::{extract_commands, LlmCommand, ToolCall};
pub use embeddings::{GeminiEmbeddingConfig, GeminiEmbeddingProvider};
pub use iap::{GooglePlayConfig, GooglePlayIapVerifier, IapError, IapVerifier};
pub use jwt::{JwtError, JwtService, TokenPair};
pub use llm::{GeminiAgentClient, GeminiConfig, LlmClient, LlmError, LlmMessage};
pub use oauth::{GoogleOAuthClient, GoogleOAuthConfig, OAuthError};
pub use orchestrator::{ChatOrchestrator, OrchestratorError};
pub use rate_limit::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimitService};
pub use token_blacklist::{TokenBlacklistError, TokenBlacklistService};
pub use vector_store::{EmbeddingProvider, VectorStoreError, VectorStoreService};
