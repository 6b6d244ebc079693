// Billing handlers (C3): credit balance, IAP purchase, allocation, and
// consumption. §6 — all routes authenticated.

use axum::{extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    services::billing::{AllocationRequest, BalanceResponse},
    utils::ServiceError,
};

/// `GET /api/billing/balance`.
pub async fn balance(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BalanceResponse>, ServiceError> {
    let response = app_state.billing_service.balance(&user.user_id).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub product_id: String,
    pub purchase_token: String,
    pub credits_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub new_balance: i64,
}

/// `POST /api/billing/purchase {product_id, purchase_token, credits_amount}`.
/// `purchase_token` doubles as the idempotency key (`iap_transaction_id`);
/// a repeated purchase with the same token fails with `DUPLICATE_TRANSACTION`
/// (409). Rate-limited per user — each call makes an outbound receipt
/// verification request to the store API.
pub async fn purchase(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ServiceError> {
    let limit = app_state
        .rate_limit_service
        .check_rate_limit(&user.user_id, "/api/billing/purchase")
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    if !limit.allowed {
        return Err(ServiceError::TooManyRequests {
            retry_after_seconds: limit.retry_after.unwrap_or(60),
        });
    }

    let new_balance = app_state
        .billing_service
        .purchase(
            &user.user_id,
            &payload.product_id,
            &payload.purchase_token,
            payload.credits_amount,
            serde_json::json!({ "product_id": payload.product_id }),
        )
        .await?;

    Ok(Json(PurchaseResponse {
        success: true,
        new_balance,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub allocations: Vec<AllocationRequest>,
}

#[derive(Debug, Serialize)]
pub struct AllocateResponse {
    pub success: bool,
}

/// `POST /api/billing/allocate {allocations:[{model_id,credits},…]}`.
pub async fn allocate(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AllocateRequest>,
) -> Result<Json<AllocateResponse>, ServiceError> {
    app_state
        .billing_service
        .allocate(&user.user_id, payload.allocations)
        .await?;
    Ok(Json(AllocateResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    pub model_id: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub success: bool,
    pub remaining_tokens: i64,
}

/// `POST /api/billing/consume {model_id, input_tokens, output_tokens}`.
pub async fn consume(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, ServiceError> {
    let remaining_tokens = app_state
        .billing_service
        .consume(
            &user.user_id,
            &payload.model_id,
            payload.input_tokens,
            payload.output_tokens,
        )
        .await?;

    Ok(Json(ConsumeResponse {
        success: true,
        remaining_tokens,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_transactions_limit")]
    pub limit: i64,
}

fn default_transactions_limit() -> i64 {
    100
}

/// `GET /api/billing/transactions?limit=100` — newest-first.
pub async fn transactions(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<crate::models::Transaction>>, ServiceError> {
    let rows = app_state
        .billing_service
        .transactions(&user.user_id, query.limit)
        .await?;
    Ok(Json(rows))
}

/// `GET /api/billing/pricing` → `{model_id:{price_per_m_token, category},…}`.
pub async fn pricing(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<std::collections::HashMap<String, crate::services::billing::PricingInfo>>, ServiceError> {
    let rows = app_state.billing_service.pricing().await?;
    Ok(Json(rows))
}
