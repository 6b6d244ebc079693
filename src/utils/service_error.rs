// Error kinds returned to clients as {"error": {"code", "message", "details"}}.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient balance")]
    InsufficientBalance { max_allowed: Option<i64> },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Duplicate transaction")]
    DuplicateTransaction,

    #[error("Credit account not found")]
    CreditNotFound,

    #[error("Too many requests")]
    TooManyRequests { retry_after_seconds: u32 },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::InsufficientBalance { .. } => "BILLING_INSUFFICIENT_BALANCE",
            ServiceError::InvalidAmount(_) => "BILLING_INVALID_AMOUNT",
            ServiceError::DuplicateTransaction => "BILLING_DUPLICATE_TRANSACTION",
            ServiceError::CreditNotFound => "BILLING_CREDIT_NOT_FOUND",
            ServiceError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            ServiceError::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            ServiceError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            ServiceError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            ServiceError::DuplicateTransaction => StatusCode::CONFLICT,
            ServiceError::CreditNotFound => StatusCode::NOT_FOUND,
            ServiceError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Unauthorized is intentionally opaque: callers never learn which check failed.
    fn message(&self) -> String {
        match self {
            ServiceError::Unauthorized => "Unauthorized".to_string(),
            ServiceError::Internal(_) if crate::app_config::config().is_production() => {
                "Internal server error".to_string()
            },
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        if crate::app_config::config().is_production() {
            return None;
        }
        match self {
            ServiceError::InsufficientBalance {
                max_allowed: Some(max),
            } => Some(json!({ "max_allowed": max })),
            ServiceError::TooManyRequests { retry_after_seconds } => {
                Some(json!({ "retry_after_seconds": retry_after_seconds }))
            },
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            ServiceError::TooManyRequests { retry_after_seconds } => Some(*retry_after_seconds),
            _ => None,
        };
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
                "details": self.details(),
            }
        }));
        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ServiceError::NotFound("resource".to_string()),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => ServiceError::Conflict("duplicate record".to_string()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(error: redis::RedisError) -> Self {
        ServiceError::Internal(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::Validation(error.to_string())
    }
}

impl From<crate::services::jwt::JwtError> for ServiceError {
    fn from(_: crate::services::jwt::JwtError) -> Self {
        ServiceError::Unauthorized
    }
}

impl From<crate::services::billing::BillingError> for ServiceError {
    fn from(error: crate::services::billing::BillingError) -> Self {
        use crate::services::billing::BillingError as B;
        match error {
            B::InsufficientBalance { max_allowed } => {
                ServiceError::InsufficientBalance { max_allowed }
            },
            B::InvalidAmount(msg) => ServiceError::InvalidAmount(msg),
            B::DuplicateTransaction => ServiceError::DuplicateTransaction,
            B::CreditNotFound => ServiceError::CreditNotFound,
            B::UnknownModel(model) => ServiceError::Validation(format!("unknown model: {model}")),
            B::CategoryCapExceeded { max_allowed, .. } => ServiceError::InsufficientBalance {
                max_allowed: Some(max_allowed),
            },
            B::Database(e) => ServiceError::from(e),
            B::Pool(e) => ServiceError::Internal(e),
        }
    }
}

impl From<crate::services::vector_store::VectorStoreError> for ServiceError {
    fn from(error: crate::services::vector_store::VectorStoreError) -> Self {
        use crate::services::vector_store::VectorStoreError as V;
        match error {
            V::CollectionNotFound(name) => {
                ServiceError::NotFound(format!("collection '{name}' not found"))
            },
            V::Database(e) => ServiceError::from(e),
            V::Embedding(msg) => ServiceError::ExternalService(msg),
        }
    }
}

impl From<crate::services::orchestrator::OrchestratorError> for ServiceError {
    fn from(error: crate::services::orchestrator::OrchestratorError) -> Self {
        use crate::services::orchestrator::OrchestratorError as O;
        match error {
            O::Llm(msg) => ServiceError::ExternalService(msg),
            O::Billing(e) => ServiceError::from(e),
            O::Database(e) => ServiceError::from(e),
            O::InvalidRequest(msg) => ServiceError::Validation(msg),
        }
    }
}

impl From<crate::ws::WsError> for ServiceError {
    fn from(error: crate::ws::WsError) -> Self {
        use crate::ws::WsError as W;
        match error {
            W::NotConnected => ServiceError::ExternalService("client not connected".to_string()),
            W::Timeout => ServiceError::ExternalService("client request timed out".to_string()),
            W::Disconnected => {
                ServiceError::ExternalService("client disconnected before responding".to_string())
            },
            W::Remote(msg) => ServiceError::ExternalService(msg),
        }
    }
}
