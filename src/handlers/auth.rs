// Auth handlers (C2): per-device registration, Google OAuth, token
// lifecycle, and device management. §4.2 of the spec.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use diesel_async::AsyncConnection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        device::DeviceError,
        user::UserError,
        Credit, Device, OAuthState, User,
    },
    services::oauth,
    utils::ServiceError,
};

fn client_ip(addr: &SocketAddr) -> String {
    addr.ip().to_string()
}

/// Collapses `UserError`/`DeviceError`/bare diesel errors so the
/// user-lookup-or-create and device-lookup-or-create steps in
/// `google_callback` can run as one `conn.transaction(...)` closure with a
/// single error type.
#[derive(Error, Debug)]
enum CallbackDbError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("could not allocate a unique user id")]
    IdGenerationExhausted,
}

impl From<UserError> for CallbackDbError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::Database(e) => CallbackDbError::Database(e),
            UserError::NotFound => CallbackDbError::Database(diesel::result::Error::NotFound),
            UserError::IdGenerationExhausted(_) => CallbackDbError::IdGenerationExhausted,
        }
    }
}

impl From<DeviceError> for CallbackDbError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::Database(e) => CallbackDbError::Database(e),
            DeviceError::NotFound => CallbackDbError::Database(diesel::result::Error::NotFound),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub device_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub is_new_user: bool,
    pub message: &'static str,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// `POST /api/auth/register {device_id}`. Rate-limited at 10/min/IP (§6).
/// Idempotent: a known device is just logged in again under its existing
/// owner; an unknown device mints a fresh user, credit row, and device row
/// in one transaction.
pub async fn register(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, ServiceError> {
    let ip = client_ip(&addr);
    let limit = app_state
        .rate_limit_service
        .check_rate_limit(&ip, "/api/auth/register")
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    if !limit.allowed {
        return Err(ServiceError::TooManyRequests {
            retry_after_seconds: limit.retry_after.unwrap_or(60),
        });
    }

    let mut conn = app_state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let existing_device = Device::find_by_id(&mut conn, payload.device_id)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let (user_id, is_new_user) = match existing_device {
        Some(device) => {
            Device::touch_login(&mut conn, payload.device_id, &device.user_id)
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            (device.user_id, false)
        },
        None => {
            let user = User::create(&mut conn, None, None, None, None)
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            Credit::create_if_missing(&mut conn, &user.user_id).await?;
            Device::create(&mut conn, payload.device_id, &user.user_id)
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            (user.user_id, true)
        },
    };

    let pair = app_state
        .jwt_service
        .issue_pair(&user_id, &payload.device_id.to_string())?;

    Ok(Json(RegisterResponse {
        user_id,
        is_new_user,
        message: if is_new_user { "registered" } else { "welcome back" },
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub device_id: Uuid,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: String,
    pub message: &'static str,
}

/// `POST /api/auth/verify {device_id, user_id}` (§4.2.6). A missing device
/// is a 404; a `user_id` mismatch is logged as a potential-takeover security
/// event and heals the caller by returning the server's own `user_id` rather
/// than hard-failing.
pub async fn verify(
    State(app_state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ServiceError> {
    let mut conn = app_state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let device = Device::find_by_id(&mut conn, payload.device_id)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .ok_or_else(|| ServiceError::NotFound("device".to_string()))?;

    if device.user_id != payload.user_id {
        warn!(
            device_id = %payload.device_id,
            claimed_user_id = %payload.user_id,
            server_user_id = %device.user_id,
            "potential device takeover: user_id mismatch on verify"
        );
        return Ok(Json(VerifyResponse {
            valid: false,
            user_id: device.user_id,
            message: "device bound to a different user",
        }));
    }

    Ok(Json(VerifyResponse {
        valid: true,
        user_id: device.user_id,
        message: "ok",
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /api/auth/refresh {refresh_token}`.
pub async fn refresh_token(
    State(app_state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>, ServiceError> {
    let pair = app_state.jwt_service.refresh(&payload.refresh_token).await?;
    Ok(Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: &'static str,
}

/// `POST /api/auth/logout {access_token, refresh_token}` (§4.2.7). Both
/// tokens are blacklisted for their remaining TTL so a copy taken before
/// logout cannot be replayed even though it still verifies cryptographically.
pub async fn logout(
    State(app_state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, ServiceError> {
    app_state
        .jwt_service
        .logout(&payload.access_token, &payload.refresh_token)
        .await?;
    Ok(Json(LogoutResponse {
        success: true,
        message: "logged out",
    }))
}

#[derive(Debug, Deserialize)]
pub struct GoogleAuthStartRequest {
    pub device_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct GoogleAuthStartResponse {
    pub auth_url: String,
    pub state: String,
}

/// `POST /api/auth/google/start {device_id}` (§4.2.5 step 1).
pub async fn google_auth_start(
    State(app_state): State<AppState>,
    Json(payload): Json<GoogleAuthStartRequest>,
) -> Result<Json<GoogleAuthStartResponse>, ServiceError> {
    let mut conn = app_state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let state = oauth::generate_state();
    OAuthState::create(&mut conn, state.clone(), payload.device_id)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let auth_url = app_state.oauth_client.authorization_url(&state);
    Ok(Json(GoogleAuthStartResponse { auth_url, state }))
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

const DEEP_LINK_SCHEME: &str = "notedapp://auth/callback";

fn error_redirect(code: &str) -> Response {
    let url = format!("{DEEP_LINK_SCHEME}?error={code}");
    let html = format!(
        "<!doctype html><html><head><meta http-equiv=\"refresh\" content=\"0;url={url}\"></head>\
         <body><script>window.location.replace({url:?});</script>\
         <p>Sign-in failed ({code}). <a href=\"{url}\">Continue</a>.</p></body></html>"
    );
    (axum::http::StatusCode::OK, Html(html)).into_response()
}

/// `GET /api/auth/google/callback?code&state[&error]` (§4.2.5 step 2).
/// On success, returns an HTTP 307 to the app's deep link carrying the token
/// pair; on any failure, a fallback HTML page redirects client-side after a
/// short delay, carrying a coarse `error=` code instead (§4.2.8).
pub async fn google_callback(
    State(app_state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Response {
    if query.error.is_some() {
        return error_redirect("oauth_denied");
    }

    let (Some(code), Some(state)) = (query.code, query.state) else {
        return error_redirect("missing_params");
    };

    let mut conn = match app_state.diesel_pool.get().await {
        Ok(conn) => conn,
        Err(_) => return error_redirect("internal_error"),
    };

    let oauth_state = match OAuthState::consume(&mut conn, &state).await {
        Ok(Some(s)) => s,
        Ok(None) => return error_redirect("invalid_state"),
        Err(_) => return error_redirect("internal_error"),
    };

    let token_response = match app_state.oauth_client.exchange_code(&code).await {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "google token exchange failed");
            return error_redirect("token_exchange_failed");
        },
    };

    let userinfo = match app_state.oauth_client.fetch_userinfo(&token_response.access_token).await {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "google userinfo fetch failed");
            return error_redirect("userinfo_failed");
        },
    };

    // §4.2.5 step 2: user lookup-or-create, device lookup-or-create/touch,
    // all inside one transaction so a crash between steps can never leave an
    // orphaned user row with no device (mirrors `billing.rs`'s
    // `conn.transaction(...)` usage for purchase/allocate/consume).
    let device_id = oauth_state.device_id;
    let google_id = userinfo.id.clone();
    let email = userinfo.email.clone();
    let display_name = userinfo.name.clone();
    let profile_picture_url = userinfo.picture.clone();

    let txn_result = conn
        .transaction::<User, CallbackDbError, _>(|conn| {
            Box::pin(async move {
                let existing_user = User::find_by_google_id(conn, &google_id).await?;

                let user = match existing_user {
                    Some(user) => {
                        let changes = crate::models::user::UserUpdate {
                            email: Some(email.clone()),
                            display_name: display_name.clone(),
                            profile_picture_url: profile_picture_url.clone(),
                        };
                        User::update(conn, &user.user_id, changes).await?
                    },
                    None => {
                        let created = User::create(
                            conn,
                            Some(google_id.clone()),
                            Some(email.clone()),
                            display_name.clone(),
                            profile_picture_url.clone(),
                        )
                        .await?;
                        Credit::create_if_missing(conn, &created.user_id).await?;
                        created
                    },
                };

                let device = Device::find_by_id(conn, device_id).await?;
                match device {
                    Some(device) if device.user_id != user.user_id => {
                        warn!(
                            device_id = %device_id,
                            previous_user_id = %device.user_id,
                            new_user_id = %user.user_id,
                            "device reassigned to a different user via google oauth"
                        );
                        Device::touch_login(conn, device_id, &user.user_id).await?;
                    },
                    Some(_) => {
                        Device::touch_login(conn, device_id, &user.user_id).await?;
                    },
                    None => {
                        Device::create(conn, device_id, &user.user_id).await?;
                    },
                }

                Ok(user)
            })
        })
        .await;

    let user = match txn_result {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "oauth callback transaction failed");
            return error_redirect("internal_error");
        },
    };

    let pair = match app_state
        .jwt_service
        .issue_pair(&user.user_id, &oauth_state.device_id.to_string())
    {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "token issuance failed during oauth callback");
            return error_redirect("internal_error");
        },
    };

    let url = format!(
        "{DEEP_LINK_SCHEME}?access_token={}&refresh_token={}&user_id={}",
        pair.access_token, pair.refresh_token, user.user_id
    );
    Redirect::temporary(&url).into_response()
}

#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub device_id: Uuid,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_login_at: chrono::DateTime<chrono::Utc>,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            device_id: device.device_id,
            device_name: device.device_name,
            device_type: device.device_type,
            is_active: device.is_active,
            created_at: device.created_at,
            last_login_at: device.last_login_at,
        }
    }
}

/// `GET /api/auth/devices` — authenticated.
pub async fn list_devices(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<DeviceResponse>>, ServiceError> {
    let mut conn = app_state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let devices = Device::list_for_user(&mut conn, &user.user_id)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    Ok(Json(devices.into_iter().map(DeviceResponse::from).collect()))
}

/// `DELETE /api/auth/devices/{device_id}` — authenticated; 403 if the caller
/// does not own the device.
pub async fn delete_device(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(device_id): Path<Uuid>,
) -> Result<Json<LogoutResponse>, ServiceError> {
    let mut conn = app_state
        .diesel_pool
        .get()
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let disabled = Device::soft_disable(&mut conn, device_id, &user.user_id)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    if !disabled {
        return Err(ServiceError::Forbidden("not the owner of this device".to_string()));
    }

    Ok(Json(LogoutResponse {
        success: true,
        message: "device disabled",
    }))
}
