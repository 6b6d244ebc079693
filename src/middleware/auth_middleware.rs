// Validates the bearer access token and injects `AuthenticatedUser` into
// request extensions. Every failure mode — bad signature, expiry, wrong
// token type, blacklisted token, missing header — collapses to the same
// opaque 401; §4.2.8 of the spec requires callers never learn which check
// failed.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{app::AppState, middleware::auth::AuthenticatedUser};

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": "Unauthorized",
                "details": null,
            }
        })),
    )
        .into_response()
}

pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return unauthorized(),
    };

    match app_state.jwt_service.verify_access_token(token).await {
        Ok(claims) => {
            request.extensions_mut().insert(AuthenticatedUser {
                user_id: claims.sub,
                device_id: claims.device_id,
            });
            next.run(request).await
        },
        Err(e) => {
            tracing::warn!(error = %e, "access token verification failed");
            unauthorized()
        },
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(unauthorized)
    }
}
