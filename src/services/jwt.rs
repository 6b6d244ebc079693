// Per-device JWT issuance and verification. Symmetric HS256, one shared
// secret for access and refresh tokens (the claims' `type` field is what
// keeps the two token kinds from being interchangeable, not separate keys).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::auth::{AccessTokenClaims, RefreshTokenClaims, TokenType};
use crate::services::token_blacklist::{TokenBlacklistError, TokenBlacklistService};

pub const ACCESS_TOKEN_MINUTES: i64 = 30;
pub const REFRESH_TOKEN_DAYS: i64 = 30;

/// Secrets that must never be accepted as a production JWT key. Matching
/// against a denylist rather than "is it random enough" catches the common
/// mistake of shipping a placeholder from an example `.env` file.
const WEAK_KEY_DENYLIST: &[&str] = &[
    "secret",
    "changeme",
    "change-me",
    "your-secret-key",
    "your-256-bit-secret",
    "development",
    "insecure",
    "test-secret",
    "jwt-secret",
    "password",
];

const MIN_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("jwt secret key is too short (minimum {MIN_SECRET_LEN} bytes)")]
    WeakSecret,

    #[error("jwt secret key matches a known-weak value")]
    DenylistedSecret,

    #[error("token encoding failed: {0}")]
    Encoding(String),

    #[error("token is invalid")]
    InvalidToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("token type mismatch")]
    WrongTokenType,

    #[error("token is blacklisted")]
    Blacklisted,

    #[error(transparent)]
    Blacklist(#[from] TokenBlacklistError),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm => JwtError::InvalidToken,
            _ => JwtError::Encoding(err.to_string()),
        }
    }
}

fn check_secret_strength(secret: &str) -> Result<(), JwtError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(JwtError::WeakSecret);
    }
    let lowered = secret.to_lowercase();
    if WEAK_KEY_DENYLIST.iter().any(|weak| lowered.contains(weak)) {
        return Err(JwtError::DenylistedSecret);
    }
    Ok(())
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    blacklist: Arc<TokenBlacklistService>,
}

pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl JwtService {
    /// Loads `JWT_SECRET_KEY` from the environment (a real deployment would
    /// consult a secret manager first and fall back to the env var; that
    /// lookup happens at the composition root, not here). Refuses to build
    /// if the key is weak — the process should not start.
    pub fn from_secret(secret: &str, blacklist: Arc<TokenBlacklistService>) -> Result<Self, JwtError> {
        check_secret_strength(secret)?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            blacklist,
        })
    }

    fn validation() -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.required_spec_claims.clear();
        v
    }

    pub fn issue_access_token(&self, user_id: &str, device_id: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            device_id: device_id.to_string(),
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(ACCESS_TOKEN_MINUTES)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    pub fn issue_refresh_token(&self, user_id: &str, device_id: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = RefreshTokenClaims {
            sub: user_id.to_string(),
            device_id: device_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: (now + Duration::days(REFRESH_TOKEN_DAYS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    pub fn issue_pair(&self, user_id: &str, device_id: &str) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id, device_id)?,
            refresh_token: self.issue_refresh_token(user_id, device_id)?,
        })
    }

    /// Decodes and validates signature + expiry only; does not check `type`
    /// or the blacklist. Used internally by the typed verify methods.
    fn decode_unchecked<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
    ) -> Result<T, JwtError> {
        let data = decode::<T>(token, &self.decoding_key, &Self::validation())?;
        Ok(data.claims)
    }

    /// Verifies an access token: signature, expiry, `type == access`, and
    /// blacklist membership. All four failure modes collapse to the same
    /// `JwtError` variant family so callers never learn which check failed —
    /// the HTTP layer maps everything here to an opaque 401.
    pub async fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let claims: AccessTokenClaims = self.decode_unchecked(token)?;
        if claims.token_type != TokenType::Access {
            warn!(sub = %claims.sub, "jwt type mismatch: refresh token presented as access");
            return Err(JwtError::WrongTokenType);
        }
        if self.blacklist.is_blacklisted(token).await? {
            return Err(JwtError::Blacklisted);
        }
        Ok(claims)
    }

    pub async fn verify_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, JwtError> {
        let claims: RefreshTokenClaims = self.decode_unchecked(token)?;
        if claims.token_type != TokenType::Refresh {
            warn!(sub = %claims.sub, "jwt type mismatch: access token presented as refresh");
            return Err(JwtError::WrongTokenType);
        }
        if self.blacklist.is_blacklisted(token).await? {
            return Err(JwtError::Blacklisted);
        }
        Ok(claims)
    }

    /// Mints a fresh access/refresh pair from a valid refresh token and
    /// blacklists the consumed refresh token (rotation) so it cannot be
    /// replayed even though it hasn't reached its own `exp` yet.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, JwtError> {
        let claims = self.verify_refresh_token(refresh_token).await?;
        let pair = self.issue_pair(&claims.sub, &claims.device_id)?;
        let remaining = Duration::seconds((claims.exp - Utc::now().timestamp()).max(1));
        self.blacklist.add(refresh_token, remaining).await?;
        Ok(pair)
    }

    /// Revokes both tokens so a copy captured before logout cannot be reused
    /// even though it still verifies cryptographically.
    pub async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), JwtError> {
        for (token, exp) in [
            (access_token, self.decode_unchecked::<AccessTokenClaims>(access_token).ok().map(|c| c.exp)),
            (refresh_token, self.decode_unchecked::<RefreshTokenClaims>(refresh_token).ok().map(|c| c.exp)),
        ] {
            if let Some(exp) = exp {
                let remaining = Duration::seconds((exp - Utc::now().timestamp()).max(1));
                self.blacklist.add(token, remaining).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_secret() {
        assert!(matches!(
            check_secret_strength("short"),
            Err(JwtError::WeakSecret)
        ));
    }

    #[test]
    fn rejects_denylisted_secret() {
        let padded = format!("{:-<40}", "changeme");
        assert!(matches!(
            check_secret_strength(&padded),
            Err(JwtError::DenylistedSecret)
        ));
    }

    #[test]
    fn accepts_strong_secret() {
        assert!(
            check_secret_strength("a-sufficiently-long-random-looking-secret-value-000").is_ok()
        );
    }

    // Encode/decode and blacklist round trips need a running Redis instance
    // (`TokenBlacklistService` has no in-memory fake) and are covered by the
    // integration suite rather than here.
}
