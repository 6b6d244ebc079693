// JWT claim shapes shared between access and refresh tokens.
//
// `sub` is the user id, `device_id` scopes the token to one device, and `typ`
// lets verification reject a refresh token presented where an access token is
// expected (and vice versa) — a mismatch is a security event, not a silent no-op.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub device_id: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp <= chrono::Utc::now().timestamp()
    }
}

impl RefreshTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp <= chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_claims_round_trip_with_five_fields() {
        let claims = AccessTokenClaims {
            sub: "user_abc123def".to_string(),
            device_id: uuid::Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
            iat: 1_700_000_000,
            exp: 1_700_001_800,
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 5);
        assert_eq!(json["type"], "access");

        let decoded: AccessTokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn refresh_claims_reject_wrong_type_label() {
        let claims = RefreshTokenClaims {
            sub: "user_abc123def".to_string(),
            device_id: uuid::Uuid::new_v4().to_string(),
            token_type: TokenType::Refresh,
            iat: 1_700_000_000,
            exp: 1_702_592_000,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "refresh");
    }

    #[test]
    fn expiry_check_uses_current_time() {
        let expired = AccessTokenClaims {
            sub: "user_abc123def".to_string(),
            device_id: uuid::Uuid::new_v4().to_string(),
            token_type: TokenType::Access,
            iat: 0,
            exp: 1,
        };
        assert!(expired.is_expired());
    }
}
