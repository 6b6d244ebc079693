// Google Play In-App Purchase receipt verification (§4.3.1 step 1). Isolated
// behind a trait the same way `EmbeddingProvider`/`LlmClient` isolate their
// vendors, so `BillingService` and its tests can swap in a fake rather than
// calling out to Google Play. Grounded on
// `billing/infrastructure/external/iap_verifier.py`'s service-account JWT
// bearer exchange and `purchases().products().get(...)` call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const PURCHASE_STATE_PURCHASED: i64 = 0;
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

#[derive(Error, Debug)]
pub enum IapError {
    #[error("receipt verification failed: {0}")]
    Verification(String),

    #[error("purchase is not in the purchased state (purchaseState={0})")]
    NotPurchased(i64),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GooglePlayConfig {
    pub package_name: String,
    pub service_account_email: String,
    pub service_account_private_key_pem: String,
}

#[derive(Debug, Deserialize)]
struct ProductPurchase {
    #[serde(rename = "purchaseState")]
    purchase_state: i64,
    #[serde(rename = "orderId", default)]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// §4.3.1 steps 1 and 4: verify a receipt before crediting the account, and
/// (best-effort) acknowledge a verified purchase afterwards so Google Play
/// doesn't auto-refund an un-acknowledged consumable.
#[async_trait]
pub trait IapVerifier: Send + Sync {
    async fn verify_purchase(&self, product_id: &str, purchase_token: &str) -> Result<(), IapError>;

    /// A failure here is logged, never surfaced — the caller has already
    /// credited the user by the time this runs.
    async fn acknowledge_purchase(&self, product_id: &str, purchase_token: &str);
}

pub struct GooglePlayIapVerifier {
    config: GooglePlayConfig,
    http: reqwest::Client,
}

impl GooglePlayIapVerifier {
    pub fn new(config: GooglePlayConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }

    /// A self-signed JWT bearer assertion exchanged for a short-lived OAuth2
    /// access token, the standard Google service-account flow (no interactive
    /// user consent, unlike the `oauth.rs` authorization-code flow).
    fn signed_assertion(&self) -> Result<String, IapError> {
        use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: self.config.service_account_email.clone(),
            scope: ANDROID_PUBLISHER_SCOPE.to_string(),
            aud: GOOGLE_TOKEN_ENDPOINT.to_string(),
            iat: now,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.config.service_account_private_key_pem.as_bytes())
            .map_err(|e| IapError::Verification(format!("invalid service account key: {e}")))?;

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| IapError::Verification(format!("assertion signing failed: {e}")))
    }

    async fn access_token(&self) -> Result<String, IapError> {
        let assertion = self.signed_assertion()?;
        let response = self
            .http
            .post(GOOGLE_TOKEN_ENDPOINT)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IapError::Verification(format!(
                "service account token exchange failed ({status}): {body}"
            )));
        }

        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    fn purchase_url(&self, product_id: &str, purchase_token: &str) -> String {
        format!(
            "https://androidpublisher.googleapis.com/androidpublisher/v3/applications/{}/purchases/products/{}/tokens/{}",
            self.config.package_name, product_id, purchase_token
        )
    }
}

#[async_trait]
impl IapVerifier for GooglePlayIapVerifier {
    async fn verify_purchase(&self, product_id: &str, purchase_token: &str) -> Result<(), IapError> {
        let access_token = self.access_token().await?;

        let response = self
            .http
            .get(self.purchase_url(product_id, purchase_token))
            .bearer_auth(&access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IapError::Verification(format!(
                "play developer api returned {status}: {body}"
            )));
        }

        let purchase = response.json::<ProductPurchase>().await?;
        if purchase.purchase_state != PURCHASE_STATE_PURCHASED {
            return Err(IapError::NotPurchased(purchase.purchase_state));
        }

        info!(product_id, order_id = ?purchase.order_id, "iap purchase verified");
        Ok(())
    }

    async fn acknowledge_purchase(&self, product_id: &str, purchase_token: &str) {
        let access_token = match self.access_token().await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, product_id, "iap acknowledge: could not obtain access token");
                return;
            },
        };

        let url = format!("{}:acknowledge", self.purchase_url(product_id, purchase_token));
        if let Err(e) = self.http.post(&url).bearer_auth(&access_token).send().await {
            warn!(error = %e, product_id, "iap acknowledge request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub struct FakeIapVerifier {
        pub accept: bool,
    }

    #[async_trait]
    impl IapVerifier for FakeIapVerifier {
        async fn verify_purchase(&self, _product_id: &str, _purchase_token: &str) -> Result<(), IapError> {
            if self.accept {
                Ok(())
            } else {
                Err(IapError::NotPurchased(1))
            }
        }

        async fn acknowledge_purchase(&self, _product_id: &str, _purchase_token: &str) {}
    }

    #[tokio::test]
    async fn fake_verifier_rejects_when_configured_to() {
        let verifier = FakeIapVerifier { accept: false };
        assert!(matches!(
            verifier.verify_purchase("token_300", "tok").await,
            Err(IapError::NotPurchased(1))
        ));
    }

    #[tokio::test]
    async fn fake_verifier_accepts_when_configured_to() {
        let verifier = FakeIapVerifier { accept: true };
        assert!(verifier.verify_purchase("token_300", "tok").await.is_ok());
    }
}
