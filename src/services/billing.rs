// Billing engine (C3) — credits are prepaid yen; tokens are the per-model
// unit LLM calls actually consume. Allocation is the one-way conversion
// between them; purchase, allocate, and consume are each one DB transaction
// with `SELECT ... FOR UPDATE` on the rows they mutate, grounded on
// `billing_service.py`'s cap-check-then-upsert / decrement-then-ledger shape.

use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::credit::Credit;
use crate::models::pricing::{Pricing, PricingCategory};
use crate::models::token_balance::TokenBalance;
use crate::models::transaction::{NewTransaction, Transaction, TransactionType};
use crate::services::iap::{IapError, IapVerifier};
use crate::DbPool;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("insufficient token balance")]
    InsufficientBalance { max_allowed: Option<i64> },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("duplicate transaction")]
    DuplicateTransaction,

    #[error("credit account not found")]
    CreditNotFound,

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("receipt verification failed: {0}")]
    ReceiptVerificationFailed(String),

    #[error("category cap exceeded for {category}")]
    CategoryCapExceeded { category: String, max_allowed: i64 },

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("pool error: {0}")]
    Pool(String),
}

impl From<IapError> for BillingError {
    fn from(error: IapError) -> Self {
        BillingError::ReceiptVerificationFailed(error.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub credits: i64,
    pub allocated_tokens: HashMap<String, i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationRequest {
    pub model_id: String,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingInfo {
    pub price_per_m_token: i64,
    pub category: String,
}

pub struct BillingService {
    pool: DbPool,
    iap_verifier: Arc<dyn IapVerifier>,
}

impl BillingService {
    pub fn new(pool: DbPool, iap_verifier: Arc<dyn IapVerifier>) -> Self {
        Self { pool, iap_verifier }
    }

    pub async fn balance(&self, user_id: &str) -> Result<BalanceResponse, BillingError> {
        let mut conn = self.pool.get().await.map_err(|e| BillingError::Pool(e.to_string()))?;

        let credits = Credit::find(&mut conn, user_id).await?.map(|c| c.credits).unwrap_or(0);
        let balances = TokenBalance::list_for_user(&mut conn, user_id).await?;

        Ok(BalanceResponse {
            credits,
            allocated_tokens: balances
                .into_iter()
                .map(|b| (b.model_id, b.allocated_tokens))
                .collect(),
        })
    }

    pub async fn pricing(&self) -> Result<HashMap<String, PricingInfo>, BillingError> {
        let mut conn = self.pool.get().await.map_err(|e| BillingError::Pool(e.to_string()))?;
        let rows = Pricing::list_all(&mut conn).await?;
        Ok(rows
            .into_iter()
            .map(|p| {
                (
                    p.model_id.clone(),
                    PricingInfo {
                        price_per_m_token: p.price_per_m_token,
                        category: p.category,
                    },
                )
            })
            .collect())
    }

    pub async fn transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Transaction>, BillingError> {
        let mut conn = self.pool.get().await.map_err(|e| BillingError::Pool(e.to_string()))?;
        Ok(Transaction::list_for_user(&mut conn, user_id, limit).await?)
    }

    /// §4.3.1. Verifies the receipt with the store API first (step 1) — a
    /// purchase not in the `purchased` state is rejected before anything is
    /// written. The sole idempotency key thereafter is `iap_transaction_id`;
    /// a consumable IAP lets the same `product_id` be bought repeatedly.
    /// Acknowledgement (step 4) runs after commit and is best-effort: a
    /// failure there is logged, never surfaced — the user must not lose the
    /// credit they were already granted.
    pub async fn purchase(
        &self,
        user_id: &str,
        product_id: &str,
        iap_transaction_id: &str,
        credits_amount: i64,
        metadata: serde_json::Value,
    ) -> Result<i64, BillingError> {
        if credits_amount <= 0 {
            return Err(BillingError::InvalidAmount(
                "credits_amount must be positive".to_string(),
            ));
        }

        self.iap_verifier.verify_purchase(product_id, iap_transaction_id).await?;

        let mut conn = self.pool.get().await.map_err(|e| BillingError::Pool(e.to_string()))?;
        let user_id = user_id.to_string();
        let iap_id = iap_transaction_id.to_string();

        let new_balance = conn
            .transaction::<i64, BillingError, _>(|conn| {
                Box::pin(async move {
                    if Transaction::find_by_iap_id(conn, &iap_id).await?.is_some() {
                        return Err(BillingError::DuplicateTransaction);
                    }

                    let new_credit = Credit::add(conn, &user_id, credits_amount).await?;

                    Transaction::record(
                        conn,
                        NewTransaction {
                            user_id: user_id.clone(),
                            transaction_type: TransactionType::Purchase.as_str().to_string(),
                            amount: credits_amount,
                            model_id: None,
                            iap_transaction_id: Some(iap_id.clone()),
                            metadata: Some(metadata),
                        },
                    )
                    .await?;

                    Ok(new_credit.credits)
                })
            })
            .await?;

        self.iap_verifier.acknowledge_purchase(product_id, iap_transaction_id).await;

        Ok(new_balance)
    }

    /// §4.3.2. Each item's category total (existing + newly allocated tokens
    /// across every model in that category) must stay under
    /// `TOKEN_CAPACITY_LIMITS`; the first offending item aborts the whole
    /// batch with enough detail for the UI to suggest a maximum allocation.
    pub async fn allocate(
        &self,
        user_id: &str,
        allocations: Vec<AllocationRequest>,
    ) -> Result<(), BillingError> {
        if allocations.is_empty() {
            return Err(BillingError::InvalidAmount("no allocations given".to_string()));
        }

        let mut conn = self.pool.get().await.map_err(|e| BillingError::Pool(e.to_string()))?;
        let user_id = user_id.to_string();

        conn.transaction::<(), BillingError, _>(|conn| {
            Box::pin(async move {
                let credit = Credit::find_for_update(conn, &user_id)
                    .await?
                    .ok_or(BillingError::CreditNotFound)?;

                let total_credits: i64 = allocations.iter().map(|a| a.credits).sum();
                if total_credits > credit.credits {
                    return Err(BillingError::InsufficientBalance {
                        max_allowed: Some(credit.credits),
                    });
                }

                let model_ids: Vec<String> =
                    allocations.iter().map(|a| a.model_id.clone()).collect();
                let pricings = Pricing::list_for_models(conn, &model_ids).await?;
                let pricing_by_model: HashMap<&str, &Pricing> =
                    pricings.iter().map(|p| (p.model_id.as_str(), p)).collect();

                // Locks every TokenBalance row this user owns, not just the
                // batch's target models: the category-cap check below must
                // see every same-category model, including ones this batch
                // never touches.
                TokenBalance::list_for_update(conn, &user_id).await?;

                // Seeded lazily from the DB per category (not from the
                // batch-restricted `pricings` above) so a cap check considers
                // every model in the category, then tracked locally as the
                // batch allocates further tokens into the same category.
                let mut category_running_total: HashMap<String, i64> = HashMap::new();

                for item in &allocations {
                    if item.credits <= 0 {
                        return Err(BillingError::InvalidAmount(format!(
                            "credits for {} must be positive",
                            item.model_id
                        )));
                    }

                    let pricing = *pricing_by_model
                        .get(item.model_id.as_str())
                        .ok_or_else(|| BillingError::UnknownModel(item.model_id.clone()))?;
                    let category = pricing
                        .category()
                        .ok_or_else(|| BillingError::UnknownModel(item.model_id.clone()))?;

                    let tokens = pricing.credits_to_tokens(item.credits);

                    let category_key = category.as_str().to_string();
                    let category_total_before = match category_running_total.get(&category_key) {
                        Some(total) => *total,
                        None => {
                            let category_model_ids =
                                Pricing::list_model_ids_for_category(conn, category).await?;
                            Transaction::total_allocated_for_category(
                                conn,
                                &user_id,
                                &category_model_ids,
                            )
                            .await?
                        },
                    };

                    let limit = category.capacity_limit();
                    let new_total = category_total_before + tokens;
                    if new_total > limit {
                        let remaining = limit - category_total_before;
                        let max_credits = if remaining > 0 {
                            (remaining * pricing.price_per_m_token) / 1_000_000
                        } else {
                            0
                        };
                        return Err(BillingError::CategoryCapExceeded {
                            category: category.as_str().to_string(),
                            max_allowed: max_credits.max(0),
                        });
                    }

                    category_running_total.insert(category_key, new_total);

                    TokenBalance::upsert_add(conn, &user_id, &item.model_id, tokens).await?;

                    Transaction::record(
                        conn,
                        NewTransaction {
                            user_id: user_id.clone(),
                            transaction_type: TransactionType::Allocation.as_str().to_string(),
                            amount: item.credits,
                            model_id: Some(item.model_id.clone()),
                            iap_transaction_id: None,
                            metadata: Some(serde_json::json!({
                                "credits": item.credits,
                                "tokens_allocated": tokens,
                            })),
                        },
                    )
                    .await?;
                }

                Credit::subtract(conn, &user_id, total_credits).await?;

                Ok(())
            })
        })
        .await
    }

    /// §4.3.3. Input: the LLM provider's reported usage split. Fails with
    /// `InsufficientBalance` if the model's balance can't cover it.
    pub async fn consume(
        &self,
        user_id: &str,
        model_id: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Result<i64, BillingError> {
        let total = input_tokens + output_tokens;
        if total <= 0 {
            return Err(BillingError::InvalidAmount(
                "token usage must be positive".to_string(),
            ));
        }

        let mut conn = self.pool.get().await.map_err(|e| BillingError::Pool(e.to_string()))?;
        let user_id = user_id.to_string();
        let model_id = model_id.to_string();

        conn.transaction::<i64, BillingError, _>(|conn| {
            Box::pin(async move {
                let balance = TokenBalance::find(conn, &user_id, &model_id)
                    .await?
                    .ok_or(BillingError::InsufficientBalance { max_allowed: Some(0) })?;

                if balance.allocated_tokens < total {
                    return Err(BillingError::InsufficientBalance {
                        max_allowed: Some(balance.allocated_tokens),
                    });
                }

                let updated = TokenBalance::subtract(conn, &user_id, &model_id, total).await?;

                Transaction::record(
                    conn,
                    NewTransaction {
                        user_id: user_id.clone(),
                        transaction_type: TransactionType::Consumption.as_str().to_string(),
                        amount: total,
                        model_id: Some(model_id.clone()),
                        iap_transaction_id: None,
                        metadata: Some(serde_json::json!({
                            "input_tokens": input_tokens,
                            "output_tokens": output_tokens,
                        })),
                    },
                )
                .await?;

                Ok(updated.allocated_tokens)
            })
        })
        .await
    }

    /// §4.3.4. A snapshot read, no lock — the pre-flight check is a gate,
    /// not a reservation. Over/under-estimation is absorbed by the post-flight
    /// `consume` call once the provider reports actual usage.
    pub async fn validate_preflight(
        &self,
        user_id: &str,
        model_id: &str,
        estimated_total_tokens: i64,
    ) -> Result<(), BillingError> {
        let mut conn = self.pool.get().await.map_err(|e| BillingError::Pool(e.to_string()))?;
        let balance = TokenBalance::find(&mut conn, user_id, model_id)
            .await?
            .map(|b| b.allocated_tokens)
            .unwrap_or(0);

        if balance < estimated_total_tokens {
            return Err(BillingError::InsufficientBalance {
                max_allowed: Some(balance),
            });
        }
        Ok(())
    }
}

/// Category totals summed across models sharing a `PricingCategory`,
/// exposed for the `GET /balance` "remaining headroom" hint used by clients.
pub fn category_of(pricings: &[Pricing], model_id: &str) -> Option<PricingCategory> {
    pricings
        .iter()
        .find(|p| p.model_id == model_id)
        .and_then(|p| p.category())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_lookup_finds_matching_model() {
        let pricings = vec![Pricing {
            model_id: "gemini-2.5-flash".to_string(),
            price_per_m_token: 255,
            category: "quick".to_string(),
            exchange_rate: None,
            margin_percent: None,
            updated_at: chrono::Utc::now(),
        }];
        assert_eq!(
            category_of(&pricings, "gemini-2.5-flash"),
            Some(PricingCategory::Quick)
        );
        assert_eq!(category_of(&pricings, "unknown-model"), None);
    }
}
