// Transaction — append-only ledger. Never mutated; `iap_transaction_id`
// uniqueness is the sole idempotency key for purchases.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::schema::transactions;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Allocation,
    Consumption,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Allocation => "allocation",
            TransactionType::Consumption => "consumption",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: String,
    #[diesel(column_name = transaction_type)]
    pub transaction_type: String,
    pub amount: i64,
    pub model_id: Option<String>,
    pub iap_transaction_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction {
    pub user_id: String,
    #[diesel(column_name = transaction_type)]
    pub transaction_type: String,
    pub amount: i64,
    pub model_id: Option<String>,
    pub iap_transaction_id: Option<String>,
    pub metadata: Option<JsonValue>,
}

impl Transaction {
    pub async fn find_by_iap_id(
        conn: &mut AsyncPgConnection,
        iap_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::transactions::dsl::*;

        transactions
            .filter(iap_transaction_id.eq(iap_id))
            .first::<Transaction>(conn)
            .await
            .optional()
    }

    pub async fn record(
        conn: &mut AsyncPgConnection,
        new_transaction: NewTransaction,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::transactions::dsl::*;

        diesel::insert_into(transactions)
            .values(&new_transaction)
            .get_result::<Transaction>(conn)
            .await
    }

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
        limit: i64,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::transactions::dsl::*;

        transactions
            .filter(user_id.eq(owner_user_id))
            .order(created_at.desc())
            .limit(limit)
            .load::<Transaction>(conn)
            .await
    }

    /// Sum of `allocated_tokens` currently outstanding for every model in a
    /// pricing category, used to enforce the per-category allocation cap.
    pub async fn total_allocated_for_category(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
        category_model_ids: &[String],
    ) -> Result<i64, diesel::result::Error> {
        use crate::schema::token_balances::dsl as tb;

        let total: Option<i64> = tb::token_balances
            .filter(tb::user_id.eq(owner_user_id))
            .filter(tb::model_id.eq_any(category_model_ids))
            .select(diesel::dsl::sum(tb::allocated_tokens))
            .first(conn)
            .await?;

        Ok(total.unwrap_or(0))
    }
}
