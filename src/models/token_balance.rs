// TokenBalance — `(user_id, model_id)` unique, created lazily on first allocation.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::token_balances;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = token_balances)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TokenBalance {
    pub id: Uuid,
    pub user_id: String,
    pub model_id: String,
    pub allocated_tokens: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = token_balances)]
pub struct NewTokenBalance {
    pub user_id: String,
    pub model_id: String,
    pub allocated_tokens: i64,
}

impl TokenBalance {
    pub async fn list_for_update(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use diesel::sql_query;
        use diesel::sql_types::Text;

        sql_query(
            "SELECT id, user_id, model_id, allocated_tokens, updated_at \
             FROM token_balances WHERE user_id = $1 FOR UPDATE",
        )
        .bind::<Text, _>(owner_user_id)
        .load::<TokenBalance>(conn)
        .await
    }

    pub async fn list_for_user(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::token_balances::dsl::*;

        token_balances
            .filter(user_id.eq(owner_user_id))
            .load::<TokenBalance>(conn)
            .await
    }

    pub async fn find(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
        model: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::token_balances::dsl::*;

        token_balances
            .filter(user_id.eq(owner_user_id))
            .filter(model_id.eq(model))
            .first::<TokenBalance>(conn)
            .await
            .optional()
    }

    pub async fn upsert_add(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
        model: &str,
        delta: i64,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::token_balances::dsl::*;

        diesel::insert_into(token_balances)
            .values(&NewTokenBalance {
                user_id: owner_user_id.to_string(),
                model_id: model.to_string(),
                allocated_tokens: delta,
            })
            .on_conflict((user_id, model_id))
            .do_update()
            .set((
                allocated_tokens.eq(crate::schema::token_balances::allocated_tokens + delta),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<TokenBalance>(conn)
            .await
    }

    pub async fn subtract(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
        model: &str,
        amount: i64,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::token_balances::dsl::*;

        diesel::update(
            token_balances
                .filter(user_id.eq(owner_user_id))
                .filter(model_id.eq(model)),
        )
        .set((
            allocated_tokens.eq(crate::schema::token_balances::allocated_tokens - amount),
            updated_at.eq(Utc::now()),
        ))
        .get_result::<TokenBalance>(conn)
        .await
    }
}
