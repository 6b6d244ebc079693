// Credit — one row per user, integer yen, never negative.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::credits;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = credits)]
#[diesel(primary_key(user_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Credit {
    pub user_id: String,
    pub credits: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = credits)]
pub struct NewCredit {
    pub user_id: String,
    pub credits: i64,
}

impl Credit {
    /// Row lock used inside the billing transactions that read-then-mutate a balance.
    pub async fn find_for_update(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use diesel::sql_query;
        use diesel::sql_types::Text;

        sql_query("SELECT user_id, credits, updated_at FROM credits WHERE user_id = $1 FOR UPDATE")
            .bind::<Text, _>(owner_user_id)
            .get_result::<Credit>(conn)
            .await
            .optional()
    }

    pub async fn find(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use crate::schema::credits::dsl::*;

        credits
            .filter(user_id.eq(owner_user_id))
            .first::<Credit>(conn)
            .await
            .optional()
    }

    pub async fn create_if_missing(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::credits::dsl::*;

        diesel::insert_into(credits)
            .values(&NewCredit {
                user_id: owner_user_id.to_string(),
                credits: 0,
            })
            .on_conflict(user_id)
            .do_nothing()
            .execute(conn)
            .await?;

        credits
            .filter(user_id.eq(owner_user_id))
            .first::<Credit>(conn)
            .await
    }

    pub async fn add(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
        delta: i64,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::credits::dsl::*;

        diesel::insert_into(credits)
            .values(&NewCredit {
                user_id: owner_user_id.to_string(),
                credits: delta,
            })
            .on_conflict(user_id)
            .do_update()
            .set((
                credits.eq(crate::schema::credits::credits + delta),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<Credit>(conn)
            .await
    }

    pub async fn subtract(
        conn: &mut AsyncPgConnection,
        owner_user_id: &str,
        amount: i64,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::credits::dsl::*;

        diesel::update(credits.filter(user_id.eq(owner_user_id)))
            .set((
                credits.eq(crate::schema::credits::credits - amount),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<Credit>(conn)
            .await
    }
}
