// OAuthState — single-use CSRF binder between `auth-start` and `callback`,
// consumed atomically by `DELETE ... RETURNING` so two concurrent callbacks
// with the same state can never both succeed.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::schema::oauth_states;

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = oauth_states)]
#[diesel(primary_key(state))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OAuthState {
    pub state: String,
    pub device_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = oauth_states)]
struct NewOAuthState {
    state: String,
    device_id: Uuid,
    expires_at: DateTime<Utc>,
}

const STATE_TTL_MINUTES: i64 = 10;

impl OAuthState {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        state_val: String,
        device_id_val: Uuid,
    ) -> Result<Self, diesel::result::Error> {
        use crate::schema::oauth_states::dsl::*;

        diesel::insert_into(oauth_states)
            .values(&NewOAuthState {
                state: state_val,
                device_id: device_id_val,
                expires_at: Utc::now() + chrono::Duration::minutes(STATE_TTL_MINUTES),
            })
            .get_result::<OAuthState>(conn)
            .await
    }

    /// Consumes the state row; returns `None` if it never existed, was already
    /// consumed, or has expired (expired rows are deleted but treated as a miss).
    pub async fn consume(
        conn: &mut AsyncPgConnection,
        state_val: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        use diesel::sql_query;
        use diesel::sql_types::Text;

        let deleted: Option<OAuthState> = sql_query(
            "DELETE FROM oauth_states WHERE state = $1 RETURNING state, device_id, created_at, expires_at",
        )
        .bind::<Text, _>(state_val)
        .get_result::<OAuthState>(conn)
        .await
        .optional()?;

        Ok(deleted.filter(|s| s.expires_at > Utc::now()))
    }
}
