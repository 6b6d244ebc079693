// TokenBlacklist — content-addressed by SHA-256 of the full raw JWT, not just
// its JTI, so a stolen token is rejected even if forged with a fresh JTI under
// a leaked signing key. Swept opportunistically, never queried without an
// expiry filter.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use sha2::{Digest, Sha256};

use crate::schema::token_blacklist;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = token_blacklist)]
#[diesel(primary_key(token_hash))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TokenBlacklistEntry {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = token_blacklist)]
struct NewTokenBlacklistEntry {
    token_hash: String,
    expires_at: DateTime<Utc>,
}

impl TokenBlacklistEntry {
    pub fn hash_token(raw_jwt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw_jwt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn add(
        conn: &mut AsyncPgConnection,
        raw_jwt: &str,
        expires_at_val: DateTime<Utc>,
    ) -> Result<(), diesel::result::Error> {
        use crate::schema::token_blacklist::dsl::*;

        diesel::insert_into(token_blacklist)
            .values(&NewTokenBlacklistEntry {
                token_hash: Self::hash_token(raw_jwt),
                expires_at: expires_at_val,
            })
            .on_conflict(token_hash)
            .do_update()
            .set(expires_at.eq(expires_at_val))
            .execute(conn)
            .await?;

        Ok(())
    }

    pub async fn is_blacklisted(
        conn: &mut AsyncPgConnection,
        raw_jwt: &str,
    ) -> Result<bool, diesel::result::Error> {
        use crate::schema::token_blacklist::dsl::*;

        let hash = Self::hash_token(raw_jwt);
        let now = Utc::now();

        let hit = token_blacklist
            .filter(token_hash.eq(hash))
            .filter(expires_at.gt(now))
            .first::<TokenBlacklistEntry>(conn)
            .await
            .optional()?;

        Ok(hit.is_some())
    }

    pub async fn sweep_expired(
        conn: &mut AsyncPgConnection,
    ) -> Result<usize, diesel::result::Error> {
        use crate::schema::token_blacklist::dsl::*;

        diesel::delete(token_blacklist.filter(expires_at.le(Utc::now())))
            .execute(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_hex() {
        let h1 = TokenBlacklistEntry::hash_token("header.payload.signature");
        let h2 = TokenBlacklistEntry::hash_token("header.payload.signature");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_tokens_hash_differently() {
        let h1 = TokenBlacklistEntry::hash_token("token-a");
        let h2 = TokenBlacklistEntry::hash_token("token-b");
        assert_ne!(h1, h2);
    }
}
