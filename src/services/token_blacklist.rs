// Content-addressed JWT blacklist, backed by Redis. The contract
// (`add`/`is_blacklisted`/periodic sweep) is identical to the relational
// backing in `models::token_blacklist::TokenBlacklistEntry`, which is kept
// as an alternative store and exercised directly by tests that don't want a
// Redis dependency; a real deployment wires one or the other into
// `AppState`, never both.

use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::RedisPool;

#[derive(Error, Debug)]
pub enum TokenBlacklistError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub struct TokenBlacklistService {
    redis_pool: RedisPool,
    key_prefix: String,
}

fn hash_token(raw_jwt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_jwt.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl TokenBlacklistService {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self {
            redis_pool,
            key_prefix: "blacklist:".to_string(),
        }
    }

    fn key(&self, raw_jwt: &str) -> String {
        format!("{}{}", self.key_prefix, hash_token(raw_jwt))
    }

    /// `ttl` is the remaining lifetime of the token (`exp - now`); a token
    /// blacklisted after it would have expired anyway is a no-op, not an error.
    pub async fn add(
        &self,
        raw_jwt: &str,
        ttl: chrono::Duration,
    ) -> Result<(), TokenBlacklistError> {
        let ttl_secs = ttl.num_seconds().max(1) as u64;
        let key = self.key(raw_jwt);

        self.redis_pool
            .execute(move |mut conn| {
                let key = key.clone();
                async move {
                    let _: () = conn.set_ex(&key, 1u8, ttl_secs).await?;
                    Ok(((), conn))
                }
            })
            .await?;
        Ok(())
    }

    pub async fn is_blacklisted(&self, raw_jwt: &str) -> Result<bool, TokenBlacklistError> {
        let key = self.key(raw_jwt);

        let exists = self
            .redis_pool
            .execute(move |mut conn| {
                let key = key.clone();
                async move {
                    let exists: bool = conn.exists(&key).await?;
                    Ok((exists, conn))
                }
            })
            .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_token("a.b.c"), hash_token("a.b.c"));
        assert_ne!(hash_token("a.b.c"), hash_token("a.b.d"));
    }
}
