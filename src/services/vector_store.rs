// Vector store & RAG (C4) — one table (`vector_documents`), grouped into
// collections by `(collection_name, collection_type)`. All embedding-column
// access goes through raw SQL (`diesel::sql_query`) because Diesel's `table!`
// macro has no `SqlType` for pgvector's `vector` column; the query shapes are
// carried over verbatim from `pgvector_store.py` (the `<=>` operator,
// `1 - distance` similarity, the `DISTINCT ON` + windowed-count listing
// query, and the `expires_at < now` sweep).

use async_trait::async_trait;
use diesel::sql_types::{BigInt, Jsonb, Nullable, Text, Timestamptz};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::models::vector_document::{
    temp_collection_name, CollectionSummaryRow, CollectionType, VectorSearchRow,
    EMBEDDING_DIMENSION,
};
use crate::DbPool;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("embedding provider error: {0}")]
    Embedding(String),
}

/// Isolates the embedding vendor behind a trait; §1 lists "the concrete
/// choice of LLM/embedding vendor" as out of scope.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, VectorStoreError> {
        let mut batch = self.embed_documents(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| VectorStoreError::Embedding("empty embedding batch".to_string()))
    }
}

fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

pub struct VectorStoreService {
    pool: DbPool,
    embeddings: std::sync::Arc<dyn EmbeddingProvider>,
}

impl VectorStoreService {
    pub fn new(pool: DbPool, embeddings: std::sync::Arc<dyn EmbeddingProvider>) -> Self {
        Self { pool, embeddings }
    }

    /// §4.4 `add_documents`. `type=temp` requires a ttl and clears `user_id`;
    /// `type=persistent` requires `user_id` and never expires.
    pub async fn add_documents(
        &self,
        collection_name: &str,
        texts: &[String],
        metadatas: Vec<JsonValue>,
        collection_type: CollectionType,
        user_id: Option<&str>,
        ttl: Option<chrono::Duration>,
    ) -> Result<usize, VectorStoreError> {
        if texts.is_empty() {
            return Ok(0);
        }
        if matches!(collection_type, CollectionType::Persistent) && user_id.is_none() {
            return Err(VectorStoreError::Embedding(
                "persistent collection requires user_id".to_string(),
            ));
        }

        let owner = match collection_type {
            CollectionType::Persistent => user_id,
            CollectionType::Temp => None,
        };

        let embeddings = self.embeddings.embed_documents(texts).await?;
        for embedding in &embeddings {
            if embedding.len() != EMBEDDING_DIMENSION {
                return Err(VectorStoreError::Embedding(format!(
                    "expected {EMBEDDING_DIMENSION}-dim embedding, got {}",
                    embedding.len()
                )));
            }
        }

        let expires_at = match collection_type {
            CollectionType::Temp => Some(
                chrono::Utc::now() + ttl.unwrap_or_else(|| chrono::Duration::hours(1)),
            ),
            CollectionType::Persistent => None,
        };

        let mut conn = self.pool.get().await.map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let owner = owner.map(|s| s.to_string());
        let collection_name = collection_name.to_string();
        let collection_type_str = collection_type.as_str();
        let rows: Vec<(String, JsonValue, Vec<f32>)> = texts
            .iter()
            .cloned()
            .zip(
                metadatas
                    .into_iter()
                    .chain(std::iter::repeat(JsonValue::Object(Default::default()))),
            )
            .zip(embeddings.into_iter())
            .map(|((text, metadata), embedding)| (text, metadata, embedding))
            .collect();
        let inserted = rows.len();

        // §4.4: a partial-ingest failure must not leave a partial document set.
        conn.transaction::<(), VectorStoreError, _>(|conn| {
            Box::pin(async move {
                for (text, metadata, embedding) in rows {
                    diesel::sql_query(
                        "INSERT INTO vector_documents \
                         (user_id, collection_name, collection_type, content, metadata, created_at, expires_at, embedding) \
                         VALUES ($1, $2, $3, $4, $5, NOW(), $6, CAST($7 AS vector))",
                    )
                    .bind::<Nullable<Text>, _>(owner.clone())
                    .bind::<Text, _>(collection_name.clone())
                    .bind::<Text, _>(collection_type_str)
                    .bind::<Text, _>(text)
                    .bind::<Jsonb, _>(metadata)
                    .bind::<Nullable<Timestamptz>, _>(expires_at)
                    .bind::<Text, _>(vector_literal(&embedding))
                    .execute(conn)
                    .await?;
                }
                Ok(())
            })
        })
        .await?;

        Ok(inserted)
    }

    /// §4.4 `search`. Visibility: `temp` rows are visible to anyone who knows
    /// the collection name; `persistent` rows require `user_id = requester`.
    pub async fn search(
        &self,
        collection_name: &str,
        query: &str,
        k: i64,
        requester_user_id: Option<&str>,
    ) -> Result<Vec<VectorSearchRow>, VectorStoreError> {
        let query_embedding = self.embeddings.embed_query(query).await?;
        let mut conn = self.pool.get().await.map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let rows: Vec<VectorSearchRow> = diesel::sql_query(
            "SELECT content, metadata, \
                    1 - (embedding <=> CAST($1 AS vector)) AS similarity \
             FROM vector_documents \
             WHERE collection_name = $2 \
               AND (expires_at IS NULL OR expires_at > NOW()) \
               AND ( \
                   collection_type = 'temp' \
                   OR (collection_type = 'persistent' AND user_id = $3) \
               ) \
             ORDER BY embedding <=> CAST($1 AS vector) \
             LIMIT $4",
        )
        .bind::<Text, _>(vector_literal(&query_embedding))
        .bind::<Text, _>(collection_name)
        .bind::<Nullable<Text>, _>(requester_user_id)
        .bind::<BigInt, _>(k)
        .load(&mut conn)
        .await?;

        Ok(rows)
    }

    /// §4.4 `list_collections`. `DISTINCT ON` + windowed count, matching the
    /// original's listing query shape exactly.
    pub async fn list_collections(
        &self,
        user_id: Option<&str>,
        collection_type: Option<CollectionType>,
    ) -> Result<Vec<CollectionSummaryRow>, VectorStoreError> {
        let mut conn = self.pool.get().await.map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let rows: Vec<CollectionSummaryRow> = diesel::sql_query(
            "SELECT DISTINCT ON (collection_name) \
                    collection_name, collection_type, created_at, expires_at, \
                    COUNT(*) OVER (PARTITION BY collection_name) AS document_count \
             FROM vector_documents \
             WHERE (expires_at IS NULL OR expires_at > NOW()) \
               AND ($1::text IS NULL OR user_id = $1 OR collection_type = 'temp') \
               AND ($2::text IS NULL OR collection_type = $2) \
             ORDER BY collection_name, created_at DESC",
        )
        .bind::<Nullable<Text>, _>(user_id)
        .bind::<Nullable<Text>, _>(collection_type.map(|t| t.as_str().to_string()))
        .load(&mut conn)
        .await?;

        Ok(rows)
    }

    pub async fn collection_stats(
        &self,
        collection_name: &str,
        user_id: Option<&str>,
    ) -> Result<Option<CollectionSummaryRow>, VectorStoreError> {
        let all = self.list_collections(user_id, None).await?;
        Ok(all.into_iter().find(|c| c.collection_name == collection_name))
    }

    /// §4.4 `delete_collection`. Hard delete; scoped to `user_id` when given
    /// so one user can't wipe another's persistent collection by name alone.
    pub async fn delete_collection(
        &self,
        collection_name: &str,
        user_id: Option<&str>,
    ) -> Result<u64, VectorStoreError> {
        let mut conn = self.pool.get().await.map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let affected: Vec<CountRow> = diesel::sql_query(
            "WITH deleted AS ( \
                DELETE FROM vector_documents \
                WHERE collection_name = $1 AND ($2::text IS NULL OR user_id = $2) \
                RETURNING 1 \
             ) SELECT COUNT(*) AS count FROM deleted",
        )
        .bind::<Text, _>(collection_name)
        .bind::<Nullable<Text>, _>(user_id)
        .load(&mut conn)
        .await?;

        Ok(affected.first().map(|r| r.count as u64).unwrap_or(0))
    }

    /// §4.4 `cleanup_expired`, run by the background sweeper (§5).
    pub async fn cleanup_expired(&self) -> Result<u64, VectorStoreError> {
        let mut conn = self.pool.get().await.map_err(|e| VectorStoreError::Embedding(e.to_string()))?;

        let affected: Vec<CountRow> = diesel::sql_query(
            "WITH deleted AS ( \
                DELETE FROM vector_documents \
                WHERE expires_at IS NOT NULL AND expires_at < NOW() \
                RETURNING 1 \
             ) SELECT COUNT(*) AS count FROM deleted",
        )
        .load(&mut conn)
        .await?;

        Ok(affected.first().map(|r| r.count as u64).unwrap_or(0))
    }

    /// Names a fresh temp collection for `web_search_with_rag` (§4.5.4).
    pub fn new_temp_collection_name(&self, prefix: &str, unix_seconds: i64) -> String {
        temp_collection_name(prefix, unix_seconds)
    }
}

#[derive(diesel::QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedding;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedding {
        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, VectorStoreError> {
            Ok(texts.iter().map(|_| vec![0.0; EMBEDDING_DIMENSION]).collect())
        }
    }

    #[tokio::test]
    async fn embed_query_reuses_document_embedding_path() {
        let provider = FixedEmbedding;
        let v = provider.embed_query("hello").await.unwrap();
        assert_eq!(v.len(), EMBEDDING_DIMENSION);
    }

    #[test]
    fn vector_literal_formats_as_bracketed_csv() {
        assert_eq!(vector_literal(&[1.0, 2.5, -3.0]), "[1,2.5,-3]");
    }
}
