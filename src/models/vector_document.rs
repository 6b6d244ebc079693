// VectorDocument — the pgvector-backed RAG store's only table. `embedding` has
// no Diesel SqlType, so it is never part of the `diesel::table!` declaration;
// all embedding-column access goes through `diesel::sql_query` in
// `services/vector_store.rs`, the same pattern the teacher uses for rows its
// Diesel DSL cannot express.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const EMBEDDING_DIMENSION: usize = 768;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Temp,
    Persistent,
}

impl CollectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionType::Temp => "temp",
            CollectionType::Persistent => "persistent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "temp" => Some(CollectionType::Temp),
            "persistent" => Some(CollectionType::Persistent),
            _ => None,
        }
    }
}

/// Row returned by `diesel::sql_query` without the embedding vector — used
/// for metadata listing where the distance isn't projected.
#[derive(Debug, Clone, Serialize, Deserialize, diesel::QueryableByName)]
pub struct VectorDocumentMeta {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: Uuid,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub user_id: Option<String>,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub collection_name: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub collection_type: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub content: String,
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub metadata: JsonValue,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Row returned by the `search()` query: metadata plus the similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, diesel::QueryableByName)]
pub struct VectorSearchRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub content: String,
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub metadata: JsonValue,
    #[diesel(sql_type = diesel::sql_types::Double)]
    pub similarity: f64,
}

/// Row returned by `list_collections()`'s `DISTINCT ON` + windowed count query.
#[derive(Debug, Clone, Serialize, Deserialize, diesel::QueryableByName)]
pub struct CollectionSummaryRow {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub collection_name: String,
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub collection_type: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub document_count: i64,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A temp collection is named `<prefix>_<unix_seconds>`, e.g. `web_1762386000`.
pub fn temp_collection_name(prefix: &str, unix_seconds: i64) -> String {
    format!("{prefix}_{unix_seconds}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_collection_naming_matches_convention() {
        assert_eq!(temp_collection_name("web", 1_762_386_000), "web_1762386000");
    }
}
