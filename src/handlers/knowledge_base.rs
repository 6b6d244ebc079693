// Knowledge base handlers (C4): document ingestion into the caller's
// persistent RAG collection, and collection introspection/management. §6 —
// all routes authenticated. A collection name defaults to the caller's own
// `user_id`, so each user's notes land in one implicit persistent collection
// unless they name another.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    app::AppState,
    middleware::auth::AuthenticatedUser,
    models::vector_document::CollectionType,
    services::tools::chunking::chunk_text,
    utils::ServiceError,
};

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub chunk_count: usize,
    pub collection_name: String,
}

async fn ingest(
    app_state: &AppState,
    user_id: &str,
    collection_name: String,
    text: &str,
    source: Option<&str>,
) -> Result<IngestResponse, ServiceError> {
    let chunks = chunk_text(text);
    let metadatas = chunks
        .iter()
        .map(|_| serde_json::json!({ "source": source.unwrap_or("upload") }))
        .collect();

    let chunk_count = app_state
        .vector_store_service
        .add_documents(
            &collection_name,
            &chunks,
            metadatas,
            CollectionType::Persistent,
            Some(user_id),
            None,
        )
        .await?;

    Ok(IngestResponse { chunk_count, collection_name })
}

/// `POST /api/knowledge-base/documents/upload` (multipart file upload, an
/// optional `collection_name` field).
pub async fn upload_document(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ServiceError> {
    let mut file_text: Option<String> = None;
    let mut file_name: Option<String> = None;
    let mut collection_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "collection_name" => {
                collection_name = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ServiceError::Validation(e.to_string()))?,
                );
            },
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::Validation(e.to_string()))?;
                file_text = Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| ServiceError::Validation("file is not valid UTF-8".to_string()))?,
                );
            },
            _ => {},
        }
    }

    let text = file_text.ok_or_else(|| ServiceError::Validation("missing 'file' field".to_string()))?;
    let collection_name = collection_name.unwrap_or_else(|| user.user_id.clone());

    let response = ingest(&app_state, &user.user_id, collection_name, &text, file_name.as_deref()).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct UploadTextRequest {
    pub text: String,
    #[serde(default)]
    pub collection_name: Option<String>,
}

/// `POST /api/knowledge-base/documents/upload-text {text}`.
pub async fn upload_text(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UploadTextRequest>,
) -> Result<Json<IngestResponse>, ServiceError> {
    let collection_name = payload.collection_name.unwrap_or_else(|| user.user_id.clone());
    let response = ingest(&app_state, &user.user_id, collection_name, &payload.text, None).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CollectionQuery {
    pub collection_name: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionStatsResponse {
    pub document_count: i64,
    pub collection_name: String,
    pub collection_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `GET /api/knowledge-base/documents/stats?collection_name=`.
pub async fn document_stats(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<CollectionQuery>,
) -> Result<Json<CollectionStatsResponse>, ServiceError> {
    let stats = app_state
        .vector_store_service
        .collection_stats(&query.collection_name, Some(&user.user_id))
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("collection '{}'", query.collection_name)))?;

    Ok(Json(CollectionStatsResponse {
        document_count: stats.document_count,
        collection_name: stats.collection_name,
        collection_type: stats.collection_type,
        created_at: stats.created_at,
        expires_at: stats.expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
}

/// `DELETE /api/knowledge-base/documents/clear?collection_name=`.
pub async fn clear_documents(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<CollectionQuery>,
) -> Result<Json<ClearResponse>, ServiceError> {
    app_state
        .vector_store_service
        .delete_collection(&query.collection_name, Some(&user.user_id))
        .await?;
    Ok(Json(ClearResponse { success: true }))
}
