// `search_knowledge_base` (§4.5.3's table): a thin formatting wrapper around
// `VectorStoreService::search`, the counterpart tool to `web_search_with_rag`.

use std::sync::Arc;

use crate::services::vector_store::{VectorStoreError, VectorStoreService};

pub async fn search_knowledge_base(
    vector_store: &Arc<VectorStoreService>,
    query: &str,
    collection_name: &str,
    k: i64,
    requester_user_id: Option<&str>,
) -> Result<String, VectorStoreError> {
    let rows = vector_store.search(collection_name, query, k, requester_user_id).await?;

    if rows.is_empty() {
        return Ok(format!(
            "No results found in collection '{collection_name}' for query '{query}'."
        ));
    }

    let mut out = format!("Top {} result(s) from '{collection_name}':\n\n", rows.len());
    for (i, row) in rows.iter().enumerate() {
        out.push_str(&format!(
            "{}. (similarity {:.3})\n{}\n\n",
            i + 1,
            row.similarity,
            row.content
        ));
    }
    Ok(out)
}
