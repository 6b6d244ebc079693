// `web_search_with_rag` (§4.5.4), grounded on
// `original_source/llm_clean/utils/tools/web_search_with_rag.py`: Google CSE
// search, parallel page fetch with `scraper`-based extraction (the teacher's
// own `link.rs`/`url_validator.rs` pattern for `Html::parse_document` +
// `Selector::parse`), 1000/200 chunking, embed, insert into a fresh temp
// collection.

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::chunking::chunk_text;
use crate::services::vector_store::{VectorStoreError, VectorStoreService};
use crate::models::vector_document::CollectionType;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";
const STRIP_SELECTORS: &[&str] =
    &["script", "style", "nav", "header", "footer", "aside", "iframe", "noscript"];
const GOOGLE_CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Error, Debug)]
pub enum WebSearchError {
    #[error("google custom search is not configured")]
    NotConfigured,

    #[error("google custom search request failed: {0}")]
    Search(String),

    #[error("no pages could be fetched for this query")]
    NoPagesFetched,

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
}

#[derive(Debug, Clone)]
pub struct CseConfig {
    pub api_key: String,
    pub cse_id: String,
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct CseItem {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

struct FetchedPage {
    text: String,
    item: CseItem,
}

pub struct WebSearchRagTool {
    config: CseConfig,
    http: reqwest::Client,
    vector_store: Arc<VectorStoreService>,
}

impl WebSearchRagTool {
    pub fn new(config: CseConfig, vector_store: Arc<VectorStoreService>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http, vector_store }
    }

    pub async fn run(
        &self,
        query: &str,
        max_results: u32,
        collection_ttl_hours: f64,
        unix_seconds: i64,
    ) -> Result<String, WebSearchError> {
        let max_results = max_results.clamp(1, 10);
        let ttl_hours = collection_ttl_hours.clamp(0.1, 24.0);

        let items = self.search(query, max_results).await?;
        if items.is_empty() {
            return Ok(format!("No results found for query '{query}'."));
        }

        let pages = self.fetch_all(&items).await;
        if pages.is_empty() {
            return Err(WebSearchError::NoPagesFetched);
        }

        let collection_name = self.vector_store.new_temp_collection_name("web", unix_seconds);

        let mut texts = Vec::new();
        let mut metadatas = Vec::new();
        for (rank, page) in pages.iter().enumerate() {
            for chunk in chunk_text(&page.text) {
                texts.push(chunk);
                metadatas.push(json!({
                    "url": page.item.link,
                    "title": page.item.title,
                    "snippet": page.item.snippet,
                    "search_query": query,
                    "search_rank": rank + 1,
                    "source": "google_web_search",
                }));
            }
        }

        let ttl = chrono::Duration::milliseconds((ttl_hours * 3_600_000.0) as i64);
        let chunk_count = self
            .vector_store
            .add_documents(&collection_name, &texts, metadatas, CollectionType::Temp, None, Some(ttl))
            .await?;

        Ok(format_result(query, &collection_name, pages.len(), chunk_count, ttl_hours, &items))
    }

    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<CseItem>, WebSearchError> {
        if self.config.api_key.is_empty() || self.config.cse_id.is_empty() {
            return Err(WebSearchError::NotConfigured);
        }

        let response = self
            .http
            .get(GOOGLE_CSE_ENDPOINT)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("cx", self.config.cse_id.as_str()),
                ("q", query),
                ("num", &max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| WebSearchError::Search(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WebSearchError::Search(format!("http {}", response.status())));
        }

        let parsed: CseResponse = response
            .json()
            .await
            .map_err(|e| WebSearchError::Search(e.to_string()))?;
        Ok(parsed.items)
    }

    async fn fetch_all(&self, items: &[CseItem]) -> Vec<FetchedPage> {
        let fetches = items.iter().cloned().map(|item| {
            let http = self.http.clone();
            async move {
                let html = http.get(&item.link).send().await.ok()?.text().await.ok()?;
                let text = extract_main_text(&html);
                if text.trim().is_empty() {
                    None
                } else {
                    Some(FetchedPage { text, item })
                }
            }
        });

        futures_util::future::join_all(fetches).await.into_iter().flatten().collect()
    }
}

fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let root = ["article", "main", "body"].iter().find_map(|selector| {
        Selector::parse(selector).ok().and_then(|sel| document.select(&sel).next())
    });

    let Some(root) = root else {
        return String::new();
    };

    let mut text = String::new();
    collect_text(root, &mut text);
    collapse_whitespace(&text)
}

/// Walks element children depth-first, skipping subtrees rooted at any of
/// `STRIP_SELECTORS` entirely.
fn collect_text(element: scraper::ElementRef, out: &mut String) {
    if STRIP_SELECTORS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(t) => out.push_str(t),
            scraper::Node::Element(_) => {
                if let Some(child_el) = scraper::ElementRef::wrap(child) {
                    out.push('\n');
                    collect_text(child_el, out);
                }
            },
            _ => {},
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
}

fn format_result(
    query: &str,
    collection_name: &str,
    pages_count: usize,
    chunks_count: usize,
    ttl_hours: f64,
    items: &[CseItem],
) -> String {
    let mut out = String::new();
    out.push_str("Saved web search results to a RAG collection\n");
    out.push_str(&format!("Collection name: {collection_name}\n"));
    out.push_str(&format!("Query: {query}\n"));
    out.push_str(&format!("Pages saved: {pages_count}\n"));
    out.push_str(&format!("Chunks created: {chunks_count}\n"));
    out.push_str(&format!("Expires in: {ttl_hours}h\n\n"));
    for (i, item) in items.iter().take(pages_count).enumerate() {
        out.push_str(&format!("{}. {} ({})\n", i + 1, item.title, item.link));
    }
    out.push_str(&format!(
        "\nNext step: call search_knowledge_base with collection_name=\"{collection_name}\" \
         to search inside these results.\n"
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_main_text_strips_script_and_prefers_article() {
        let html = "<html><body><script>evil()</script><article>Hello<br>World</article></body></html>";
        let text = extract_main_text(html);
        assert!(text.contains("Hello"));
        assert!(!text.contains("evil"));
    }

    #[test]
    fn collapse_whitespace_drops_blank_lines() {
        let text = collapse_whitespace("  a  \n\n  b  \n   \n c");
        assert_eq!(text, "a\nb\nc");
    }
}
