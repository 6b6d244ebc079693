// Agentic chat orchestrator (C5), grounded on
// `original_source/llm_clean/application/services/chat_service.py`'s context
// assembly → agent loop → token accounting → command extraction pipeline,
// adapted per §9's redesign: a per-request `ToolContext` instead of
// module-level globals, and a normalized `ToolCall`/`ToolInvocation` shape at
// the LLM SDK boundary.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::billing::{BillingError, BillingService};
use crate::services::command_extractor::{extract_commands, LlmCommand, ToolCall};
use crate::services::llm::{LlmClient, LlmError, LlmMessage, ToolInvocation};
use crate::services::tools::web_search::WebSearchRagTool;
use crate::services::tools::{knowledge_base, tool_catalog, FileInfo, ToolContext, ToolDefinition};
use crate::services::vector_store::VectorStoreService;
use crate::ws::WsRegistry;

/// §4.5.3: the agent runs for at most this many steps.
const MAX_AGENT_ITERATIONS: u32 = 5;
/// §4.5.5: the conversation budget `tokenUsage.maxTokens` is measured against.
const MAX_CONVERSATION_TOKENS: i64 = 4000;
const NEEDS_SUMMARY_RATIO: f64 = 0.8;
/// §4.3.5: heuristic output estimate for pre-flight validation.
const ESTIMATED_OUTPUT_RATIO: f64 = 0.2;
/// §4.5.7: the summarizer call's own pre-flight assumes 25% output.
const SUMMARIZE_OUTPUT_RATIO: f64 = 0.25;
const DEFAULT_PRESERVE_RECENT: usize = 10;
const DEFAULT_SUMMARIZE_MAX_TOKENS: i64 = 4000;
const DEFAULT_SUMMARIZATION_MODEL: &str = "gemini-2.5-flash";
const HIGH_COMPRESSION_RATIO_WARNING: f64 = 0.95;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("llm error: {0}")]
    Llm(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<LlmError> for OrchestratorError {
    fn from(error: LlmError) -> Self {
        OrchestratorError::Llm(error.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachedFile {
    pub filename: String,
    pub content: String,
}

/// §4.5.1's optional `context` object.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatContext {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub file_list: Option<Vec<String>>,
    #[serde(default)]
    pub attached_file: Option<AttachedFile>,
    #[serde(default)]
    pub conversation_history: Vec<HistoryMessage>,
    #[serde(default)]
    pub all_files: Vec<FileInfo>,
    #[serde(default = "default_true")]
    pub send_file_context_to_llm: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub current_tokens: i64,
    pub max_tokens: i64,
    pub usage_ratio: f64,
    pub needs_summary: bool,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<LlmCommand>,
    pub provider: String,
    pub model: String,
    pub history_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeRequest {
    pub conversation_history: Vec<HistoryMessage>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub preserve_recent: Option<usize>,
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub summary: SummaryMessage,
    pub recent_messages: Vec<HistoryMessage>,
    pub compression_ratio: f64,
    pub original_tokens: i64,
    pub compressed_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// §4.5.2: the synthetic context message describing whichever of
/// EditScreen (an open file) or FilelistScreen (a file listing) is active.
/// Suppressed entirely by `send_file_context_to_llm=false`.
fn build_context_message(context: &ChatContext) -> Option<String> {
    if !context.send_file_context_to_llm {
        return None;
    }
    if let (Some(path), Some(content)) = (&context.file_path, &context.file_content) {
        return Some(format!("The user currently has the file \"{path}\" open. Its content:\n\n{content}"));
    }
    match &context.file_list {
        Some(list) if !list.is_empty() => {
            Some(format!("The user is viewing their file list: {}", list.join(", ")))
        },
        _ => None,
    }
}

fn build_tool_context(client_id: &str, context: &ChatContext) -> ToolContext {
    let mut tool_context = ToolContext::new(client_id);
    if let (Some(path), Some(content)) = (&context.file_path, &context.file_content) {
        tool_context.set_file_context(path.clone(), content.clone());
    } else if context.file_list.is_some() {
        tool_context.set_directory_context("/");
    }
    tool_context.set_all_files_context(context.all_files.clone());
    tool_context
}

fn history_role_to_message(history: &HistoryMessage) -> Option<LlmMessage> {
    match history.role.as_str() {
        "user" => Some(LlmMessage::Human { content: history.content.clone() }),
        "ai" | "assistant" => Some(LlmMessage::Assistant { content: history.content.clone(), tool_calls: Vec::new() }),
        "system" => Some(LlmMessage::System { content: history.content.clone() }),
        other => {
            tracing::debug!(role = other, "dropping conversation history entry with unknown role");
            None
        },
    }
}

fn serialize_for_estimate(messages: &[LlmMessage], catalog: &[ToolDefinition]) -> String {
    let mut out = String::new();
    for message in messages {
        match message {
            LlmMessage::System { content }
            | LlmMessage::Human { content }
            | LlmMessage::Assistant { content, .. }
            | LlmMessage::ToolResult { content, .. } => out.push_str(content),
        }
    }
    for tool in catalog {
        out.push_str(tool.name);
        out.push_str(tool.description);
        out.push_str(&tool.parameters.to_string());
    }
    out
}

/// Owns the three C5 collaborators (LLM, vector store, WS registry) and
/// drives §4.5's context-assembly → agent-loop → accounting pipeline.
pub struct ChatOrchestrator {
    billing: Arc<BillingService>,
    vector_store: Arc<VectorStoreService>,
    ws_registry: Arc<WsRegistry>,
    llm_clients: HashMap<String, Arc<dyn LlmClient>>,
    web_search: Option<Arc<WebSearchRagTool>>,
}

impl ChatOrchestrator {
    pub fn new(
        billing: Arc<BillingService>,
        vector_store: Arc<VectorStoreService>,
        ws_registry: Arc<WsRegistry>,
        llm_clients: HashMap<String, Arc<dyn LlmClient>>,
        web_search: Option<Arc<WebSearchRagTool>>,
    ) -> Self {
        Self { billing, vector_store, ws_registry, llm_clients, web_search }
    }

    fn client_for(&self, provider: &str) -> Result<Arc<dyn LlmClient>, OrchestratorError> {
        self.llm_clients
            .get(provider)
            .cloned()
            .ok_or_else(|| OrchestratorError::InvalidRequest(format!("unknown llm provider: {provider}")))
    }

    /// §4.5.1-4.5.6: one chat turn.
    pub async fn chat(
        &self,
        user_id: &str,
        client_id: &str,
        request: ChatRequest,
        unix_seconds: i64,
    ) -> Result<ChatResponse, OrchestratorError> {
        let llm = self.client_for(&request.provider)?;
        let context = request.context.clone().unwrap_or_default();
        let tool_context = build_tool_context(client_id, &context);
        let catalog = tool_catalog();

        let mut messages = Vec::new();
        if let Some(context_message) = build_context_message(&context) {
            messages.push(LlmMessage::Human { content: context_message });
        }
        if let Some(attached) = &context.attached_file {
            messages.push(LlmMessage::Human {
                content: format!("Attached file \"{}\":\n\n{}", attached.filename, attached.content),
            });
        }
        for history in &context.conversation_history {
            if let Some(message) = history_role_to_message(history) {
                messages.push(message);
            }
        }
        messages.push(LlmMessage::Human { content: request.message.clone() });

        let estimated_input = llm.estimate_tokens(&serialize_for_estimate(&messages, &catalog));
        let estimated_output = (estimated_input as f64 * ESTIMATED_OUTPUT_RATIO) as i64;
        self.billing.validate_preflight(user_id, &request.model, estimated_input + estimated_output).await?;

        let mut last_usage = None;
        let mut final_content = String::new();

        for iteration in 0..MAX_AGENT_ITERATIONS {
            let turn = llm.step(&request.model, &messages, &catalog).await?;
            if turn.usage.is_some() {
                last_usage = turn.usage;
            }
            final_content = turn.content.clone();
            let has_tool_calls = !turn.tool_calls.is_empty();
            messages.push(LlmMessage::Assistant { content: turn.content, tool_calls: turn.tool_calls.clone() });

            if !has_tool_calls || iteration + 1 == MAX_AGENT_ITERATIONS {
                break;
            }

            for call in &turn.tool_calls {
                let result = self.run_tool(call, client_id, &tool_context, unix_seconds).await;
                messages.push(LlmMessage::ToolResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: result,
                });
            }
        }

        let all_calls: Vec<ToolCall> = messages
            .iter()
            .filter_map(|message| match message {
                LlmMessage::Assistant { tool_calls, .. } => Some(tool_calls.clone()),
                _ => None,
            })
            .flatten()
            .map(|call| ToolCall { name: call.name, args: call.args })
            .collect();
        let commands = extract_commands(&all_calls);

        if let Some(usage) = last_usage {
            self.billing.consume(user_id, &request.model, usage.input_tokens, usage.output_tokens).await?;
        }

        let updated_history_text = {
            let mut s = context.conversation_history.iter().map(|h| h.content.as_str()).collect::<Vec<_>>().join("\n");
            s.push_str(&request.message);
            s.push_str(&final_content);
            s
        };
        let current_tokens = llm.estimate_tokens(&updated_history_text);
        let usage_ratio = current_tokens as f64 / MAX_CONVERSATION_TOKENS as f64;
        let needs_summary = usage_ratio >= NEEDS_SUMMARY_RATIO;

        let token_usage = last_usage.map(|usage| TokenUsage {
            current_tokens,
            max_tokens: MAX_CONVERSATION_TOKENS,
            usage_ratio,
            needs_summary,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
        });

        let warning = needs_summary
            .then(|| "Conversation is approaching the token budget; consider summarizing.".to_string());

        Ok(ChatResponse {
            message: final_content,
            commands,
            provider: request.provider,
            model: request.model,
            history_count: context.conversation_history.len() + 1,
            token_usage,
            warning,
        })
    }

    /// Runs one server-executed tool, or acknowledges a client-executed one
    /// (the actual mutation is applied on the device via the extracted
    /// `Command`). Execution failures are fed back to the agent as the tool
    /// result text rather than aborting the turn — §4.5.3's "tool-parsing
    /// errors do not abort the run; the agent is asked to retry" extends
    /// naturally to tool execution errors.
    async fn run_tool(
        &self,
        call: &ToolInvocation,
        client_id: &str,
        tool_context: &ToolContext,
        unix_seconds: i64,
    ) -> String {
        match call.name.as_str() {
            "create_file" | "delete_file" | "rename_file" | "edit_file" | "edit_file_lines" => {
                "Queued for the client to apply.".to_string()
            },
            "read_file" => {
                let title = call.args.get("title").and_then(|v| v.as_str()).unwrap_or_default();
                match self.ws_registry.request_file_content(client_id, title, None).await {
                    Ok(content) => content,
                    Err(e) => format!("Error fetching file '{title}': {e}"),
                }
            },
            "search_files" => {
                let query = call.args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                let search_type = if tool_context.directory_context().is_some() { "directory" } else { "files" };
                match self.ws_registry.request_search_results(client_id, query, search_type, None).await {
                    Ok(value) => value.to_string(),
                    Err(e) => format!("Error searching files: {e}"),
                }
            },
            "web_search_with_rag" => {
                let Some(tool) = &self.web_search else {
                    return "web search is not configured".to_string();
                };
                let query = call.args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                let max_results = call.args.get("max_results").and_then(|v| v.as_u64()).unwrap_or(5) as u32;
                let ttl_hours = call.args.get("collection_ttl_hours").and_then(|v| v.as_f64()).unwrap_or(1.0);
                match tool.run(query, max_results, ttl_hours, unix_seconds).await {
                    Ok(text) => text,
                    Err(e) => format!("web search failed: {e}"),
                }
            },
            "search_knowledge_base" => {
                let query = call.args.get("query").and_then(|v| v.as_str()).unwrap_or_default();
                let collection_name = call.args.get("collection_name").and_then(|v| v.as_str()).unwrap_or_default();
                let k = call.args.get("k").and_then(|v| v.as_i64()).unwrap_or(5);
                match knowledge_base::search_knowledge_base(&self.vector_store, query, collection_name, k, None).await
                {
                    Ok(text) => text,
                    Err(e) => format!("knowledge base search failed: {e}"),
                }
            },
            other => format!("unknown tool '{other}'"),
        }
    }

    /// §4.5.7: conversation summarization.
    pub async fn summarize(
        &self,
        user_id: &str,
        request: SummarizeRequest,
    ) -> Result<SummarizeResponse, OrchestratorError> {
        let model = request.model.clone().unwrap_or_else(|| DEFAULT_SUMMARIZATION_MODEL.to_string());
        let llm = self.client_for(&request.provider)?;
        let preserve_recent = request.preserve_recent.unwrap_or(DEFAULT_PRESERVE_RECENT);
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_SUMMARIZE_MAX_TOKENS);
        let history = &request.conversation_history;

        if history.len() <= preserve_recent {
            let stub_tokens = llm.estimate_tokens(
                &history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n"),
            );
            return Ok(SummarizeResponse {
                summary: SummaryMessage {
                    role: "system".to_string(),
                    content: "Conversation is short enough; no summary needed.".to_string(),
                    timestamp: Utc::now(),
                },
                recent_messages: history.clone(),
                compression_ratio: 1.0,
                original_tokens: stub_tokens,
                compressed_tokens: stub_tokens,
                token_usage: None,
                model,
                warning: None,
            });
        }

        let split_at = history.len() - preserve_recent;
        let old = &history[..split_at];
        let recent = history[split_at..].to_vec();

        let formatted_old: String =
            old.iter().map(|m| format!("{}: {}", m.role, m.content)).collect::<Vec<_>>().join("\n");
        let original_tokens = llm.estimate_tokens(&formatted_old);

        let estimated_output = (original_tokens as f64 * SUMMARIZE_OUTPUT_RATIO) as i64;
        self.billing.validate_preflight(user_id, &model, original_tokens + estimated_output).await?;

        let prompt = format!(
            "Summarize the following conversation history concisely, preserving key facts, \
             decisions, and open questions:\n\n{formatted_old}"
        );
        let turn = llm.step(&model, &[LlmMessage::Human { content: prompt }], &[]).await?;

        if let Some(usage) = turn.usage {
            self.billing.consume(user_id, &model, usage.input_tokens, usage.output_tokens).await?;
        }

        let compressed_tokens = llm.estimate_tokens(&turn.content);
        let compression_ratio = compressed_tokens as f64 / original_tokens.max(1) as f64;
        let warning = (compression_ratio >= HIGH_COMPRESSION_RATIO_WARNING)
            .then(|| "Summary did not meaningfully compress the conversation.".to_string());

        let recent_tokens = llm.estimate_tokens(
            &recent.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n"),
        );
        let current_tokens = compressed_tokens + recent_tokens;
        let usage_ratio = current_tokens as f64 / max_tokens as f64;

        let token_usage = turn.usage.map(|usage| TokenUsage {
            current_tokens,
            max_tokens,
            usage_ratio,
            needs_summary: usage_ratio >= NEEDS_SUMMARY_RATIO,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
        });

        Ok(SummarizeResponse {
            summary: SummaryMessage { role: "system".to_string(), content: turn.content, timestamp: Utc::now() },
            recent_messages: recent,
            compression_ratio,
            original_tokens,
            compressed_tokens,
            token_usage,
            model,
            warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_message_prefers_open_file_over_file_list() {
        let context = ChatContext {
            file_path: Some("notes.md".to_string()),
            file_content: Some("hello".to_string()),
            file_list: Some(vec!["a.md".to_string()]),
            send_file_context_to_llm: true,
            ..Default::default()
        };
        let message = build_context_message(&context).unwrap();
        assert!(message.contains("notes.md"));
        assert!(message.contains("hello"));
    }

    #[test]
    fn context_message_suppressed_when_flag_is_false() {
        let context = ChatContext {
            file_path: Some("notes.md".to_string()),
            file_content: Some("hello".to_string()),
            send_file_context_to_llm: false,
            ..Default::default()
        };
        assert!(build_context_message(&context).is_none());
    }

    #[test]
    fn context_message_describes_file_list_when_no_file_open() {
        let context = ChatContext {
            file_list: Some(vec!["a.md".to_string(), "b.md".to_string()]),
            send_file_context_to_llm: true,
            ..Default::default()
        };
        let message = build_context_message(&context).unwrap();
        assert!(message.contains("a.md"));
        assert!(message.contains("b.md"));
    }

    #[test]
    fn history_role_mapping_collapses_ai_and_assistant() {
        let ai = HistoryMessage { role: "ai".to_string(), content: "hi".to_string() };
        let assistant = HistoryMessage { role: "assistant".to_string(), content: "hi".to_string() };
        assert!(matches!(history_role_to_message(&ai), Some(LlmMessage::Assistant { .. })));
        assert!(matches!(history_role_to_message(&assistant), Some(LlmMessage::Assistant { .. })));
    }

    #[test]
    fn unknown_history_role_is_dropped() {
        assert!(history_role_to_message(&HistoryMessage {
            role: "tool".to_string(),
            content: "x".to_string()
        })
        .is_none());
    }
}
