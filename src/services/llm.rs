// LLM agent client abstraction (§4.5.3). The concrete vendor is out of
// scope per §1, but the orchestrator needs something to drive; `LlmClient`
// is the seam, and `GeminiAgentClient` is the one concrete adapter,
// grounded on `services/oauth.rs`'s bare-reqwest HTTP client pattern and
// the normalized `ToolCall` shape from §9's duck-typing redesign.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::services::tools::definitions::ToolDefinition;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("http error calling {provider}: {source}")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned an error response: {0}", provider = "llm provider")]
    Provider(String),

    #[error("{provider} response could not be parsed: {0}", provider = "llm provider")]
    Parse(String),

    #[error("provider is not configured")]
    NotConfigured,
}

/// One normalized conversation turn, independent of the vendor wire format.
/// `Human` carries both the synthetic context message (§4.5.2) and ordinary
/// user turns; `ToolResult` feeds a server- or client-tool's outcome back in.
#[derive(Debug, Clone)]
pub enum LlmMessage {
    System { content: String },
    Human { content: String },
    Assistant { content: String, tool_calls: Vec<ToolInvocation> },
    ToolResult { tool_call_id: String, name: String, content: String },
}

/// A single tool call as emitted by the agent SDK, already collapsed out of
/// whichever shape the vendor used (§9's "duck-typed tool calls"). `id`
/// correlates this call with its eventual `LlmMessage::ToolResult`.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

/// What one `step` call returns: either a final answer (`tool_calls` empty)
/// or a request to run more tools before the turn is done.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Option<UsageMetadata>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Drives one agent step: given the full message history so far and the
    /// tool catalog, returns the model's next assistant turn.
    async fn step(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, LlmError>;

    /// §4.3.5 estimation fallback: a provider-specific tokenizer is
    /// preferred; this default is `len(text)/4`.
    fn estimate_tokens(&self, text: &str) -> i64 {
        ((text.chars().count() as i64) / 4).max(1)
    }
}

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
}

/// Adapter over Gemini's `generateContent` REST API with function calling.
pub struct GeminiAgentClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiAgentClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config, http: reqwest::Client::new() }
    }

    fn build_request_body(messages: &[LlmMessage], tools: &[ToolDefinition]) -> Value {
        let mut contents = Vec::new();
        let mut system_instruction: Option<Value> = None;

        for message in messages {
            match message {
                LlmMessage::System { content } => {
                    system_instruction = Some(json!({ "parts": [{ "text": content }] }));
                },
                LlmMessage::Human { content } => {
                    contents.push(json!({ "role": "user", "parts": [{ "text": content }] }));
                },
                LlmMessage::Assistant { content, tool_calls } => {
                    let mut parts = Vec::new();
                    if !content.is_empty() {
                        parts.push(json!({ "text": content }));
                    }
                    for call in tool_calls {
                        parts.push(json!({
                            "functionCall": { "name": call.name, "args": call.args }
                        }));
                    }
                    contents.push(json!({ "role": "model", "parts": parts }));
                },
                LlmMessage::ToolResult { name, content, .. } => {
                    contents.push(json!({
                        "role": "function",
                        "parts": [{
                            "functionResponse": {
                                "name": name,
                                "response": { "content": content },
                            }
                        }]
                    }));
                },
            }
        }

        let function_declarations: Vec<Value> = tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "parameters": t.parameters }))
            .collect();

        let mut body = json!({
            "contents": contents,
            "tools": [{ "functionDeclarations": function_declarations }],
        });
        if let Some(system) = system_instruction {
            body["systemInstruction"] = system;
        }
        body
    }

    fn parse_response(body: &Value) -> Result<AssistantTurn, LlmError> {
        let candidate = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .ok_or_else(|| LlmError::Parse("no candidates in response".to_string()))?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .cloned()
            .unwrap_or_default();

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                content.push_str(text);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string();
                let args = call
                    .get("args")
                    .and_then(|a| a.as_object())
                    .cloned()
                    .unwrap_or_default();
                tool_calls.push(ToolInvocation { id: format!("call_{index}"), name, args });
            }
        }

        let usage = body.get("usageMetadata").map(|u| UsageMetadata {
            input_tokens: u.get("promptTokenCount").and_then(|v| v.as_i64()).unwrap_or(0),
            output_tokens: u.get("candidatesTokenCount").and_then(|v| v.as_i64()).unwrap_or(0),
            total_tokens: u.get("totalTokenCount").and_then(|v| v.as_i64()).unwrap_or(0),
        });

        Ok(AssistantTurn { content, tool_calls, usage })
    }
}

#[async_trait]
impl LlmClient for GeminiAgentClient {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn step(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: &[ToolDefinition],
    ) -> Result<AssistantTurn, LlmError> {
        if self.config.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let url = format!("{GEMINI_ENDPOINT}/{model}:generateContent?key={}", self.config.api_key);
        let body = Self::build_request_body(messages, tools);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http { provider: "gemini".to_string(), source: e })?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Provider(text));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Self::parse_response(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_collects_text_and_tool_calls() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Sure, I'll do that." },
                        { "functionCall": { "name": "create_file", "args": { "title": "Notes" } } }
                    ]
                }
            }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15 }
        });

        let turn = GeminiAgentClient::parse_response(&body).unwrap();
        assert_eq!(turn.content, "Sure, I'll do that.");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "create_file");
        assert_eq!(turn.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_response_errors_without_candidates() {
        let body = json!({ "candidates": [] });
        assert!(GeminiAgentClient::parse_response(&body).is_err());
    }

    #[test]
    fn estimate_tokens_falls_back_to_len_over_four() {
        struct Dummy;
        #[async_trait]
        impl LlmClient for Dummy {
            fn provider(&self) -> &'static str {
                "dummy"
            }
            async fn step(
                &self,
                _model: &str,
                _messages: &[LlmMessage],
                _tools: &[ToolDefinition],
            ) -> Result<AssistantTurn, LlmError> {
                unreachable!()
            }
        }
        assert_eq!(Dummy.estimate_tokens("12345678"), 2);
    }
}
