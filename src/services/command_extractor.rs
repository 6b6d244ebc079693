// Command extraction (§4.5.6), grounded on `CommandExtractorService` in
// `original_source/llm_clean/domain/services/command_extractor_service.py`.
// The Python service branches on two agent-result shapes (LangChain 1.0
// `messages[].tool_calls` vs legacy `intermediate_steps`); the normalized
// `ToolCall` type (§9's redesign) collapses that ambiguity at the single
// point where the agent SDK's response is parsed, so this module only ever
// sees one shape.

use serde_json::{Map, Value};

/// One LLM tool invocation, already normalized out of whichever shape the
/// agent SDK returned it in.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub args: Map<String, Value>,
}

/// A command destined for the client, per §4.5.6's table.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LlmCommand {
    CreateFile {
        title: String,
        content: String,
        category: Option<String>,
        tags: Option<Vec<String>>,
    },
    DeleteFile {
        title: String,
    },
    RenameFile {
        title: String,
        new_title: String,
    },
    EditFile {
        title: String,
        content: String,
    },
    EditFileLines {
        title: String,
        start_line: i64,
        end_line: i64,
        content: String,
    },
}

/// Extracts commands from the final message list's tool calls. Unknown tool
/// names, and tools with no client-side effect (`read_file`, `search_files`),
/// are skipped.
pub fn extract_commands(tool_calls: &[ToolCall]) -> Vec<LlmCommand> {
    tool_calls
        .iter()
        .filter_map(|call| dispatch(call))
        .collect()
}

fn dispatch(call: &ToolCall) -> Option<LlmCommand> {
    match call.name.as_str() {
        "create_file" => handle_create_file(&call.args),
        "delete_file" => handle_delete_file(&call.args),
        "rename_file" => handle_rename_file(&call.args),
        "edit_file" => handle_edit_file(&call.args),
        "edit_file_lines" => handle_edit_file_lines(&call.args),
        "read_file" | "search_files" | "web_search_with_rag" | "search_knowledge_base" => None,
        other => {
            tracing::debug!(tool = other, "skipping unknown tool call");
            None
        },
    }
}

fn string_field(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)?.as_str().map(str::to_string)
}

fn handle_create_file(args: &Map<String, Value>) -> Option<LlmCommand> {
    let title = string_field(args, "title")?;
    let content = string_field(args, "content").unwrap_or_default();
    let category = string_field(args, "category").filter(|c| !c.is_empty());
    let tags = string_field(args, "tags").filter(|t| !t.is_empty()).map(|tags| {
        tags.split(',').map(|t| t.trim().to_string()).collect::<Vec<_>>()
    });

    Some(LlmCommand::CreateFile { title, content, category, tags })
}

fn handle_delete_file(args: &Map<String, Value>) -> Option<LlmCommand> {
    Some(LlmCommand::DeleteFile { title: string_field(args, "title")? })
}

fn handle_rename_file(args: &Map<String, Value>) -> Option<LlmCommand> {
    let title = string_field(args, "title")?;
    let new_title = string_field(args, "new_title")?;
    Some(LlmCommand::RenameFile { title, new_title })
}

fn handle_edit_file(args: &Map<String, Value>) -> Option<LlmCommand> {
    let title = string_field(args, "title")?;
    let content = string_field(args, "content")?;
    Some(LlmCommand::EditFile { title, content })
}

/// Accepts line numbers as either a JSON integer or a JSON float (the LLM
/// sometimes emits `3.0`), rejecting non-integral floats per §9.
fn coerce_line_number(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

fn handle_edit_file_lines(args: &Map<String, Value>) -> Option<LlmCommand> {
    let title = string_field(args, "title")?;
    let content = string_field(args, "content").unwrap_or_default();
    let start_line = coerce_line_number(args.get("start_line")?)?;
    let end_line = coerce_line_number(args.get("end_line")?)?;
    if start_line > end_line {
        return None;
    }

    Some(LlmCommand::EditFileLines { title, start_line, end_line, content })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            args: args.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn create_file_splits_comma_separated_tags() {
        let calls = vec![call(
            "create_file",
            json!({"title": "Notes", "content": "hi", "tags": "a, b ,c"}),
        )];
        let commands = extract_commands(&calls);
        assert_eq!(
            commands,
            vec![LlmCommand::CreateFile {
                title: "Notes".to_string(),
                content: "hi".to_string(),
                category: None,
                tags: Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
            }]
        );
    }

    #[test]
    fn create_file_without_title_is_skipped() {
        let calls = vec![call("create_file", json!({"content": "hi"}))];
        assert!(extract_commands(&calls).is_empty());
    }

    #[test]
    fn edit_file_lines_coerces_float_line_numbers() {
        let calls = vec![call(
            "edit_file_lines",
            json!({"title": "Notes", "start_line": 3.0, "end_line": 5.0, "content": "x"}),
        )];
        let commands = extract_commands(&calls);
        assert_eq!(
            commands,
            vec![LlmCommand::EditFileLines {
                title: "Notes".to_string(),
                start_line: 3,
                end_line: 5,
                content: "x".to_string(),
            }]
        );
    }

    #[test]
    fn edit_file_lines_rejects_non_integral_float() {
        let calls = vec![call(
            "edit_file_lines",
            json!({"title": "Notes", "start_line": 3.5, "end_line": 5, "content": "x"}),
        )];
        assert!(extract_commands(&calls).is_empty());
    }

    #[test]
    fn edit_file_lines_rejects_start_after_end() {
        let calls = vec![call(
            "edit_file_lines",
            json!({"title": "Notes", "start_line": 5, "end_line": 3, "content": "x"}),
        )];
        assert!(extract_commands(&calls).is_empty());
    }

    #[test]
    fn read_file_and_search_files_emit_no_command() {
        let calls = vec![
            call("read_file", json!({"title": "Notes"})),
            call("search_files", json!({"query": "todo"})),
        ];
        assert!(extract_commands(&calls).is_empty());
    }

    #[test]
    fn unknown_tool_is_skipped() {
        let calls = vec![call("frobnicate", json!({}))];
        assert!(extract_commands(&calls).is_empty());
    }
}
