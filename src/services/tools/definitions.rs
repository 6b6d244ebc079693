// The fixed, version-pinned tool catalog (§4.5.3's table) exposed to the
// agent. `parameters` is a JSON-schema-shaped object good enough for any
// tool-using agent SDK to present to the LLM; the concrete SDK wiring is out
// of scope (§1).

use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSide {
    /// Produces a `Command`, executed by the client.
    Client,
    /// Runs in-process, possibly against C4 or the WS correlator.
    Server,
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub side: ToolSide,
    pub description: &'static str,
    pub parameters: Value,
}

pub fn tool_catalog() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "create_file",
            side: ToolSide::Client,
            description: "Create a new note file with the given title and content.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "content": {"type": "string"},
                    "category": {"type": "string"},
                    "tags": {"type": "string", "description": "comma-separated tags"},
                },
                "required": ["title"],
            }),
        },
        ToolDefinition {
            name: "delete_file",
            side: ToolSide::Client,
            description: "Delete a note file by title.",
            parameters: json!({
                "type": "object",
                "properties": {"title": {"type": "string"}},
                "required": ["title"],
            }),
        },
        ToolDefinition {
            name: "rename_file",
            side: ToolSide::Client,
            description: "Rename a note file.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "new_title": {"type": "string"},
                },
                "required": ["title", "new_title"],
            }),
        },
        ToolDefinition {
            name: "edit_file",
            side: ToolSide::Client,
            description: "Replace the entire content of a note file.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["title", "content"],
            }),
        },
        ToolDefinition {
            name: "edit_file_lines",
            side: ToolSide::Client,
            description: "Replace a 1-based, inclusive line range within a note file.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "start_line": {"type": "integer"},
                    "end_line": {"type": "integer"},
                    "content": {"type": "string"},
                },
                "required": ["title", "start_line", "end_line", "content"],
            }),
        },
        ToolDefinition {
            name: "read_file",
            side: ToolSide::Server,
            description: "Fetch the content of a note file by title from the connected client.",
            parameters: json!({
                "type": "object",
                "properties": {"title": {"type": "string"}},
                "required": ["title"],
            }),
        },
        ToolDefinition {
            name: "search_files",
            side: ToolSide::Server,
            description: "Search the connected client's files by a fuzzy title/content query.",
            parameters: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"],
            }),
        },
        ToolDefinition {
            name: "web_search_with_rag",
            side: ToolSide::Server,
            description: "Run a web search, embed the results into a fresh temporary \
                collection, and return its name. Follow up with search_knowledge_base \
                against that collection name.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "default": 5},
                    "collection_ttl_hours": {"type": "number", "default": 1.0},
                },
                "required": ["query"],
            }),
        },
        ToolDefinition {
            name: "search_knowledge_base",
            side: ToolSide::Server,
            description: "Similarity search over a named vector collection.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "collection_name": {"type": "string"},
                    "k": {"type": "integer", "default": 5},
                },
                "required": ["query", "collection_name"],
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_five_client_tools_and_four_server_tools() {
        let catalog = tool_catalog();
        let client_count = catalog.iter().filter(|t| t.side == ToolSide::Client).count();
        let server_count = catalog.iter().filter(|t| t.side == ToolSide::Server).count();
        assert_eq!(client_count, 5);
        assert_eq!(server_count, 4);
    }
}
