// Agent tool catalog (§4.5.3). The fixed, version-pinned tool set exposed to
// the LLM: five client-executed file tools (produce a `Command`, handled by
// `command_extractor`), and four server-executed tools that run in-process
// here. Grounded on `original_source/llm/tools/*.py` and
// `llm_clean/utils/tools/web_search_with_rag.py`, generalized off the
// module-level `context_manager` globals into an explicit per-request
// `ToolContext` (§9's "module-level mutable context" redesign).

pub mod chunking;
pub mod context;
pub mod definitions;
pub mod knowledge_base;
pub mod web_search;

pub use context::{FileInfo, ToolContext};
pub use definitions::{tool_catalog, ToolDefinition, ToolSide};
