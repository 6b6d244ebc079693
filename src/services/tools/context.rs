// Per-request tool context (§4.5.2, §9). The legacy implementation threaded
// `set_file_context` / `set_directory_context` / `set_all_files_context`
// through module-level globals (`context_manager.py`); here the same three
// slots are fields on a struct built fresh per chat request and passed
// explicitly to every tool invocation, so concurrent chat requests never
// share mutable state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub title: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OpenFile {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub client_id: String,
    file_context: Option<OpenFile>,
    directory_context: Option<String>,
    all_files: Vec<FileInfo>,
}

impl ToolContext {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), ..Default::default() }
    }

    pub fn set_file_context(&mut self, filename: impl Into<String>, content: impl Into<String>) {
        self.file_context = Some(OpenFile { filename: filename.into(), content: content.into() });
    }

    pub fn set_directory_context(&mut self, path: impl Into<String>) {
        self.directory_context = Some(path.into());
    }

    pub fn set_all_files_context(&mut self, files: Vec<FileInfo>) {
        self.all_files = files;
    }

    pub fn file_context(&self) -> Option<&OpenFile> {
        self.file_context.as_ref()
    }

    pub fn directory_context(&self) -> Option<&str> {
        self.directory_context.as_deref()
    }

    pub fn all_files(&self) -> &[FileInfo] {
        &self.all_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_no_file_open() {
        let ctx = ToolContext::new("client-1");
        assert!(ctx.file_context().is_none());
        assert!(ctx.all_files().is_empty());
    }

    #[test]
    fn set_file_context_is_readable_back() {
        let mut ctx = ToolContext::new("client-1");
        ctx.set_file_context("notes.md", "hello");
        let file = ctx.file_context().unwrap();
        assert_eq!(file.filename, "notes.md");
        assert_eq!(file.content, "hello");
    }
}
