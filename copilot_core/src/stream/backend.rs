//! The model-driving collaborator.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::dispatch::ToolCallResult;
use crate::signature::{FunctionDefinition, ToolSpec};
use crate::stream::events::AssistantEvent;

/// A pinned, boxed, `Send` stream of run events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<AssistantEvent, BackendError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to the assistant backend failed: {0}")]
    Request(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("event stream failed: {0}")]
    Stream(String),

    #[error("invalid backend payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Entry of an assistant's `tools` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantTool {
    FileSearch,
    Function { function: FunctionDefinition },
}

impl From<ToolSpec> for AssistantTool {
    fn from(spec: ToolSpec) -> Self {
        AssistantTool::Function {
            function: spec.function,
        }
    }
}

/// Creation request for an assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub tools: Vec<AssistantTool>,
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub name: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    pub name: String,
}

/// Metadata of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
}

/// Assistants-style provider: threads, assistants, vector stores, and
/// streamed runs that may pause for tool outputs.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn create_thread(&self) -> Result<Thread, BackendError>;

    async fn create_assistant(&self, config: AssistantConfig) -> Result<Assistant, BackendError>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), BackendError>;

    async fn retrieve_vector_store(&self, vector_store_id: &str)
    -> Result<VectorStore, BackendError>;

    /// Create a vector store and upload `files` into it.
    async fn create_vector_store(
        &self,
        name: &str,
        files: &[std::path::PathBuf],
    ) -> Result<VectorStore, BackendError>;

    /// Start a run of `assistant_id` on `thread_id` and stream its events.
    async fn start_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<EventStream, BackendError>;

    /// Submit tool outputs for a paused run. The returned stream continues
    /// the same run.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolCallResult>,
    ) -> Result<EventStream, BackendError>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), BackendError>;

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_tool_wire_format() {
        let spec = ToolSpec::new(
            "pdf_qa_tool".into(),
            "Answer a question about the uploaded PDFs.".into(),
            json!({"type": "object", "properties": {}, "required": []}),
        );
        let tools = vec![AssistantTool::FileSearch, AssistantTool::from(spec)];
        let value = serde_json::to_value(&tools).unwrap();
        assert_eq!(value[0], json!({"type": "file_search"}));
        assert_eq!(value[1]["type"], "function");
        assert_eq!(value[1]["function"]["name"], "pdf_qa_tool");
    }
}
