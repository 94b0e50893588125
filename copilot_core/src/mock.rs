//! Scripted collaborators for tests and demos.
//!
//! [`ScriptedBackend`] is a queue-based fake: every call to
//! [`start_run`](AssistantBackend::start_run) or
//! [`submit_tool_outputs`](AssistantBackend::submit_tool_outputs) pops the
//! next scripted event stream. Everything the coordinator sends back is
//! recorded for later assertions. [`RecordingUi`] keeps a transcript of
//! every message, step and error notice it is asked to show.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;

use crate::dispatch::ToolCallResult;
use crate::stream::backend::{
    Assistant, AssistantBackend, AssistantConfig, BackendError, EventStream, FileObject, Thread,
    VectorStore,
};
use crate::stream::events::AssistantEvent;
use crate::stream::ui::{
    ChatUi, Element, MessageDraft, MessageHandle, StepDraft, StepHandle, UiError,
};

// Mock state stays usable after a panicking test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// BACKEND
// ============================================================================

/// One scripted stream item. Errors are kept as text so scripts stay `Clone`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptItem {
    Event(AssistantEvent),
    Fail(String),
}

impl From<AssistantEvent> for ScriptItem {
    fn from(event: AssistantEvent) -> Self {
        ScriptItem::Event(event)
    }
}

/// Tool outputs received by [`ScriptedBackend::submit_tool_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub thread_id: String,
    pub run_id: String,
    pub outputs: Vec<ToolCallResult>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    streams: Mutex<VecDeque<Vec<ScriptItem>>>,
    files: Mutex<HashMap<String, FileObject>>,
    vector_stores: Mutex<HashMap<String, VectorStore>>,
    assistants: Mutex<Vec<AssistantConfig>>,
    deleted_assistants: Mutex<Vec<String>>,
    cancelled_runs: Mutex<Vec<(String, String)>>,
    submissions: Mutex<Vec<Submission>>,
    uploads: Mutex<Vec<PathBuf>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the events of the next run or continuation stream.
    pub fn queue_stream(&self, events: impl IntoIterator<Item = AssistantEvent>) -> &Self {
        lock(&self.streams).push_back(events.into_iter().map(ScriptItem::from).collect());
        self
    }

    /// Queue a stream that may fail partway through.
    pub fn queue_script(&self, items: Vec<ScriptItem>) -> &Self {
        lock(&self.streams).push_back(items);
        self
    }

    pub fn add_file(&self, id: impl Into<String>, filename: impl Into<String>) -> &Self {
        let id = id.into();
        lock(&self.files).insert(
            id.clone(),
            FileObject {
                id,
                filename: filename.into(),
            },
        );
        self
    }

    pub fn add_vector_store(&self, id: impl Into<String>, name: impl Into<String>) -> &Self {
        let id = id.into();
        lock(&self.vector_stores).insert(
            id.clone(),
            VectorStore {
                id,
                name: name.into(),
            },
        );
        self
    }

    pub fn remaining_streams(&self) -> usize {
        lock(&self.streams).len()
    }

    pub fn created_assistants(&self) -> Vec<AssistantConfig> {
        lock(&self.assistants).clone()
    }

    pub fn deleted_assistants(&self) -> Vec<String> {
        lock(&self.deleted_assistants).clone()
    }

    /// `(thread_id, run_id)` of every cancelled run.
    pub fn cancelled_runs(&self) -> Vec<(String, String)> {
        lock(&self.cancelled_runs).clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.submissions).clone()
    }

    pub fn uploaded_files(&self) -> Vec<PathBuf> {
        lock(&self.uploads).clone()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
    }

    fn next_stream(&self) -> Result<EventStream, BackendError> {
        let items = lock(&self.streams)
            .pop_front()
            .ok_or_else(|| BackendError::Request("no scripted stream left".to_string()))?;
        let items = items.into_iter().map(|item| match item {
            ScriptItem::Event(event) => Ok(event),
            ScriptItem::Fail(message) => Err(BackendError::Stream(message)),
        });
        Ok(Box::pin(stream::iter(items.collect::<Vec<_>>())))
    }
}

#[async_trait]
impl AssistantBackend for ScriptedBackend {
    async fn create_thread(&self) -> Result<Thread, BackendError> {
        Ok(Thread {
            id: self.next_id("thread"),
        })
    }

    async fn create_assistant(&self, config: AssistantConfig) -> Result<Assistant, BackendError> {
        let assistant = Assistant {
            id: self.next_id("asst"),
            name: config.name.clone(),
            model: config.model.clone(),
        };
        lock(&self.assistants).push(config);
        Ok(assistant)
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), BackendError> {
        lock(&self.deleted_assistants).push(assistant_id.to_string());
        Ok(())
    }

    async fn retrieve_vector_store(
        &self,
        vector_store_id: &str,
    ) -> Result<VectorStore, BackendError> {
        lock(&self.vector_stores)
            .get(vector_store_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                kind: "vector store",
                id: vector_store_id.to_string(),
            })
    }

    async fn create_vector_store(
        &self,
        name: &str,
        files: &[PathBuf],
    ) -> Result<VectorStore, BackendError> {
        let store = VectorStore {
            id: self.next_id("vs"),
            name: name.to_string(),
        };
        lock(&self.uploads).extend_from_slice(files);
        lock(&self.vector_stores).insert(store.id.clone(), store.clone());
        Ok(store)
    }

    async fn start_run(
        &self,
        _thread_id: &str,
        _assistant_id: &str,
    ) -> Result<EventStream, BackendError> {
        self.next_stream()
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolCallResult>,
    ) -> Result<EventStream, BackendError> {
        lock(&self.submissions).push(Submission {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
            outputs,
        });
        self.next_stream()
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), BackendError> {
        lock(&self.cancelled_runs).push((thread_id.to_string(), run_id.to_string()));
        Ok(())
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, BackendError> {
        lock(&self.files)
            .get(file_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                kind: "file",
                id: file_id.to_string(),
            })
    }
}

// ============================================================================
// UI
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedMessage {
    pub author: Option<String>,
    pub content: String,
    pub tokens: Vec<String>,
    pub elements: Vec<Element>,
    pub finalized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStep {
    pub draft: StepDraft,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct Transcript {
    pub messages: Vec<RecordedMessage>,
    pub steps: Vec<RecordedStep>,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct RecordingUi {
    transcript: Arc<Mutex<Transcript>>,
    run_id: Option<String>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent new steps to the UI run `run_id`.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        lock(&self.transcript).messages.clone()
    }

    pub fn steps(&self) -> Vec<RecordedStep> {
        lock(&self.transcript).steps.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.transcript).errors.clone()
    }
}

pub struct RecordedMessageHandle {
    index: usize,
    transcript: Arc<Mutex<Transcript>>,
}

impl RecordedMessageHandle {
    fn with_message<R>(&self, f: impl FnOnce(&mut RecordedMessage) -> R) -> Result<R, UiError> {
        let mut transcript = lock(&self.transcript);
        transcript
            .messages
            .get_mut(self.index)
            .map(f)
            .ok_or(UiError::Closed)
    }
}

#[async_trait]
impl MessageHandle for RecordedMessageHandle {
    async fn stream_token(&mut self, token: &str) -> Result<(), UiError> {
        self.with_message(|m| {
            m.content.push_str(token);
            m.tokens.push(token.to_string());
        })
    }

    async fn finalize(&mut self, content: &str) -> Result<(), UiError> {
        self.with_message(|m| {
            m.content = content.to_string();
            m.finalized = true;
        })
    }

    fn content(&self) -> String {
        self.with_message(|m| m.content.clone()).unwrap_or_default()
    }
}

pub struct RecordedStepHandle {
    index: usize,
    name: String,
    transcript: Arc<Mutex<Transcript>>,
}

#[async_trait]
impl StepHandle for RecordedStepHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn finish(&mut self, end: DateTime<Utc>) -> Result<(), UiError> {
        let mut transcript = lock(&self.transcript);
        let step = transcript
            .steps
            .get_mut(self.index)
            .ok_or(UiError::Closed)?;
        step.end = Some(end);
        Ok(())
    }
}

#[async_trait]
impl ChatUi for RecordingUi {
    type Message = RecordedMessageHandle;
    type Step = RecordedStepHandle;

    async fn send_message(&self, draft: MessageDraft) -> Result<Self::Message, UiError> {
        let mut transcript = lock(&self.transcript);
        transcript.messages.push(RecordedMessage {
            author: draft.author,
            content: draft.content,
            elements: draft.elements,
            ..RecordedMessage::default()
        });
        Ok(RecordedMessageHandle {
            index: transcript.messages.len() - 1,
            transcript: self.transcript.clone(),
        })
    }

    async fn send_step(&self, draft: StepDraft) -> Result<Self::Step, UiError> {
        let mut transcript = lock(&self.transcript);
        let name = draft.name.clone();
        transcript.steps.push(RecordedStep { draft, end: None });
        Ok(RecordedStepHandle {
            index: transcript.steps.len() - 1,
            name,
            transcript: self.transcript.clone(),
        })
    }

    async fn send_error(&self, content: &str) -> Result<(), UiError> {
        lock(&self.transcript).errors.push(content.to_string());
        Ok(())
    }

    fn current_run_id(&self) -> Option<String> {
        self.run_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::events::{Text, TextDelta};
    use futures::StreamExt;
    use tokio_test::{assert_ok, block_on};

    #[test]
    fn test_streams_are_served_in_order() {
        let backend = ScriptedBackend::new();
        backend
            .queue_stream([AssistantEvent::TextCreated(Text::default())])
            .queue_script(vec![
                ScriptItem::Event(AssistantEvent::TextDelta(TextDelta::new("hi"))),
                ScriptItem::Fail("boom".into()),
            ]);

        let first: Vec<_> = block_on(async {
            let stream = assert_ok!(backend.start_run("thread_1", "asst_1").await);
            stream.collect().await
        });
        assert_eq!(first.len(), 1);
        assert!(first[0].is_ok());

        let second: Vec<_> = block_on(async {
            let stream = assert_ok!(
                backend
                    .submit_tool_outputs("thread_1", "run_1", Vec::new())
                    .await
            );
            stream.collect().await
        });
        assert!(second[0].is_ok());
        assert!(matches!(second[1], Err(BackendError::Stream(_))));

        assert_eq!(backend.submissions().len(), 1);
        assert_eq!(backend.remaining_streams(), 0);
        assert!(block_on(backend.start_run("thread_1", "asst_1")).is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let backend = ScriptedBackend::new();
        let a = block_on(backend.create_thread()).unwrap();
        let b = block_on(backend.create_thread()).unwrap();
        assert!(a.id.starts_with("thread_"));
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_recording_ui_transcript() {
        let ui = RecordingUi::new().with_run_id("ui_run");
        let mut message = ui.send_message(MessageDraft::streaming("Copilot")).await.unwrap();
        message.stream_token("Hel").await.unwrap();
        message.stream_token("lo").await.unwrap();
        assert_eq!(message.content(), "Hello");
        message.finalize("Hello.").await.unwrap();

        let mut step = ui
            .send_step(StepDraft::tool("lookup", ui.current_run_id()))
            .await
            .unwrap();
        step.finish(Utc::now()).await.unwrap();
        ui.send_error("oops").await.unwrap();

        let messages = ui.messages();
        assert_eq!(messages[0].content, "Hello.");
        assert_eq!(messages[0].tokens, ["Hel", "lo"]);
        assert!(messages[0].finalized);
        assert_eq!(ui.steps()[0].draft.parent_id.as_deref(), Some("ui_run"));
        assert!(ui.steps()[0].end.is_some());
        assert_eq!(ui.errors(), ["oops"]);
    }
}
