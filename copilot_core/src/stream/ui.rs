//! The chat UI collaborator.
//!
//! Messages and steps are sent once and then mutated through the handle
//! returned by the send call. Handles are owned by a single run.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("failed to send {what} to the chat UI: {reason}")]
    Send { what: &'static str, reason: String },

    #[error("chat UI handle is closed")]
    Closed,
}

/// An attachment rendered inline next to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Pdf { name: String, path: PathBuf },
    File { name: String, path: PathBuf },
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Pdf { name, .. } | Element::File { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDraft {
    pub author: Option<String>,
    pub content: String,
    pub elements: Vec<Element>,
}

impl MessageDraft {
    /// Empty message streamed token by token.
    pub fn streaming(author: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            ..Self::default()
        }
    }

    /// Empty-content message carrying only attachments.
    pub fn attachments(elements: Vec<Element>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }
}

/// A step shown in the transcript for one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDraft {
    pub name: String,
    pub kind: String,
    pub parent_id: Option<String>,
    pub show_input: Option<String>,
    pub language: Option<String>,
    pub start: DateTime<Utc>,
}

impl StepDraft {
    pub fn tool(name: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind: "tool".to_string(),
            parent_id,
            show_input: None,
            language: None,
            start: Utc::now(),
        }
    }
}

#[async_trait]
pub trait MessageHandle: Send + Sync {
    async fn stream_token(&mut self, token: &str) -> Result<(), UiError>;

    /// Replace the streamed content with the final text.
    async fn finalize(&mut self, content: &str) -> Result<(), UiError>;

    fn content(&self) -> String;
}

#[async_trait]
pub trait StepHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn finish(&mut self, end: DateTime<Utc>) -> Result<(), UiError>;
}

#[async_trait]
pub trait ChatUi: Send + Sync {
    type Message: MessageHandle;
    type Step: StepHandle;

    async fn send_message(&self, draft: MessageDraft) -> Result<Self::Message, UiError>;

    async fn send_step(&self, draft: StepDraft) -> Result<Self::Step, UiError>;

    /// Terminal error notice.
    async fn send_error(&self, content: &str) -> Result<(), UiError>;

    /// Id of the UI-side run that new steps are parented to, if any.
    fn current_run_id(&self) -> Option<String>;
}
