//! Events emitted while an assistant run streams.
//!
//! The shapes follow the assistants streaming protocol closely enough to be
//! deserialized from it, but only carry the fields the coordinator reads.

use serde::{Deserialize, Serialize};

use crate::dispatch::ToolCallRequest;

/// One event of a run's ordered event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum AssistantEvent {
    RunStepStarted(RunStep),
    TextCreated(Text),
    TextDelta(TextDelta),
    TextDone(Text),
    ToolCallCreated(ToolCallSnapshot),
    /// Carries the accumulated snapshot of the call the delta belongs to.
    ToolCallDelta(ToolCallSnapshot),
    ToolCallDone(ToolCallSnapshot),
    /// The run is paused until outputs for every listed call are submitted.
    RequiresAction(RequiredAction),
    Error(ErrorEvent),
    Done,
}

impl AssistantEvent {
    /// Protocol name of the event, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AssistantEvent::RunStepStarted(_) => "run_step_started",
            AssistantEvent::TextCreated(_) => "text_created",
            AssistantEvent::TextDelta(_) => "text_delta",
            AssistantEvent::TextDone(_) => "text_done",
            AssistantEvent::ToolCallCreated(_) => "tool_call_created",
            AssistantEvent::ToolCallDelta(_) => "tool_call_delta",
            AssistantEvent::ToolCallDone(_) => "tool_call_done",
            AssistantEvent::RequiresAction(_) => "requires_action",
            AssistantEvent::Error(_) => "error",
            AssistantEvent::Done => "done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStep {
    pub id: String,
    pub run_id: String,
    pub thread_id: String,
}

/// Finished (or freshly created) message text with its citation markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// A marker inside message text, optionally citing an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_citation: Option<FileCitation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCitation {
    pub file_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDelta {
    #[serde(default)]
    pub value: Option<String>,
}

impl TextDelta {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallSnapshot {
    pub id: String,
    #[serde(flatten)]
    pub kind: ToolCallKind,
}

impl ToolCallSnapshot {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ToolCallKind::Function {
                function: FunctionCall {
                    name: name.into(),
                    arguments: arguments.into(),
                },
            },
        }
    }

    /// Function name for function calls, the call type otherwise.
    pub fn display_name(&self) -> &str {
        match &self.kind {
            ToolCallKind::Function { function } => &function.name,
            other => other.type_name(),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, ToolCallKind::Function { .. })
    }

    /// The dispatch request for a function call. Built-in tools have none.
    pub fn to_request(&self) -> Option<ToolCallRequest> {
        match &self.kind {
            ToolCallKind::Function { function } => Some(ToolCallRequest::new(
                self.id.clone(),
                function.name.clone(),
                function.arguments.clone(),
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallKind {
    Function { function: FunctionCall },
    CodeInterpreter,
    FileSearch,
}

impl ToolCallKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ToolCallKind::Function { .. } => "function",
            ToolCallKind::CodeInterpreter => "code_interpreter",
            ToolCallKind::FileSearch => "file_search",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text, possibly still incomplete while streaming.
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredAction {
    pub run_id: String,
    pub thread_id: String,
    pub tool_calls: Vec<ToolCallSnapshot>,
}

impl RequiredAction {
    /// Dispatch requests for every pending function call, in order.
    pub fn requests(&self) -> Vec<ToolCallRequest> {
        self.tool_calls
            .iter()
            .filter_map(ToolCallSnapshot::to_request)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}
