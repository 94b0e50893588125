//! Assistant run streaming: events, collaborators and the coordinator.

pub mod backend;
pub mod citations;
pub mod coordinator;
pub mod events;
pub mod ui;

pub use backend::{
    Assistant, AssistantBackend, AssistantConfig, AssistantTool, BackendError, EventStream,
    FileObject, Thread, VectorStore,
};
pub use citations::{ResourceResolver, replace_markers};
pub use coordinator::{CoordinatorError, RunState, StreamCoordinator, StreamCursor};
pub use events::{
    Annotation, AssistantEvent, ErrorEvent, FileCitation, FunctionCall, RequiredAction, RunStep,
    Text, TextDelta, ToolCallKind, ToolCallSnapshot,
};
pub use ui::{ChatUi, Element, MessageDraft, MessageHandle, StepDraft, StepHandle, UiError};
