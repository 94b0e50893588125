//! Demultiplexes a run's event stream into UI updates and tool dispatch.

use std::error::Error as _;
use std::fmt;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::dispatch::{OutputChannel, PlainTextChannel, ToolCallResult, ToolDispatcher};
use crate::registry::ToolRegistry;
use crate::session::{CURRENT_RUN_STEP_KEY, SessionStore, SessionStoreExt};
use crate::stream::backend::{AssistantBackend, BackendError, EventStream};
use crate::stream::citations::{ResourceResolver, replace_markers};
use crate::stream::events::{AssistantEvent, RequiredAction, Text, TextDelta, ToolCallSnapshot};
use crate::stream::ui::{
    ChatUi, MessageDraft, MessageHandle, StepDraft, StepHandle, UiError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    MessageStreaming,
    ToolCallPending,
    ToolCallStreaming,
    Done,
    Errored,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Errored)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::MessageStreaming => "message_streaming",
            RunState::ToolCallPending => "tool_call_pending",
            RunState::ToolCallStreaming => "tool_call_streaming",
            RunState::Done => "done",
            RunState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Failures that end a run.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("{event} received with no open message")]
    NoOpenMessage { event: &'static str },

    #[error("{event} received with no open tool step")]
    NoOpenStep { event: &'static str },

    #[error("assistant backend error")]
    Backend(#[from] BackendError),

    #[error("chat UI error")]
    Ui(#[from] UiError),

    #[error("failed to record run step in session")]
    Session(#[from] serde_json::Error),
}

impl CoordinatorError {
    /// The error and every source below it, one per line.
    pub fn report(&self) -> String {
        let mut report = format!("{self}");
        let mut source = self.source();
        while let Some(err) = source {
            report.push_str(&format!("\n  caused by: {err}"));
            source = err.source();
        }
        report
    }
}

/// In-flight handles of the run being coordinated.
pub struct StreamCursor<M, S> {
    pub current_message: Option<M>,
    pub current_step: Option<S>,
    pub current_tool_call_id: Option<String>,
}

impl<M, S> Default for StreamCursor<M, S> {
    fn default() -> Self {
        Self {
            current_message: None,
            current_step: None,
            current_tool_call_id: None,
        }
    }
}

impl<M: MessageHandle, S: StepHandle> fmt::Debug for StreamCursor<M, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCursor")
            .field(
                "current_message",
                &self.current_message.as_ref().map(|m| m.content()),
            )
            .field("current_step", &self.current_step.as_ref().map(|s| s.name()))
            .field("current_tool_call_id", &self.current_tool_call_id)
            .finish()
    }
}

struct Frame {
    stream: EventStream,
    continuation: bool,
}

enum Flow {
    Continue,
    Push(EventStream),
    Stop,
}

/// Drives one run: owns the cursor and the UI handles, dispatches tool calls
/// when the run pauses, and keeps consuming the continuation streams.
pub struct StreamCoordinator<'a, U: ChatUi, C = PlainTextChannel> {
    backend: &'a dyn AssistantBackend,
    ui: &'a U,
    session: &'a dyn SessionStore,
    dispatcher: ToolDispatcher<'a, C>,
    resolver: ResourceResolver,
    assistant_name: String,
    cursor: StreamCursor<U::Message, U::Step>,
    message_open: bool,
    state: RunState,
}

impl<'a, U: ChatUi> StreamCoordinator<'a, U, PlainTextChannel> {
    pub fn new(
        backend: &'a dyn AssistantBackend,
        ui: &'a U,
        session: &'a dyn SessionStore,
        registry: &'a ToolRegistry,
    ) -> Self {
        Self::with_dispatcher(backend, ui, session, ToolDispatcher::new(registry))
    }
}

impl<'a, U: ChatUi, C: OutputChannel> StreamCoordinator<'a, U, C> {
    pub fn with_dispatcher(
        backend: &'a dyn AssistantBackend,
        ui: &'a U,
        session: &'a dyn SessionStore,
        dispatcher: ToolDispatcher<'a, C>,
    ) -> Self {
        Self {
            backend,
            ui,
            session,
            dispatcher,
            resolver: ResourceResolver::default(),
            assistant_name: "Copilot".to_string(),
            cursor: StreamCursor::default(),
            message_open: false,
            state: RunState::Idle,
        }
    }

    pub fn assistant_name(mut self, name: impl Into<String>) -> Self {
        self.assistant_name = name.into();
        self
    }

    pub fn resolver(mut self, resolver: ResourceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn cursor(&self) -> &StreamCursor<U::Message, U::Step> {
        &self.cursor
    }

    pub fn into_cursor(self) -> StreamCursor<U::Message, U::Step> {
        self.cursor
    }

    /// Consume `stream` and every continuation it leads to.
    ///
    /// Events are processed one at a time. Submitting tool outputs pushes the
    /// continuation onto a stack, which is drained before the enclosing
    /// stream resumes. An error event or any failure ends the run.
    pub async fn run(&mut self, stream: EventStream) -> RunState {
        let mut frames = vec![Frame {
            stream,
            continuation: false,
        }];

        while let Some(frame) = frames.last_mut() {
            let continuation = frame.continuation;
            let event = match frame.stream.next().await {
                None => {
                    frames.pop();
                    continue;
                }
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    self.fail(err.into()).await;
                    return self.state;
                }
            };

            debug!(event = event.kind(), depth = frames.len(), state = %self.state, "run event");
            match self.handle(event, continuation).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Push(next)) => frames.push(Frame {
                    stream: next,
                    continuation: true,
                }),
                Ok(Flow::Stop) => return self.state,
                Err(err) => {
                    self.fail(err).await;
                    return self.state;
                }
            }
        }

        self.transition(RunState::Done);
        self.state
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "run state change");
            self.state = next;
        }
    }

    async fn fail(&mut self, err: CoordinatorError) {
        let report = err.report();
        error!(error = %report, "run failed");
        self.transition(RunState::Errored);
        if let Err(ui_err) = self.ui.send_error(&report).await {
            error!(error = %ui_err, "could not show run failure");
        }
    }

    async fn handle(
        &mut self,
        event: AssistantEvent,
        continuation: bool,
    ) -> Result<Flow, CoordinatorError> {
        match event {
            AssistantEvent::RunStepStarted(step) => {
                self.session.set_as(CURRENT_RUN_STEP_KEY, &step)?;
            }
            AssistantEvent::TextCreated(_) => {
                if !self.message_open {
                    self.open_message().await?;
                }
                self.transition(RunState::MessageStreaming);
            }
            AssistantEvent::TextDelta(delta) => self.on_text_delta(delta, continuation).await?,
            AssistantEvent::TextDone(text) => self.on_text_done(text).await?,
            AssistantEvent::ToolCallCreated(call) => {
                self.open_step(&call, false).await?;
                self.transition(RunState::ToolCallStreaming);
            }
            AssistantEvent::ToolCallDelta(call) => {
                if self.cursor.current_tool_call_id.as_deref() != Some(call.id.as_str()) {
                    self.open_step(&call, true).await?;
                }
                self.transition(RunState::ToolCallStreaming);
            }
            AssistantEvent::ToolCallDone(_) => {
                let step = self
                    .cursor
                    .current_step
                    .as_mut()
                    .ok_or(CoordinatorError::NoOpenStep {
                        event: "tool_call_done",
                    })?;
                step.finish(Utc::now()).await?;
            }
            AssistantEvent::RequiresAction(action) => {
                let continuation = self.submit_tool_outputs(action).await?;
                return Ok(Flow::Push(continuation));
            }
            AssistantEvent::Error(event) => {
                warn!(message = %event.message, "run reported an error");
                self.transition(RunState::Errored);
                self.ui.send_error(&event.message).await?;
                return Ok(Flow::Stop);
            }
            AssistantEvent::Done => {}
        }
        Ok(Flow::Continue)
    }

    async fn open_message(&mut self) -> Result<(), CoordinatorError> {
        let message = self
            .ui
            .send_message(MessageDraft::streaming(self.assistant_name.clone()))
            .await?;
        self.cursor.current_message = Some(message);
        self.message_open = true;
        Ok(())
    }

    async fn on_text_delta(
        &mut self,
        delta: TextDelta,
        continuation: bool,
    ) -> Result<(), CoordinatorError> {
        let Some(token) = delta.value.filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        if self.cursor.current_message.is_none() {
            // Continuations may stream text without announcing it first.
            if !continuation {
                return Err(CoordinatorError::NoOpenMessage {
                    event: "text_delta",
                });
            }
            self.open_message().await?;
            self.transition(RunState::MessageStreaming);
        }
        if let Some(message) = self.cursor.current_message.as_mut() {
            message.stream_token(&token).await?;
        }
        Ok(())
    }

    async fn on_text_done(&mut self, text: Text) -> Result<(), CoordinatorError> {
        let message = self
            .cursor
            .current_message
            .as_mut()
            .ok_or(CoordinatorError::NoOpenMessage { event: "text_done" })?;
        message.finalize(&replace_markers(&text)).await?;
        self.message_open = false;

        let mut elements = Vec::new();
        for citation in text.annotations.iter().filter_map(|a| a.file_citation.as_ref()) {
            let file = self.backend.retrieve_file(&citation.file_id).await?;
            if let Some(element) = self.resolver.resolve(&file) {
                elements.push(element);
            }
        }
        if !elements.is_empty() {
            debug!(count = elements.len(), "attaching cited files");
            self.ui
                .send_message(MessageDraft::attachments(elements))
                .await?;
        }
        Ok(())
    }

    /// Open a step for `call`, replacing the current one without closing it.
    async fn open_step(
        &mut self,
        call: &ToolCallSnapshot,
        from_delta: bool,
    ) -> Result<(), CoordinatorError> {
        let mut draft = StepDraft::tool(call.display_name(), self.ui.current_run_id());
        if from_delta {
            if call.is_function() {
                draft.language = Some("json".to_string());
            }
        } else {
            draft.show_input = Some("python".to_string());
        }

        debug!(call_id = %call.id, step = %draft.name, "opening tool step");
        let step = self.ui.send_step(draft).await?;
        self.cursor.current_step = Some(step);
        self.cursor.current_tool_call_id = Some(call.id.clone());
        Ok(())
    }

    async fn submit_tool_outputs(
        &mut self,
        action: RequiredAction,
    ) -> Result<EventStream, CoordinatorError> {
        self.transition(RunState::ToolCallPending);
        let requests = action.requests();
        info!(run_id = %action.run_id, calls = requests.len(), "run requires tool outputs");

        let outputs: Vec<ToolCallResult> =
            self.dispatcher.execute_many(requests).collect().await;
        let continuation = self
            .backend
            .submit_tool_outputs(&action.thread_id, &action.run_id, outputs)
            .await?;
        Ok(continuation)
    }
}
