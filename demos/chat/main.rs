//! Offline chat run against a scripted backend.
//!
//! The backend replays a run in which the model asks `pdf_qa_tool` for the
//! title of a paper and then streams its answer. The console front-end
//! prints tokens as they arrive and tool steps as they open and close.
//!
//! ```text
//! RUST_LOG=copilot_core=debug cargo run -p demos --example chat
//! ```

use std::io::Write;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copilot_rs::mock::ScriptedBackend;
use copilot_rs::prelude::*;
use copilot_rs::stream::events::{RequiredAction, RunStep, Text, TextDelta, ToolCallSnapshot};
use copilot_rs::stream::{
    AssistantBackend, AssistantEvent, MessageDraft, MessageHandle, StepDraft, StepHandle, UiError,
};
use copilot_rs::ChatUi;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Answer questions about the PDF papers in the knowledge base.
#[tool]
async fn pdf_qa_tool(
    #[param(description = "The question to answer about the papers.")] query: String,
) -> String {
    if query.contains("Concept Drift") {
        "ConceptDrift: Uncovering Biases through the Lens of Foundational Models.".to_string()
    } else {
        "No matching paper found.".to_string()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Console front-end
// ────────────────────────────────────────────────────────────────────────────

struct Console;

struct ConsoleMessage {
    content: String,
}

struct ConsoleStep {
    name: String,
    start: DateTime<Utc>,
}

#[async_trait]
impl MessageHandle for ConsoleMessage {
    async fn stream_token(&mut self, token: &str) -> Result<(), UiError> {
        self.content.push_str(token);
        print!("{token}");
        std::io::stdout().flush().map_err(|e| UiError::Send {
            what: "token",
            reason: e.to_string(),
        })
    }

    async fn finalize(&mut self, content: &str) -> Result<(), UiError> {
        self.content = content.to_string();
        println!("\n[final] {content}");
        Ok(())
    }

    fn content(&self) -> String {
        self.content.clone()
    }
}

#[async_trait]
impl StepHandle for ConsoleStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn finish(&mut self, end: DateTime<Utc>) -> Result<(), UiError> {
        let elapsed = end - self.start;
        println!("[step] {} finished in {}ms", self.name, elapsed.num_milliseconds());
        Ok(())
    }
}

#[async_trait]
impl ChatUi for Console {
    type Message = ConsoleMessage;
    type Step = ConsoleStep;

    async fn send_message(&self, draft: MessageDraft) -> Result<ConsoleMessage, UiError> {
        if let Some(author) = &draft.author {
            print!("{author}: ");
        }
        for element in &draft.elements {
            println!("[attachment] {}", element.name());
        }
        Ok(ConsoleMessage {
            content: draft.content,
        })
    }

    async fn send_step(&self, draft: StepDraft) -> Result<ConsoleStep, UiError> {
        println!("[step] {} ({})", draft.name, draft.kind);
        Ok(ConsoleStep {
            name: draft.name,
            start: draft.start,
        })
    }

    async fn send_error(&self, content: &str) -> Result<(), UiError> {
        eprintln!("[error] {content}");
        Ok(())
    }

    fn current_run_id(&self) -> Option<String> {
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted run
// ────────────────────────────────────────────────────────────────────────────

fn tool_round() -> Vec<AssistantEvent> {
    let arguments = json!({"query": "What is the title of the 'Concept Drift' paper?"});
    let call = ToolCallSnapshot::function("call_1", "pdf_qa_tool", arguments.to_string());
    vec![
        AssistantEvent::RunStepStarted(RunStep {
            id: "step_1".into(),
            run_id: "run_1".into(),
            thread_id: "thread_1".into(),
        }),
        AssistantEvent::ToolCallCreated(ToolCallSnapshot::function("call_1", "pdf_qa_tool", "")),
        AssistantEvent::ToolCallDone(call.clone()),
        AssistantEvent::RequiresAction(RequiredAction {
            run_id: "run_1".into(),
            thread_id: "thread_1".into(),
            tool_calls: vec![call],
        }),
    ]
}

fn answer() -> Vec<AssistantEvent> {
    let text = "The paper is titled \"ConceptDrift: Uncovering Biases through the Lens of Foundational Models.\"";
    let mut events = vec![AssistantEvent::TextCreated(Text::default())];
    events.extend(
        text.split_inclusive(' ')
            .map(|word| AssistantEvent::TextDelta(TextDelta::new(word))),
    );
    events.push(AssistantEvent::TextDone(Text::new(text)));
    events.push(AssistantEvent::Done);
    events
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // The scripted backend forgets its vector stores between runs, so the
    // ids it hands out are persisted in a directory that lives for one run.
    let state_dir = tempfile::tempdir()?;
    let mut settings = Settings::from_env()?;
    settings.persistence_path = state_dir.path().join("persistence.json");

    let registry = collect_tools()?;
    let backend = ScriptedBackend::new();
    backend.queue_stream(tool_round()).queue_stream(answer());
    let session = InMemorySession::new();
    session.set_as(copilot_rs::session::CHAT_PROFILE_KEY, &ChatProfile::default())?;

    let chat = start_chat(&backend, &registry, &settings, &session).await?;
    info!(assistant = %chat.assistant.id, thread = %chat.thread_id, "chat started");

    let ui = Console;
    let stream = backend.start_run(&chat.thread_id, &chat.assistant.id).await?;
    let mut coordinator = StreamCoordinator::new(&backend, &ui, &session, &registry)
        .assistant_name(settings.assistant_name.clone())
        .resolver(settings.resource_resolver());
    let state = coordinator.run(stream).await;
    info!(%state, "run finished");

    stop_run(&session, &backend).await?;
    Ok(())
}
