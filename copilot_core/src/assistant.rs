//! Assistant setup, per-chat startup and the stop action.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::{ChatProfile, Settings};
use crate::error::SchemaError;
use crate::persistence::{PersistenceError, SettingsFile, THREAD_ID_KEY, VECTOR_STORE_ID_KEY};
use crate::registry::ToolRegistry;
use crate::session::{
    ASSISTANT_ID_KEY, CHAT_PROFILE_KEY, CURRENT_RUN_STEP_KEY, SessionStore, SessionStoreExt,
};
use crate::stream::backend::{
    Assistant, AssistantBackend, AssistantConfig, AssistantTool, BackendError, VectorStore,
};
use crate::stream::events::RunStep;

const VECTOR_STORE_NAME: &str = "Copilot";

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to store value in session")]
    Session(#[from] serde_json::Error),
}

// Only an absent value means "create one"; unreadable files are errors.
fn is_absent(err: &PersistenceError) -> bool {
    matches!(
        err,
        PersistenceError::MissingFile(_) | PersistenceError::MissingKey(_)
    )
}

/// The persisted thread id, or a new thread whose id is then persisted.
pub async fn get_or_create_thread_id(
    backend: &dyn AssistantBackend,
    store: &SettingsFile,
) -> Result<String, SetupError> {
    match store.retrieve_str(THREAD_ID_KEY) {
        Ok(id) => Ok(id),
        Err(err) if is_absent(&err) => {
            let thread = backend.create_thread().await?;
            store.persist_str(THREAD_ID_KEY, &thread.id)?;
            info!(thread_id = %thread.id, "created thread");
            Ok(thread.id)
        }
        Err(err) => Err(err.into()),
    }
}

/// The persisted vector store, or a new one filled with `documents`.
pub async fn get_or_create_vector_store(
    backend: &dyn AssistantBackend,
    store: &SettingsFile,
    documents: &[PathBuf],
) -> Result<VectorStore, SetupError> {
    match store.retrieve_str(VECTOR_STORE_ID_KEY) {
        Ok(id) => Ok(backend.retrieve_vector_store(&id).await?),
        Err(err) if is_absent(&err) => {
            let vector_store = backend
                .create_vector_store(VECTOR_STORE_NAME, documents)
                .await?;
            store.persist_str(VECTOR_STORE_ID_KEY, &vector_store.id)?;
            info!(
                vector_store_id = %vector_store.id,
                documents = documents.len(),
                "created vector store"
            );
            Ok(vector_store)
        }
        Err(err) => Err(err.into()),
    }
}

/// Creation request: file search over `vector_store` plus every registered tool.
pub fn assistant_config(
    registry: &ToolRegistry,
    settings: &Settings,
    model: &str,
    vector_store: &VectorStore,
) -> Result<AssistantConfig, SchemaError> {
    let mut tools = vec![AssistantTool::FileSearch];
    tools.extend(registry.tool_specs()?.into_iter().map(AssistantTool::from));

    Ok(AssistantConfig {
        name: settings.assistant_name.clone(),
        model: model.to_string(),
        instructions: settings.instructions.clone(),
        tools,
        vector_store_ids: vec![vector_store.id.clone()],
    })
}

pub async fn create_assistant(
    backend: &dyn AssistantBackend,
    registry: &ToolRegistry,
    settings: &Settings,
    model: &str,
    vector_store: &VectorStore,
) -> Result<Assistant, SetupError> {
    let config = assistant_config(registry, settings, model, vector_store)?;
    let assistant = backend.create_assistant(config).await?;
    info!(assistant_id = %assistant.id, model, "created assistant");
    Ok(assistant)
}

/// Identifiers a new chat works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContext {
    pub thread_id: String,
    pub assistant: Assistant,
}

/// Set up a chat: pick the model from the session's chat profile (or
/// `settings.model` when none was chosen), create the assistant and record
/// its id and the thread id in the session.
pub async fn start_chat(
    backend: &dyn AssistantBackend,
    registry: &ToolRegistry,
    settings: &Settings,
    session: &dyn SessionStore,
) -> Result<ChatContext, SetupError> {
    let model = match session.get_as::<ChatProfile>(CHAT_PROFILE_KEY) {
        Some(profile) => profile.model().to_string(),
        None => settings.model.clone(),
    };
    let store = SettingsFile::new(&settings.persistence_path);

    let vector_store = get_or_create_vector_store(backend, &store, &settings.documents).await?;
    let assistant =
        create_assistant(backend, registry, settings, &model, &vector_store).await?;
    let thread_id = get_or_create_thread_id(backend, &store).await?;

    session.set_as(ASSISTANT_ID_KEY, &assistant.id)?;
    session.set_as(crate::session::THREAD_ID_KEY, &thread_id)?;
    Ok(ChatContext {
        thread_id,
        assistant,
    })
}

/// Cancel the run recorded in the session, then delete the session's
/// assistant. A tool call already executing is not interrupted.
pub async fn stop_run(
    session: &dyn SessionStore,
    backend: &dyn AssistantBackend,
) -> Result<(), SetupError> {
    match session.get_as::<RunStep>(CURRENT_RUN_STEP_KEY) {
        Some(step) => {
            backend.cancel_run(&step.thread_id, &step.run_id).await?;
            info!(run_id = %step.run_id, "cancelled run");
        }
        None => debug!("no run step recorded, nothing to cancel"),
    }

    match session.get_as::<String>(ASSISTANT_ID_KEY) {
        Some(assistant_id) => {
            backend.delete_assistant(&assistant_id).await?;
            session.remove(ASSISTANT_ID_KEY);
            info!(%assistant_id, "deleted assistant");
        }
        None => debug!("no assistant recorded, nothing to delete"),
    }
    Ok(())
}
