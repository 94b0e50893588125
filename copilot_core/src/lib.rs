#![deny(unsafe_code)]

//! Tool-calling bridge between typed Rust functions and an assistants-style
//! model API.
//!
//! Tools describe their signature ([`schema`], [`signature`]), live in an
//! explicitly constructed [`ToolRegistry`], are executed by a
//! [`ToolDispatcher`] and are driven from a run's event stream by the
//! [`StreamCoordinator`](stream::StreamCoordinator).

pub mod assistant;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mock;
pub mod output;
pub mod persistence;
pub mod registry;
pub mod schema;
pub mod session;
pub mod signature;
pub mod stream;

// Re-exported for use in generated code
pub use futures;
pub use inventory;
pub use serde_json;

pub use assistant::{
    ChatContext, SetupError, assistant_config, create_assistant, get_or_create_thread_id,
    get_or_create_vector_store, start_chat, stop_run,
};
pub use config::{ChatProfile, ConfigError, Settings};
pub use dispatch::{
    OutputChannel, PlainTextChannel, ToolCallRequest, ToolCallResult, ToolDispatcher, ToolOutcome,
};
pub use error::{SchemaError, ToolError, ToolFailure};
pub use output::IntoToolOutput;
pub use persistence::{PersistenceError, SettingsFile};
pub use registry::{
    Arguments, ToolFunc, ToolRegistration, ToolRegistry, reject_unexpected, take_argument,
    take_argument_or,
};
pub use schema::{ScalarType, ToolSchema, TypeDescriptor, TypeShape, classify};
pub use session::{InMemorySession, SessionStore, SessionStoreExt};
pub use signature::{
    FunctionDefinition, ParamSpec, ReturnSpec, ToolDescriptor, ToolParameterDescriptor, ToolSignature,
    ToolSpec, describe,
};
