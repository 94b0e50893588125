#![deny(unsafe_code)]

//! **copilot-rs** connects typed Rust functions to an assistants-style chat
//! model.
//!
//! Annotate a function with [`macro@tool`] and it is collected into a
//! [`ToolRegistry`] at startup. The model sees the generated function
//! specifications, and every `requires_action` event of a streamed run is
//! answered by calling the matching tools.
//!
//! ```rust
//! use copilot_rs::prelude::*;
//!
//! /// Add two numbers.
//! #[tool]
//! fn add(
//!     #[param(description = "First addend")] a: i64,
//!     #[param(description = "Second addend")] b: i64,
//! ) -> i64 {
//!     a + b
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = collect_tools()?;
//! assert!(registry.contains("add"));
//! # Ok(())
//! # }
//! ```

pub mod prelude;

// The macros resolve generated paths through this re-export.
#[doc(hidden)]
pub use copilot_core;

pub use copilot_core::stream::{
    AssistantBackend, AssistantEvent, ChatUi, CoordinatorError, RunState, StreamCoordinator,
};
pub use copilot_core::{
    ChatContext, ChatProfile, ConfigError, InMemorySession, IntoToolOutput, OutputChannel,
    ParamSpec, PlainTextChannel, ReturnSpec, SchemaError, SessionStore, SessionStoreExt, Settings,
    SettingsFile, ToolCallRequest, ToolCallResult, ToolDescriptor, ToolDispatcher, ToolError,
    ToolFailure, ToolOutcome, ToolRegistry, ToolSchema, ToolSignature, ToolSpec, TypeDescriptor,
    TypeShape, classify, describe, start_chat, stop_run,
};
pub use copilot_core::{assistant, config, dispatch, mock, session, stream};
pub use copilot_macros::{ToolSchema, tool};

use serde_json::Value;

/// Registry of every `#[tool]` function linked into the program.
pub fn collect_tools() -> Result<ToolRegistry, ToolError> {
    ToolRegistry::collect_tools()
}

/// Function specifications of every `#[tool]` function, as a JSON array.
pub fn function_declarations() -> Result<Value, ToolError> {
    collect_tools()?.json()
}
