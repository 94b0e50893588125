//! Convenient re-exports for common usage patterns.
//!
//! ```rust
//! use copilot_rs::prelude::*;
//! ```

// Core functionality
pub use crate::{collect_tools, function_declarations, start_chat, stop_run};

// Essential types
pub use crate::{
    ChatProfile, InMemorySession, SessionStore, SessionStoreExt, Settings, StreamCoordinator,
    ToolCallRequest, ToolDispatcher, ToolError, ToolFailure, ToolRegistry, ToolSchema,
};

// Macros
pub use crate::tool;

// Commonly used external types
pub use serde_json::{Value, json};

pub use serde::{Deserialize, Serialize};

pub use tokio;
