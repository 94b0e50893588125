//! Error types for tool registration and invocation.

use std::fmt;

/// A tool's signature cannot be turned into a tool description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Tool '{tool}' must have a documentation string")]
    MissingDocumentation { tool: String },

    #[error("Parameter '{param}' of tool '{tool}' has no description annotation")]
    MissingDescription { tool: String, param: String },

    #[error("Parameter '{param}' of tool '{tool}' has unsupported type {type_name}")]
    UnsupportedType {
        tool: String,
        param: String,
        type_name: String,
    },

    #[error("Parameter '{param}' of tool '{tool}' is declared more than once")]
    DuplicateParameter { tool: String, param: String },
}

/// Errors raised while building or mutating a [`ToolRegistry`](crate::ToolRegistry).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool function '{name}' not found")]
    FunctionNotFound { name: String },

    #[error("Tool function '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure raised by a tool body or by binding its arguments.
///
/// `trace` holds whatever diagnostic detail the failure carries beyond its
/// message, typically the `Debug` rendering of the source error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub message: String,
    pub trace: String,
}

impl ToolFailure {
    pub fn new(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// Wrap any displayable error, keeping its `Debug` form as the trace.
    pub fn from_error<E: fmt::Display + fmt::Debug>(err: E) -> Self {
        Self {
            message: err.to_string(),
            trace: format!("{err:?}"),
        }
    }

    /// An argument value could not be converted to the parameter's type.
    pub fn argument(name: &str, err: serde_json::Error) -> Self {
        Self {
            message: format!("invalid value for argument '{name}': {err}"),
            trace: format!("{err:?}"),
        }
    }

    /// The tool body panicked.
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "tool panicked with a non-string payload".to_string()
        };
        Self {
            trace: format!("panicked: {message}"),
            message,
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ToolFailure {}
