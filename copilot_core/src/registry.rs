//! Name-keyed collection of callable tools.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SchemaError, ToolError, ToolFailure};
use crate::signature::{ToolDescriptor, ToolSignature, ToolSpec, describe};

/// Decoded call arguments, keyed by parameter name.
pub type Arguments = Map<String, Value>;

/// Type-erased tool body.
pub type ToolFunc =
    dyn Fn(Arguments) -> BoxFuture<'static, Result<String, ToolFailure>> + Send + Sync;

/// Produces a tool's current signature.
pub type SignatureFn = dyn Fn() -> ToolSignature + Send + Sync;

/// Static registration submitted by `#[tool]` through `inventory`.
pub struct ToolRegistration {
    pub name: &'static str,
    pub signature: fn() -> ToolSignature,
    pub invoke: fn(Arguments) -> BoxFuture<'static, Result<String, ToolFailure>>,
}

impl ToolRegistration {
    pub const fn new(
        name: &'static str,
        signature: fn() -> ToolSignature,
        invoke: fn(Arguments) -> BoxFuture<'static, Result<String, ToolFailure>>,
    ) -> Self {
        Self {
            name,
            signature,
            invoke,
        }
    }
}

inventory::collect!(ToolRegistration);

struct RegisteredTool {
    signature: Arc<SignatureFn>,
    func: Arc<ToolFunc>,
}

/// Explicitly constructed tool registry.
///
/// Lookups are read-only, so one registry can be shared by every run. The
/// descriptor of a tool is rebuilt from its signature function on every
/// request and never cached.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every `#[tool]` linked into the binary.
    pub fn collect_tools() -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for reg in inventory::iter::<ToolRegistration> {
            registry.register(reg)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, registration: &ToolRegistration) -> Result<&mut Self, ToolError> {
        self.insert(
            Arc::new(registration.signature),
            Arc::new(registration.invoke),
        )
    }

    /// Register a closure-based tool.
    ///
    /// `signature` is called again whenever a descriptor is needed, so a
    /// signature that changes over time changes future schemas.
    pub fn register_fn<S, F, Fut>(&mut self, signature: S, func: F) -> Result<&mut Self, ToolError>
    where
        S: Fn() -> ToolSignature + Send + Sync + 'static,
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolFailure>> + Send + 'static,
    {
        let func = Arc::new(func);
        self.insert(
            Arc::new(signature),
            Arc::new(move |args: Arguments| -> BoxFuture<'static, Result<String, ToolFailure>> {
                let func = func.clone();
                async move { func(args).await }.boxed()
            }),
        )
    }

    fn insert(
        &mut self,
        signature: Arc<SignatureFn>,
        func: Arc<ToolFunc>,
    ) -> Result<&mut Self, ToolError> {
        // Schema problems surface at registration, not at the first call.
        let descriptor = describe(&signature())?;
        if self.tools.contains_key(&descriptor.name) {
            return Err(ToolError::AlreadyRegistered {
                name: descriptor.name,
            });
        }

        debug!(
            tool = %descriptor.name,
            parameters = descriptor.parameters.len(),
            "registered tool"
        );
        self.tools
            .insert(descriptor.name, RegisteredTool { signature, func });
        Ok(self)
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), ToolError> {
        self.tools
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ToolError::FunctionNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Freshly computed descriptor for `name`.
    pub fn descriptor(&self, name: &str) -> Option<Result<ToolDescriptor, SchemaError>> {
        self.tools
            .get(name)
            .map(|tool| describe(&(tool.signature)()))
    }

    pub(crate) fn func(&self, name: &str) -> Option<Arc<ToolFunc>> {
        self.tools.get(name).map(|tool| tool.func.clone())
    }

    /// Function-tool specs for every registered tool, sorted by name.
    pub fn tool_specs(&self) -> Result<Vec<ToolSpec>, SchemaError> {
        self.names()
            .into_iter()
            .filter_map(|name| self.descriptor(name))
            .map(|descriptor| descriptor.map(|d| d.emit()))
            .collect()
    }

    pub fn json(&self) -> Result<Value, ToolError> {
        Ok(serde_json::to_value(self.tool_specs()?)?)
    }
}

// ============================================================================
// ARGUMENT BINDING (used by generated code)
// ============================================================================

/// Remove `name` from `args` and convert it to `T`.
///
/// An absent argument is converted from JSON `null`, which yields `None` for
/// `Option` parameters and a conversion error for everything else.
pub fn take_argument<T: DeserializeOwned>(args: &mut Arguments, name: &str) -> Result<T, ToolFailure> {
    let value = args.remove(name).unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|err| ToolFailure::argument(name, err))
}

/// Like [`take_argument`], falling back to `default` when the argument is absent.
pub fn take_argument_or<T: DeserializeOwned>(
    args: &mut Arguments,
    name: &str,
    default: impl FnOnce() -> T,
) -> Result<T, ToolFailure> {
    match args.remove(name) {
        Some(value) => serde_json::from_value(value).map_err(|err| ToolFailure::argument(name, err)),
        None => Ok(default()),
    }
}

/// Fail if arguments remain after every declared parameter was taken.
pub fn reject_unexpected(tool: &str, args: &Arguments) -> Result<(), ToolFailure> {
    if args.is_empty() {
        return Ok(());
    }
    let mut names: Vec<&str> = args.keys().map(String::as_str).collect();
    names.sort_unstable();
    Err(ToolFailure::new(
        format!(
            "{tool}() got unexpected keyword argument(s): {}",
            names.join(", ")
        ),
        format!("unexpected arguments {names:?} for tool '{tool}'"),
    ))
}
