//! Execution of model-issued tool calls.
//!
//! [`ToolDispatcher::execute`] never fails: every problem (bad JSON, unknown
//! tool, missing arguments, a failing tool body) becomes the output text of
//! the [`ToolCallResult`], paired with the request's id. How outcomes are
//! worded is decided by an [`OutputChannel`].

use std::panic::AssertUnwindSafe;

use futures::{FutureExt, Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ToolFailure;
use crate::registry::ToolRegistry;

/// A tool call issued by the model. Untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub tool_name: String,
    /// Raw JSON text of the arguments object.
    pub arguments_json: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments_json: arguments_json.into(),
        }
    }
}

/// Output submitted back to resume a paused run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(rename = "tool_call_id")]
    pub id: String,
    #[serde(rename = "output")]
    pub output_text: String,
}

/// Structured outcome of one tool call, before it is flattened to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success(String),
    DecodeFailed {
        error: String,
        trace: String,
    },
    UnknownTool {
        name: String,
        known: Vec<String>,
    },
    MissingParameters {
        missing: Vec<String>,
        required: Vec<String>,
    },
    ExecutionFailed(ToolFailure),
}

/// Renders outcomes onto the single text channel the model reads.
pub trait OutputChannel: Send + Sync {
    fn render(&self, outcome: ToolOutcome) -> String;
}

/// Plain-text wording. Successful output and error descriptions are not
/// distinguishable by the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextChannel;

impl OutputChannel for PlainTextChannel {
    fn render(&self, outcome: ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Success(text) => text,
            ToolOutcome::DecodeFailed { error, trace } => format!(
                "Could not json decode tool call arguments. Error: {error}. Traceback: {trace}"
            ),
            ToolOutcome::UnknownTool { name, known } => format!(
                "Tool '{name}' not found in tool registry. Available tools: {known:?}"
            ),
            ToolOutcome::MissingParameters { missing, required } => format!(
                "\nLooks like you are missing some required parameters: {}.\nThe required parameters are: {}.\n",
                missing.join(", "),
                required.join(", ")
            ),
            ToolOutcome::ExecutionFailed(failure) => format!(
                "Error executing tool. Error: {}. Traceback: {}",
                failure.message, failure.trace
            ),
        }
    }
}

/// Looks up and runs tool calls against a registry.
pub struct ToolDispatcher<'r, C = PlainTextChannel> {
    registry: &'r ToolRegistry,
    channel: C,
}

impl<'r> ToolDispatcher<'r, PlainTextChannel> {
    pub fn new(registry: &'r ToolRegistry) -> Self {
        Self {
            registry,
            channel: PlainTextChannel,
        }
    }
}

impl<'r, C: OutputChannel> ToolDispatcher<'r, C> {
    pub fn with_channel(registry: &'r ToolRegistry, channel: C) -> Self {
        Self { registry, channel }
    }

    pub fn registry(&self) -> &'r ToolRegistry {
        self.registry
    }

    /// Run one request and return its structured outcome.
    pub async fn outcome(&self, request: &ToolCallRequest) -> ToolOutcome {
        let args = match serde_json::from_str::<Value>(&request.arguments_json) {
            Ok(Value::Object(args)) => args,
            Ok(other) => {
                return ToolOutcome::DecodeFailed {
                    error: format!("expected a JSON object of arguments, got {other}"),
                    trace: format!("arguments_json = {:?}", request.arguments_json),
                };
            }
            Err(err) => {
                return ToolOutcome::DecodeFailed {
                    error: err.to_string(),
                    trace: format!("{err:?}"),
                };
            }
        };

        let (Some(descriptor), Some(func)) = (
            self.registry.descriptor(&request.tool_name),
            self.registry.func(&request.tool_name),
        ) else {
            return ToolOutcome::UnknownTool {
                name: request.tool_name.clone(),
                known: self
                    .registry
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
        };

        // The signature is re-read on every call, so it may have broken since
        // registration.
        let descriptor = match descriptor {
            Ok(descriptor) => descriptor,
            Err(err) => return ToolOutcome::ExecutionFailed(ToolFailure::from_error(err)),
        };

        let required: Vec<String> = descriptor
            .required_parameters()
            .map(|p| p.name.clone())
            .collect();
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !args.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return ToolOutcome::MissingParameters { missing, required };
        }

        match AssertUnwindSafe(func(args)).catch_unwind().await {
            Ok(Ok(text)) => ToolOutcome::Success(text),
            Ok(Err(failure)) => ToolOutcome::ExecutionFailed(failure),
            Err(payload) => ToolOutcome::ExecutionFailed(ToolFailure::panicked(payload.as_ref())),
        }
    }

    /// Run one request. Never fails; problems are reported in the output text.
    pub async fn execute(&self, request: &ToolCallRequest) -> ToolCallResult {
        let outcome = self.outcome(request).await;
        match &outcome {
            ToolOutcome::Success(_) => {
                debug!(call_id = %request.id, tool = %request.tool_name, "tool call succeeded")
            }
            failure => {
                warn!(call_id = %request.id, tool = %request.tool_name, ?failure, "tool call failed")
            }
        }
        ToolCallResult {
            id: request.id.clone(),
            output_text: self.channel.render(outcome),
        }
    }

    /// Lazily execute `requests` in order.
    ///
    /// Nothing runs until the stream is polled, and each request runs only
    /// after the previous result has been taken.
    pub fn execute_many(
        &self,
        requests: Vec<ToolCallRequest>,
    ) -> impl Stream<Item = ToolCallResult> + Send + '_ {
        stream::iter(requests).then(move |request| async move { self.execute(&request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Arguments, take_argument};
    use crate::signature::{ParamSpec, ToolSignature};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn weather_signature() -> ToolSignature {
        ToolSignature::new("get_weather")
            .doc("Get the weather for a location.")
            .param(ParamSpec::of::<String>("location").description("City name"))
            .param(ParamSpec::of::<String>("unit").description("Temperature unit"))
            .param(
                ParamSpec::of::<u32>("days")
                    .description("Forecast length")
                    .default_value(json!(1)),
            )
    }

    fn always_panics() -> Result<String, ToolFailure> {
        panic!("tool blew up")
    }

    fn counting_registry(calls: Arc<AtomicUsize>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(weather_signature, move |mut args: Arguments| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let location: String = take_argument(&mut args, "location")?;
                    Ok::<_, ToolFailure>(format!("Sunny in {location}"))
                }
            })
            .unwrap();
        registry
            .register_fn(
                || ToolSignature::new("explode").doc("Always fails."),
                |_| async { Err(ToolFailure::new("boom", "explode() at line 1")) },
            )
            .unwrap();
        registry
            .register_fn(
                || ToolSignature::new("panics").doc("Always panics."),
                |_| async { always_panics() },
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_successful_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(calls.clone());
        let dispatcher = ToolDispatcher::new(&registry);

        let result = dispatcher
            .execute(&ToolCallRequest::new(
                "call_1",
                "get_weather",
                r#"{"location": "Paris", "unit": "Celsius"}"#,
            ))
            .await;

        assert_eq!(result.id, "call_1");
        assert_eq!(result.output_text, "Sunny in Paris");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let result = ToolDispatcher::new(&registry)
            .execute(&ToolCallRequest::new("call_2", "get_weather", "{not json"))
            .await;
        assert_eq!(result.id, "call_2");
        assert!(
            result
                .output_text
                .starts_with("Could not json decode tool call arguments. Error: ")
        );
        assert!(result.output_text.contains("Traceback: "));
    }

    #[tokio::test]
    async fn test_non_object_arguments() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let outcome = ToolDispatcher::new(&registry)
            .outcome(&ToolCallRequest::new("c", "get_weather", "[1, 2]"))
            .await;
        assert!(matches!(outcome, ToolOutcome::DecodeFailed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool_lists_known_names() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let result = ToolDispatcher::new(&registry)
            .execute(&ToolCallRequest::new("call_3", "ghost", "{}"))
            .await;
        assert_eq!(result.id, "call_3");
        assert!(result.output_text.contains("ghost"));
        for name in ["explode", "get_weather", "panics"] {
            assert!(result.output_text.contains(name), "{name} missing");
        }
    }

    #[tokio::test]
    async fn test_missing_parameters_do_not_invoke() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(calls.clone());
        let dispatcher = ToolDispatcher::new(&registry);

        let outcome = dispatcher
            .outcome(&ToolCallRequest::new("call_4", "get_weather", r#"{"days": 3}"#))
            .await;
        assert_eq!(
            outcome,
            ToolOutcome::MissingParameters {
                missing: vec!["location".into(), "unit".into()],
                required: vec!["location".into(), "unit".into()],
            }
        );

        let result = dispatcher
            .execute(&ToolCallRequest::new(
                "call_5",
                "get_weather",
                r#"{"location": "Oslo"}"#,
            ))
            .await;
        assert_eq!(
            result.output_text,
            "\nLooks like you are missing some required parameters: unit.\nThe required parameters are: location, unit.\n"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tool_error_is_reported() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let result = ToolDispatcher::new(&registry)
            .execute(&ToolCallRequest::new("call_6", "explode", "{}"))
            .await;
        assert_eq!(
            result.output_text,
            "Error executing tool. Error: boom. Traceback: explode() at line 1"
        );
    }

    #[tokio::test]
    async fn test_tool_panic_is_reported() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let result = ToolDispatcher::new(&registry)
            .execute(&ToolCallRequest::new("call_7", "panics", "{}"))
            .await;
        assert!(result.output_text.starts_with("Error executing tool."));
        assert!(result.output_text.contains("tool blew up"));
    }

    #[tokio::test]
    async fn test_execute_many_is_lazy_and_ordered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(calls.clone());
        let dispatcher = ToolDispatcher::new(&registry);

        let requests = vec![
            ToolCallRequest::new("a", "get_weather", r#"{"location": "Rome", "unit": "C"}"#),
            ToolCallRequest::new("b", "ghost", "{}"),
            ToolCallRequest::new("c", "get_weather", r#"{"location": "Lima", "unit": "C"}"#),
        ];
        let mut results = Box::pin(dispatcher.execute_many(requests));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = results.next().await.unwrap();
        assert_eq!(first.id, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let rest: Vec<ToolCallResult> = results.collect().await;
        let ids: Vec<_> = rest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        assert_eq!(rest[1].output_text, "Sunny in Lima");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct TaggedChannel;

    impl OutputChannel for TaggedChannel {
        fn render(&self, outcome: ToolOutcome) -> String {
            match outcome {
                ToolOutcome::Success(text) => json!({"ok": text}).to_string(),
                other => json!({"error": format!("{other:?}")}).to_string(),
            }
        }
    }

    #[tokio::test]
    async fn test_custom_channel() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let dispatcher = ToolDispatcher::with_channel(&registry, TaggedChannel);
        let result = dispatcher
            .execute(&ToolCallRequest::new("d", "ghost", "{}"))
            .await;
        let parsed: Value = serde_json::from_str(&result.output_text).unwrap();
        assert!(parsed["error"].as_str().unwrap().contains("UnknownTool"));
    }

    #[test]
    fn test_result_wire_format() {
        let result = ToolCallResult {
            id: "call_9".into(),
            output_text: "42".into(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"tool_call_id": "call_9", "output": "42"})
        );
    }
}
