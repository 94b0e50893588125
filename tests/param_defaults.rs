use copilot_rs::{ToolCallRequest, ToolDispatcher, collect_tools, tool};
use serde_json::json;

/// Summarize a piece of text.
#[tool]
fn summarize(
    #[param(description = "Text to summarize")] text: String,
    #[param(description = "Summary style", default = "fast")] style: String,
    #[param(description = "Maximum number of words", default = 3)] max_words: u32,
) -> String {
    let words: Vec<&str> = text.split_whitespace().take(max_words as usize).collect();
    format!("[{style}] {}", words.join(" "))
}

#[test]
fn test_string_default_in_schema() {
    let registry = collect_tools().unwrap();
    let spec = serde_json::to_value(registry.descriptor("summarize").unwrap().unwrap().emit())
        .unwrap();
    let properties = &spec["function"]["parameters"]["properties"];
    assert_eq!(properties["style"]["default"], "fast");
    assert_eq!(properties["style"]["optional"], true);
    assert_eq!(properties["max_words"]["default"], 3);
    assert_eq!(spec["function"]["parameters"]["required"], json!(["text"]));
}

#[tokio::test]
async fn test_defaults_fill_absent_arguments() {
    let registry = collect_tools().unwrap();
    let dispatcher = ToolDispatcher::new(&registry);

    let request = ToolCallRequest::new(
        "call_1",
        "summarize",
        json!({"text": "concept drift in foundation models"}).to_string(),
    );
    let result = dispatcher.execute(&request).await;
    assert_eq!(result.output_text, "[fast] concept drift in");

    let request = ToolCallRequest::new(
        "call_2",
        "summarize",
        json!({"text": "concept drift in foundation models", "style": "brief", "max_words": 2})
            .to_string(),
    );
    let result = dispatcher.execute(&request).await;
    assert_eq!(result.output_text, "[brief] concept drift");
}
