use copilot_rs::{SchemaError, ToolError, collect_tools, tool};

/// Search the knowledge base.
#[tool]
fn search(
    #[param(description = "What to search for")] query: String,
    limit: u32,
) -> String {
    format!("{limit} results for {query}")
}

#[test]
fn test_undescribed_parameter_fails_collection() {
    let err = collect_tools().unwrap_err();
    let ToolError::Schema(SchemaError::MissingDescription { tool, param }) = &err else {
        panic!("expected a missing description error, got {err:?}");
    };
    assert_eq!(tool, "search");
    assert_eq!(param, "limit");
    assert_eq!(
        err.to_string(),
        "Parameter 'limit' of tool 'search' has no description annotation"
    );
}
