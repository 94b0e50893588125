//! Print the function specifications an assistant would be created with,
//! then answer a few tool calls the way a run would.
//!
//! ```text
//! RUST_LOG=debug cargo run -p demos --example tool_specs
//! ```

use copilot_rs::prelude::*;
use copilot_rs::{ToolSchema, ToolSpec};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToolSchema)]
#[serde(rename_all = "lowercase")]
enum Unit {
    Celsius,
    Fahrenheit,
}

/// Get the current temperature for a specific location.
#[tool(returns = "The temperature with its unit")]
async fn get_current_temperature(
    #[param(description = "The city and state, e.g., San Francisco, CA")] location: String,
    #[param(description = "The temperature unit to use", default = Unit::Celsius)] unit: Unit,
) -> String {
    match unit {
        Unit::Celsius => format!("It is 18°C in {location}"),
        Unit::Fahrenheit => format!("It is 64°F in {location}"),
    }
}

/// Get the probability of rain for a specific location.
#[tool]
fn get_rain_probability(
    #[param(description = "The city and state, e.g., San Francisco, CA")] location: String,
) -> f64 {
    if location.contains("Seattle") { 0.9 } else { 0.2 }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let registry = collect_tools()?;
    info!(tools = registry.len(), "collected tools");

    let specs: Vec<ToolSpec> = registry.tool_specs()?;
    println!("{}", serde_json::to_string_pretty(&specs)?);

    let dispatcher = ToolDispatcher::new(&registry);
    let calls = [
        (
            "get_current_temperature",
            json!({"location": "San Francisco, CA", "unit": "fahrenheit"}),
        ),
        ("get_rain_probability", json!({"location": "Seattle, WA"})),
        ("get_rain_probability", json!({})),
        ("get_stock_price", json!({"symbol": "ACME"})),
    ];
    for (i, (tool, arguments)) in calls.into_iter().enumerate() {
        let request = ToolCallRequest::new(format!("call_{i}"), tool, arguments.to_string());
        let result = dispatcher.execute(&request).await;
        println!("{tool} → {}", result.output_text.trim());
    }
    Ok(())
}
