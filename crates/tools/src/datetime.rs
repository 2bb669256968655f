//! Clock tool.

use async_trait::async_trait;
use sleuth_core::error::ToolError;
use sleuth_core::tool::{Tool, ToolResult};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CurrentDatetimeTool;

#[async_trait]
impl Tool for CurrentDatetimeTool {
    fn name(&self) -> &str {
        "current_datetime"
    }

    fn description(&self) -> &str {
        "Get the current local date and time in the format YYYY-MM-DD HH:MM:SS."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::text(
            chrono::Local::now().format(DATETIME_FORMAT).to_string(),
        ))
    }
}
