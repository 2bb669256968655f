//! Scratchpad tool. Records a thought in the conversation without side effects.

use async_trait::async_trait;
use sleuth_core::error::ToolError;
use sleuth_core::tool::{Tool, ToolResult};

pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Think about something. Collects no new information and takes no action; \
         the thought is simply appended to the log. Use it as a scratchpad when \
         planning or when complex reasoning is needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "A thought to think about and log"
                }
            },
            "required": ["thought"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let thought = arguments["thought"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'thought' argument".into()))?;
        Ok(ToolResult::text(thought))
    }
}
