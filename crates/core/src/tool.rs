//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the assistant reach outside the model: search the web,
//! fetch pages, evaluate expressions, read the clock, etc. Tools that return
//! structured records also declare an [`OutputSchema`] so the dispatch step
//! can fold validated records into the turn's accumulators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content shown to the model
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result whose text is the pretty-printed structured record.
    pub fn structured<T: Serialize>(record: &T) -> Result<Self, ToolError> {
        let data = serde_json::to_value(record)
            .map_err(|e| ToolError::InvalidArguments(format!("unserializable output: {e}")))?;
        Ok(Self {
            call_id: String::new(),
            success: true,
            output: serde_json::to_string_pretty(&data).unwrap_or_default(),
            data: Some(data),
        })
    }

    /// A plain-text result.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }
}

/// Output schema of a structured tool: which accumulator its records go to
/// and how a raw payload is validated.
#[derive(Clone, Copy)]
pub struct OutputSchema {
    /// Accumulator key validated records are folded into.
    pub accumulator: &'static str,
    validator: fn(&serde_json::Value) -> Result<serde_json::Value, String>,
}

impl OutputSchema {
    /// Schema backed by a serde type: a payload is valid iff it deserializes as `T`.
    pub fn of<T: DeserializeOwned + Serialize>(accumulator: &'static str) -> Self {
        Self {
            accumulator,
            validator: validate_as::<T>,
        }
    }

    /// Validate a payload, returning the normalized record.
    pub fn validate(&self, payload: &serde_json::Value) -> Result<serde_json::Value, String> {
        (self.validator)(payload)
    }
}

impl std::fmt::Debug for OutputSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSchema")
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

fn validate_as<T: DeserializeOwned + Serialize>(
    payload: &serde_json::Value,
) -> Result<serde_json::Value, String> {
    let record: T = serde_json::from_value(payload.clone()).map_err(|e| e.to_string())?;
    serde_json::to_value(record).map_err(|e| e.to_string())
}

/// The core Tool trait.
///
/// Each tool (search, fetch_url, calculator, ...) implements this trait.
/// Tools are registered in the ToolRegistry and looked up by exact name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search", "fetch_url").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Schema of the structured records this tool produces, if any.
    fn output_schema(&self) -> Option<OutputSchema> {
        None
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A static registry of available tools.
///
/// The agent uses this to:
/// 1. Render tool descriptions into the system prompt and bind them to the model
/// 2. Look up and execute tools when the model requests them
///
/// Definitions are returned in registration order so prompts are stable.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Output schema declared by the named tool.
    pub fn output_schema(&self, name: &str) -> Option<OutputSchema> {
        self.get(name).and_then(|t| t.output_schema())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
