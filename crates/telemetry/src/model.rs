//! Data model for trace events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a trace event reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// A node finished; `info.keys` lists the state keys it touched.
    Node,
    /// A tool call was requested.
    ToolCall,
    /// A tool result was appended to the log.
    ToolResult,
    /// A structured tool payload failed its output schema.
    SchemaRejected,
}

impl std::fmt::Display for TraceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::ToolResult => write!(f, "tool_result"),
            Self::SchemaRejected => write!(f, "schema_rejected"),
        }
    }
}

/// Event details. Which fields are set depends on the [`TraceKind`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TraceInfo {
    /// State keys touched by a node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    /// Tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Truncated argument preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    /// Free-form detail (e.g. a schema rejection reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceInfo {
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            tool: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, preview: impl Into<String>) -> Self {
        self.args = Some(preview.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A recorded trace event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub node: String,
    pub kind: TraceKind,
    pub info: TraceInfo,
    pub at: DateTime<Utc>,
}
