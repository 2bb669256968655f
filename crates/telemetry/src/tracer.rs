//! The tracer the agent loop talks to.

use crate::model::{TraceInfo, TraceKind};
use crate::sink::TraceSink;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::warn;

/// Argument previews longer than this are cut to `PREVIEW_LIMIT - 3` chars plus `...`.
pub const PREVIEW_LIMIT: usize = 120;

/// Builds trace events and delivers them to every registered sink.
///
/// Delivery is best effort: a sink that errors is logged at warn level, a
/// sink that panics is caught, and in both cases the remaining sinks still
/// receive the event.
#[derive(Clone, Default)]
pub struct AgentTracer {
    sinks: Vec<Arc<dyn TraceSink>>,
}

impl AgentTracer {
    /// A tracer with no sinks; every event is dropped.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn TraceSink>) {
        self.sinks.push(sink);
    }

    pub fn is_enabled(&self) -> bool {
        !self.sinks.is_empty()
    }

    /// A node finished, touching `keys`.
    pub fn node(&self, node: &str, keys: &[&str]) {
        self.emit(node, TraceKind::Node, &TraceInfo::keys(keys.iter().copied()));
    }

    /// A tool call was requested.
    pub fn tool_call(&self, node: &str, tool: &str, args: &serde_json::Value) {
        let info = TraceInfo::tool(tool).with_args(preview(&args.to_string()));
        self.emit(node, TraceKind::ToolCall, &info);
    }

    /// A tool result was appended.
    pub fn tool_result(&self, node: &str, tool: &str) {
        self.emit(node, TraceKind::ToolResult, &TraceInfo::tool(tool));
    }

    /// A structured payload failed validation and was not folded.
    pub fn schema_rejected(&self, node: &str, tool: &str, reason: &str) {
        let info = TraceInfo::tool(tool).with_detail(reason);
        self.emit(node, TraceKind::SchemaRejected, &info);
    }

    pub fn emit(&self, node: &str, kind: TraceKind, info: &TraceInfo) {
        for sink in &self.sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.on_step(node, kind, info))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(node, kind = %kind, error = %e, "Trace sink failed"),
                Err(_) => warn!(node, kind = %kind, "Trace sink panicked"),
            }
        }
    }
}

impl std::fmt::Debug for AgentTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTracer")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Truncate an argument rendering for display.
pub fn preview(rendered: &str) -> String {
    if rendered.chars().count() <= PREVIEW_LIMIT {
        return rendered.to_string();
    }
    let cut: String = rendered.chars().take(PREVIEW_LIMIT - 3).collect();
    format!("{cut}...")
}
