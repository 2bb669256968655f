//! Trace sinks: where trace events end up.

use crate::TelemetryError;
use crate::model::{TraceEvent, TraceInfo, TraceKind};
use std::io::Write;
use std::sync::RwLock;

/// Receives trace events from the agent loop.
///
/// Implementations must be cheap; they run inline between loop steps.
pub trait TraceSink: Send + Sync {
    fn on_step(&self, node: &str, kind: TraceKind, info: &TraceInfo) -> Result<(), TelemetryError>;
}

// ── Console ───────────────────────────────────────────────────────────────

/// Prints `[trace] ...` lines to stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    /// Also print the state keys each node touched.
    pub show_payload: bool,
}

impl ConsoleSink {
    pub fn new(show_payload: bool) -> Self {
        Self { show_payload }
    }

    /// Render one event as a console line.
    pub fn format_line(&self, node: &str, kind: TraceKind, info: &TraceInfo) -> String {
        let tool = info.tool.as_deref().unwrap_or("?");
        match kind {
            TraceKind::Node if self.show_payload => {
                format!("[trace] {node}: state keys -> {}", info.keys.join(", "))
            }
            TraceKind::Node => format!("[trace] {node}"),
            TraceKind::ToolCall => {
                format!("[trace] {node}: call {tool}({})", info.args.as_deref().unwrap_or(""))
            }
            TraceKind::ToolResult => format!("[trace] {node}: result from {tool}"),
            TraceKind::SchemaRejected => format!(
                "[trace] {node}: schema_rejected {tool}: {}",
                info.detail.as_deref().unwrap_or("invalid payload")
            ),
        }
    }
}

impl TraceSink for ConsoleSink {
    fn on_step(&self, node: &str, kind: TraceKind, info: &TraceInfo) -> Result<(), TelemetryError> {
        let line = self.format_line(node, kind, info);
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        Ok(())
    }
}

// ── Recording ─────────────────────────────────────────────────────────────

/// Keeps every event in memory. Thread-safe via `RwLock`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RwLock<Vec<TraceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events, oldest first.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Node names in visit order.
    pub fn nodes(&self) -> Vec<String> {
        self.events_of(TraceKind::Node)
            .into_iter()
            .map(|e| e.node)
            .collect()
    }

    pub fn events_of(&self, kind: TraceKind) -> Vec<TraceEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Export all events as a JSON array.
    pub fn to_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string_pretty(&self.events())?)
    }
}

impl TraceSink for RecordingSink {
    fn on_step(&self, node: &str, kind: TraceKind, info: &TraceInfo) -> Result<(), TelemetryError> {
        let event = TraceEvent {
            node: node.to_string(),
            kind,
            info: info.clone(),
            at: chrono::Utc::now(),
        };
        self.events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
        Ok(())
    }
}

// ── Log ───────────────────────────────────────────────────────────────────

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn on_step(&self, node: &str, kind: TraceKind, info: &TraceInfo) -> Result<(), TelemetryError> {
        tracing::debug!(
            target: "sleuth::trace",
            node,
            kind = %kind,
            tool = info.tool.as_deref().unwrap_or(""),
            args = info.args.as_deref().unwrap_or(""),
            keys = ?info.keys,
            "trace event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_node_lines() {
        let plain = ConsoleSink::new(false);
        let verbose = ConsoleSink::new(true);
        let info = TraceInfo::keys(["messages", "search_results"]);
        assert_eq!(plain.format_line("agent", TraceKind::Node, &info), "[trace] agent");
        assert_eq!(
            verbose.format_line("agent", TraceKind::Node, &info),
            "[trace] agent: state keys -> messages, search_results"
        );
    }

    #[test]
    fn console_tool_lines() {
        let sink = ConsoleSink::default();
        let call = TraceInfo::tool("search").with_args(r#"{"query":"x"}"#);
        assert_eq!(
            sink.format_line("agent", TraceKind::ToolCall, &call),
            r#"[trace] agent: call search({"query":"x"})"#
        );
        assert_eq!(
            sink.format_line("tools", TraceKind::ToolResult, &TraceInfo::tool("search")),
            "[trace] tools: result from search"
        );
        assert_eq!(
            sink.format_line("tools", TraceKind::ToolResult, &TraceInfo::default()),
            "[trace] tools: result from ?"
        );
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.on_step("clarify", TraceKind::Node, &TraceInfo::default()).unwrap();
        sink.on_step("agent", TraceKind::Node, &TraceInfo::keys(["messages"])).unwrap();
        sink.on_step("agent", TraceKind::ToolCall, &TraceInfo::tool("think")).unwrap();

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.nodes(), vec!["clarify", "agent"]);
        assert_eq!(sink.events_of(TraceKind::ToolCall)[0].info.tool.as_deref(), Some("think"));

        let json = sink.to_json().unwrap();
        assert!(json.contains("tool_call"));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn log_sink_never_fails() {
        assert!(LogSink.on_step("end", TraceKind::Node, &TraceInfo::default()).is_ok());
    }
}
