//! Execution tracing for Sleuth.
//!
//! The agent loop reports every node it runs, every tool call it dispatches
//! and every tool result it receives to an [`AgentTracer`], which fans the
//! events out to one or more [`TraceSink`]s. Tracing is observational only:
//! sink failures never reach the loop.

pub mod model;
pub mod sink;
pub mod tracer;

pub use model::{TraceEvent, TraceInfo, TraceKind};
pub use sink::{ConsoleSink, LogSink, RecordingSink, TraceSink};
pub use tracer::AgentTracer;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("trace output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink rejected event: {0}")]
    Sink(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
