//! The tool dispatch step.
//!
//! Executes the tool calls of the latest assistant message and turns every
//! outcome, including failures, into exactly one tool-result message. Errors
//! never escape this step: the model sees them as result text and decides
//! what to do next.

use futures::FutureExt;
use futures::future::join_all;
use sleuth_core::message::{Message, MessageToolCall};
use sleuth_core::tool::{ToolCall, ToolRegistry};
use sleuth_telemetry::AgentTracer;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::state::{ConversationState, StateUpdate};

pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    parallel: bool,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(30),
            parallel: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run the calls requested by the state's last message.
    ///
    /// Result messages come back in request order whether or not the calls
    /// ran concurrently. Structured payloads are then validated and folded in
    /// that same order; rejected payloads are reported to `tracer` only.
    pub async fn run(&self, state: &ConversationState, tracer: &AgentTracer) -> StateUpdate {
        let Some(request) = state.last_message().filter(|m| m.requests_tools()) else {
            warn!(thread = %state.thread_id, "Dispatch reached without pending tool calls");
            return StateUpdate::new();
        };

        let results = if self.parallel {
            join_all(request.tool_calls.iter().map(|call| self.execute(call))).await
        } else {
            let mut results = Vec::with_capacity(request.tool_calls.len());
            for call in &request.tool_calls {
                results.push(self.execute(call).await);
            }
            results
        };

        let mut update = StateUpdate::new();
        for message in results {
            self.collect_record(&message, &mut update, tracer);
            update.messages.push(message);
        }
        update
    }

    async fn execute(&self, call: &MessageToolCall) -> Message {
        let reply = |content: String| Message::tool_result(&call.id, &call.name, content);

        if self.tools.get(&call.name).is_none() {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return reply(format!("Error: unknown tool '{}'", call.name));
        }

        let arguments = match parse_arguments(&call.arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Malformed tool arguments");
                return reply(format!("Error: invalid arguments for '{}': {e}", call.name));
            }
        };

        let tool_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        };
        let started = std::time::Instant::now();
        // A panicking tool must not take the turn down with it.
        let guarded = AssertUnwindSafe(self.tools.execute(&tool_call)).catch_unwind();
        let outcome = tokio::time::timeout(self.timeout, guarded).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Ok(result))) => {
                debug!(tool = %call.name, success = result.success, duration_ms, "Tool finished");
                reply(result.output).with_payload(result.data)
            }
            Ok(Ok(Err(e))) => {
                warn!(tool = %call.name, error = %e, duration_ms, "Tool failed");
                reply(format!("Error: {e}"))
            }
            Ok(Err(_)) => {
                warn!(tool = %call.name, duration_ms, "Tool panicked");
                reply(format!("Error: tool '{}' panicked", call.name))
            }
            Err(_) => {
                warn!(tool = %call.name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                reply(format!(
                    "Error: tool '{}' timed out after {}s",
                    call.name,
                    self.timeout.as_secs()
                ))
            }
        }
    }

    fn collect_record(&self, message: &Message, update: &mut StateUpdate, tracer: &AgentTracer) {
        let Some(tool) = message.tool_name.as_deref() else {
            return;
        };
        let Some(schema) = self.tools.output_schema(tool) else {
            return;
        };
        let verdict = match &message.payload {
            Some(payload) => schema.validate(payload),
            None => Err("no structured payload".to_string()),
        };
        match verdict {
            Ok(record) => update.push_record(schema.accumulator, record),
            Err(reason) => {
                debug!(tool, %reason, "Dropping tool payload");
                tracer.schema_rejected("tools", tool, &reason);
            }
        }
    }
}

/// Empty argument strings mean "no arguments".
fn parse_arguments(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
}
