//! Shared test doubles: scripted providers, classifiers and stub tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sleuth_core::error::{ProviderError, ToolError};
use sleuth_core::message::{Message, MessageToolCall};
use sleuth_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use sleuth_core::tool::{OutputSchema, Tool, ToolRegistry, ToolResult};
use sleuth_tools::SearchItem;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::clarify::Classifier;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Once the script runs out every call fails.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// Create a provider that first returns tool calls, then a final answer.
    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, ""),
            make_text_response(answer),
        ])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);

        let responses = self.responses.lock().unwrap();
        responses
            .get(index)
            .cloned()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: format!(
                    "no more scripted responses (call #{index}, have {})",
                    responses.len()
                ),
            })
    }
}

/// A model that never stops asking for `echo`.
#[derive(Default)]
pub struct AlwaysToolProvider {
    calls: AtomicUsize,
}

impl AlwaysToolProvider {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for AlwaysToolProvider {
    fn name(&self) -> &str {
        "always_tool"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let call = MessageToolCall::new(
            format!("call_{n}"),
            "echo",
            serde_json::json!({"text": format!("round {n}")}),
        );
        Ok(make_tool_call_response(vec![call], ""))
    }
}

/// A model call that never returns.
pub struct PendingProvider;

#[async_trait]
impl Provider for PendingProvider {
    fn name(&self) -> &str {
        "pending"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

/// Asks back whenever the user message starts with `ASK:`.
pub struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, user_message: &str) -> Result<String, ProviderError> {
        if user_message.trim_start().starts_with("ASK:") {
            Ok(user_message.to_string())
        } else {
            Ok("CLEAR".into())
        }
    }
}

/// Always errors; counts how often it was asked.
#[derive(Default)]
pub struct FailingClassifier {
    calls: AtomicUsize,
}

impl FailingClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FailingClassifier {
    async fn classify(&self, _user_message: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response with tool calls and optional thought content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(thought).with_tool_calls(tool_calls),
        ..make_text_response(thought)
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall::new(format!("call_{name}"), name, args)
}

// ── Stub tools ────────────────────────────────────────────────────────────

struct EchoTool {
    name: &'static str,
    delay: Duration,
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Echoes the text argument"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolResult::text(arguments["text"].as_str().unwrap_or("")))
    }
}

struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "disk on fire".into(),
        })
    }
}

struct PanickyTool;

#[async_trait]
impl Tool for PanickyTool {
    fn name(&self) -> &str {
        "panicky"
    }
    fn description(&self) -> &str {
        "Panics while running"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        panic!("index out of range in stub tool");
    }
}

#[derive(Serialize, Deserialize)]
pub struct StubRecord {
    pub value: i64,
}

/// Returns its arguments as the structured payload, valid or not.
struct RecordTool;

#[async_trait]
impl Tool for RecordTool {
    fn name(&self) -> &str {
        "record"
    }
    fn description(&self) -> &str {
        "Produces a structured record"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"value": {"type": "integer"}}})
    }
    fn output_schema(&self) -> Option<OutputSchema> {
        Some(OutputSchema::of::<StubRecord>("records"))
    }
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: arguments.to_string(),
            data: Some(arguments),
        })
    }
}

/// `echo`, `slow` (echo after 50ms), `broken`, `panicky`, `hang` (10s) and `record`.
pub fn stub_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(EchoTool {
        name: "echo",
        delay: Duration::ZERO,
    }));
    registry.register(Box::new(EchoTool {
        name: "slow",
        delay: Duration::from_millis(50),
    }));
    registry.register(Box::new(BrokenTool));
    registry.register(Box::new(PanickyTool));
    registry.register(Box::new(EchoTool {
        name: "hang",
        delay: Duration::from_secs(10),
    }));
    registry.register(Box::new(RecordTool));
    registry
}

/// A search backend with canned results.
pub struct StaticSearch;

#[async_trait]
impl sleuth_tools::SearchBackend for StaticSearch {
    async fn search(
        &self,
        query: &str,
        _time_limit: Option<&'static str>,
        _max_results: usize,
    ) -> Result<Vec<SearchItem>, ToolError> {
        Ok(vec![SearchItem {
            title: format!("About {query}"),
            link: "https://example.org/x".into(),
            snippet: "x explained".into(),
            published: None,
        }])
    }
}

/// The built-in tools with search answered offline.
pub fn research_registry() -> ToolRegistry {
    let config = sleuth_config::ToolsConfig::default();
    sleuth_tools::registry_with_search(&config, std::sync::Arc::new(StaticSearch))
        .expect("registry builds")
}
