//! End-to-end integration tests for the Sleuth research assistant.
//!
//! These tests drive full turns from user input to reply through the real
//! tool registry, with the model replaced by a scripted provider and web
//! search answered offline.

use std::sync::{Arc, Mutex};

use sleuth_agent::{
    CancellationToken, Node, ResearchAgent, STEP_BUDGET_REPLY, SessionStore, TerminalReason,
    TurnInput,
};
use sleuth_config::AppConfig;
use sleuth_core::error::{ProviderError, ToolError};
use sleuth_core::message::{Message, MessageToolCall, Role, ThreadId};
use sleuth_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use sleuth_core::tool::ToolRegistry;
use sleuth_telemetry::{AgentTracer, ConsoleSink, RecordingSink, TraceInfo, TraceKind};
use sleuth_tools::{SearchBackend, SearchItem};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence and keeps
/// every request it was sent.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
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
                message: format!("ScriptedProvider exhausted at call #{index}"),
            })
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant("").with_tool_calls(tool_calls),
        ..text_response("")
    }
}

fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall::new(format!("call_{name}"), name, args)
}

// ── Offline search ───────────────────────────────────────────────────────

struct OfflineSearch;

#[async_trait::async_trait]
impl SearchBackend for OfflineSearch {
    async fn search(
        &self,
        query: &str,
        _time_limit: Option<&'static str>,
        max_results: usize,
    ) -> Result<Vec<SearchItem>, ToolError> {
        Ok((1..=max_results.min(2))
            .map(|i| SearchItem {
                title: format!("{query} result {i}"),
                link: format!("https://example.org/{i}"),
                snippet: format!("Snippet {i} about {query}"),
                published: None,
            })
            .collect())
    }
}

fn registry() -> Arc<ToolRegistry> {
    let config = AppConfig::default();
    Arc::new(sleuth_tools::registry_with_search(&config.tools, Arc::new(OfflineSearch)).unwrap())
}

fn agent(provider: Arc<ScriptedProvider>) -> ResearchAgent {
    ResearchAgent::from_config(&AppConfig::default(), provider, registry()).unwrap()
}

// ── E2E: full turns ──────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_direct_answer_no_tools() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("CLEAR"),
        text_response("4"),
    ]));
    let agent = agent(provider.clone());

    let outcome = agent
        .run_turn(TurnInput::new(ThreadId::from("e2e"), "What's 2+2?"))
        .await
        .unwrap();

    assert_eq!(outcome.reply, "4");
    assert_eq!(outcome.visited, vec![Node::Clarify, Node::Agent, Node::End]);
    assert_eq!(provider.calls(), 2);

    // Classification is a restricted call; the agent call sees every tool.
    assert!(provider.request(0).tools.is_empty());
    let agent_request = provider.request(1);
    assert_eq!(agent_request.tools.len(), 7);
    let system = &agent_request.messages[0];
    assert_eq!(system.role, Role::System);
    for name in ["think", "search", "fetch_url", "calculator", "schedule_search"] {
        assert!(system.content.contains(&format!("- {name}: ")), "{name} missing");
    }
}

#[tokio::test]
async fn e2e_calculator_result_is_accumulated() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("CLEAR"),
        tool_response(vec![make_tool_call(
            "calculator",
            serde_json::json!({"expression": "2 ** 10 + 1"}),
        )]),
        text_response("The answer is 1025."),
    ]));
    let agent = agent(provider);

    let outcome = agent
        .run_turn(TurnInput::new(ThreadId::from("e2e"), "What is 2^10 + 1?"))
        .await
        .unwrap();

    assert_eq!(outcome.reason, TerminalReason::Answered);
    let records = outcome.state.records("exec_results");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["result"], "1025");
    assert_eq!(records[0]["ok"], true);
}

#[tokio::test]
async fn e2e_search_then_cite() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("CLEAR"),
        tool_response(vec![
            make_tool_call("search", serde_json::json!({"query": "polars", "site": "pola.rs"})),
            make_tool_call("think", serde_json::json!({"thought": "compare sources"})),
        ]),
        tool_response(vec![make_tool_call(
            "format_citations",
            serde_json::json!({"items": [{"title": "Polars", "link": "https://pola.rs"}]}),
        )]),
        text_response("Polars is a DataFrame library [1]."),
    ]));
    let sink = Arc::new(RecordingSink::new());
    let agent = agent(provider.clone()).with_tracer(AgentTracer::new().with_sink(sink.clone()));

    let outcome = agent
        .run_turn(TurnInput::new(ThreadId::from("e2e"), "What is Polars?"))
        .await
        .unwrap();

    assert_eq!(
        outcome.visited,
        vec![
            Node::Clarify,
            Node::Agent,
            Node::Tools,
            Node::Agent,
            Node::Tools,
            Node::Agent,
            Node::End
        ]
    );
    let searches = outcome.state.records("search_results");
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0]["query"], "site:pola.rs polars");
    assert_eq!(searches[0]["results"].as_array().unwrap().len(), 2);

    let citation = outcome
        .state
        .messages
        .iter()
        .find(|m| m.tool_name.as_deref() == Some("format_citations"))
        .unwrap();
    assert!(citation.content.starts_with("1. [Polars](https://pola.rs)"));

    let tool_calls: Vec<_> = sink
        .events_of(TraceKind::ToolCall)
        .into_iter()
        .map(|e| e.info.tool.unwrap())
        .collect();
    assert_eq!(tool_calls, vec!["search", "think", "format_citations"]);
    assert_eq!(sink.events_of(TraceKind::ToolResult).len(), 3);
    assert!(sink.events_of(TraceKind::SchemaRejected).is_empty());
}

#[tokio::test]
async fn e2e_clarification_then_answer_on_one_thread() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("ASK: Which conference edition do you mean?"),
        // Second turn: the gate is exhausted, so no classification call.
        text_response("PyData Amsterdam 2025 runs in September."),
    ]));
    let agent = agent(provider.clone());
    let store = SessionStore::new();
    let thread = ThreadId::from("research-1");
    let cancel = CancellationToken::new();

    let first = store
        .run_turn(&agent, &thread, "When is the conference?", &cancel)
        .await
        .unwrap();
    assert_eq!(first.reason, TerminalReason::Clarification);
    assert_eq!(first.reply, "Which conference edition do you mean?");

    let second = store
        .run_turn(&agent, &thread, "PyData Amsterdam 2025", &cancel)
        .await
        .unwrap();
    assert_eq!(second.reason, TerminalReason::Answered);
    assert_eq!(provider.calls(), 2);

    let state = store.snapshot(&thread).await.unwrap();
    assert_eq!(state.clarification_attempts, 1);
    let contents: Vec<_> = state.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "When is the conference?",
            "Which conference edition do you mean?",
            "PyData Amsterdam 2025",
            "PyData Amsterdam 2025 runs in September."
        ]
    );
}

#[tokio::test]
async fn e2e_config_file_drives_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
model = "scripted"

[agent]
step_limit = 4
parallel_tools = false

[agent.clarification]
enabled = false
"#,
    )
    .unwrap();
    let config = AppConfig::load_from(&path).unwrap();

    let looping: Vec<_> = (0..4)
        .map(|i| {
            tool_response(vec![MessageToolCall::new(
                format!("call_{i}"),
                "think",
                serde_json::json!({"thought": format!("step {i}")}),
            )])
        })
        .collect();
    let provider = Arc::new(ScriptedProvider::new(looping));
    let agent = ResearchAgent::from_config(&config, provider.clone(), registry()).unwrap();

    let outcome = agent
        .run_turn(TurnInput::new(ThreadId::from("e2e"), "think forever"))
        .await
        .unwrap();

    assert_eq!(outcome.reason, TerminalReason::StepBudgetExceeded);
    assert_eq!(outcome.steps, 4);
    assert_eq!(outcome.reply, STEP_BUDGET_REPLY);
    assert_eq!(provider.calls(), 2);
    assert_eq!(provider.request(0).model, "scripted");
}

#[tokio::test]
async fn e2e_malformed_and_unknown_calls_recover() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("CLEAR"),
        tool_response(vec![
            MessageToolCall {
                id: "bad".into(),
                name: "calculator".into(),
                arguments: "{expression: 1".into(),
            },
            make_tool_call("shell", serde_json::json!({"cmd": "ls"})),
        ]),
        text_response("Sorry, I could not compute that."),
    ]));
    let sink = Arc::new(RecordingSink::new());
    let agent = agent(provider).with_tracer(AgentTracer::new().with_sink(sink.clone()));

    let outcome = agent
        .run_turn(TurnInput::new(ThreadId::from("e2e"), "compute"))
        .await
        .unwrap();

    assert_eq!(outcome.reason, TerminalReason::Answered);
    let results: Vec<_> = outcome
        .state
        .messages
        .iter()
        .filter(|m| m.is_tool_result())
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].content.starts_with("Error: invalid arguments"));
    assert!(results[1].content.contains("unknown tool 'shell'"));
    // The calculator declares a schema but produced no payload.
    assert!(outcome.state.records("exec_results").is_empty());
    assert_eq!(sink.events_of(TraceKind::SchemaRejected).len(), 1);
}

#[tokio::test]
async fn e2e_provider_outage_is_an_error() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_response("CLEAR")]));
    let agent = agent(provider);
    let err = agent
        .run_turn(TurnInput::new(ThreadId::from("e2e"), "hello"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exhausted"));
}

#[test]
fn e2e_console_trace_lines() {
    let sink = ConsoleSink::new(true);
    let line = sink.format_line(
        "tools",
        TraceKind::Node,
        &TraceInfo::keys(["messages", "search_results"]),
    );
    assert_eq!(line, "[trace] tools: state keys -> messages, search_results");
}

#[test]
fn e2e_default_config_round_trips() {
    let toml = AppConfig::default_toml();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, toml).unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.agent.step_limit, 100);
    assert_eq!(config.agent.history_window, 40);
    assert_eq!(config.agent.default_thread, "research-1");
    assert_eq!(config.tools.search_max_results, 5);
}
