//! The control loop: an explicit state machine over four nodes.
//!
//! ```text
//!   Clarify ──question──▶ End
//!      │
//!      └──clear──▶ Agent ──answer──▶ End
//!                   ▲  │
//!                   │  └──tool calls──▶ Tools
//!                   └──────────────────────┘
//! ```
//!
//! Every executed node counts one step against the step ceiling. Each node
//! reads the current state and returns a [`StateUpdate`]; the loop merges it
//! only after the node completes, so a cancelled model call leaves the state
//! exactly as it was.

use serde::{Deserialize, Serialize};
use sleuth_config::{AppConfig, ClarificationConfig};
use sleuth_core::error::{Error, Result};
use sleuth_core::message::{Message, ThreadId};
use sleuth_core::provider::Provider;
use sleuth_core::tool::ToolRegistry;
use sleuth_telemetry::AgentTracer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clarify::{ClarificationGate, Classifier, ProviderClassifier};
use crate::dispatch::ToolDispatcher;
use crate::prompt::{DEFAULT_TEMPLATE, load_template, render_system_prompt};
use crate::state::{Accumulators, ConversationState, StateUpdate};
use crate::step::AgentStep;

/// Reply when the step ceiling stops a turn.
pub const STEP_BUDGET_REPLY: &str =
    "I could not complete this request within the allowed number of steps.";

/// Reply when a turn is cancelled or times out.
pub const CANCELLED_REPLY: &str = "The request was cancelled before an answer was ready.";

/// Result text for tool calls the turn ended before running.
pub const NOT_EXECUTED: &str = "Error: not executed, the turn ended before dispatch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Clarify,
    Agent,
    Tools,
    End,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clarify => "clarify",
            Self::Agent => "agent",
            Self::Tools => "tools",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The next node, given the node just executed and its update.
pub fn transition(node: Node, update: &StateUpdate) -> Node {
    match node {
        Node::Clarify if update.clarification_delta > 0 => Node::End,
        Node::Clarify => Node::Agent,
        Node::Agent if update.last_message().is_some_and(Message::requests_tools) => Node::Tools,
        Node::Agent => Node::End,
        Node::Tools => Node::Agent,
        Node::End => Node::End,
    }
}

/// Why a turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Answered,
    Clarification,
    StepBudgetExceeded,
    Cancelled,
}

/// The terminal reason for reaching `End` straight from `node`.
fn reason_for_end(node: Node) -> Option<TerminalReason> {
    match node {
        Node::Clarify => Some(TerminalReason::Clarification),
        Node::Agent => Some(TerminalReason::Answered),
        Node::Tools | Node::End => None,
    }
}

/// Everything a turn starts from.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub thread_id: ThreadId,
    pub messages: Vec<Message>,
    pub accumulators: Accumulators,
    pub clarification_attempts: u32,
    pub user_message: String,
    /// Overrides the agent's step ceiling for this turn
    pub step_limit: Option<u32>,
}

impl TurnInput {
    /// First turn of a fresh thread.
    pub fn new(thread_id: ThreadId, user_message: impl Into<String>) -> Self {
        Self::from_state(ConversationState::new(thread_id), user_message)
    }

    /// Next turn of a thread, carrying its state forward.
    pub fn from_state(state: ConversationState, user_message: impl Into<String>) -> Self {
        Self {
            thread_id: state.thread_id,
            messages: state.messages,
            accumulators: state.accumulators,
            clarification_attempts: state.clarification_attempts,
            user_message: user_message.into(),
            step_limit: None,
        }
    }

    pub fn with_step_limit(mut self, limit: u32) -> Self {
        self.step_limit = Some(limit);
        self
    }
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// State to carry into the next turn
    pub state: ConversationState,
    pub reason: TerminalReason,
    /// What to show the user
    pub reply: String,
    /// Nodes executed
    pub steps: u32,
    /// Nodes in visit order, ending with `End` when the graph reached it
    pub visited: Vec<Node>,
}

/// The research assistant: clarification gate, reasoning model and tool
/// dispatch wired into one bounded loop.
pub struct ResearchAgent {
    /// Tool registry, also rendered into the system instruction
    tools: Arc<ToolRegistry>,

    /// The agent step (model + windowing)
    step: AgentStep,

    /// The clarification gate
    gate: ClarificationGate,

    /// Tool dispatch
    dispatcher: ToolDispatcher,

    /// Observes nodes and tool traffic
    tracer: AgentTracer,

    /// Maximum node executions per turn
    step_limit: u32,

    /// Cancel a turn after this long
    turn_timeout: Option<Duration>,
}

impl ResearchAgent {
    /// Create an agent with default settings. The same provider serves the
    /// reasoning model and the clarification classifier.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let model = model.into();
        let system_prompt = render_system_prompt(DEFAULT_TEMPLATE, &tools.definitions());
        let classifier = Arc::new(ProviderClassifier::new(provider.clone(), model.clone()));
        Self {
            step: AgentStep::new(provider, model, system_prompt, tools.definitions()),
            gate: ClarificationGate::new(classifier, ClarificationConfig::default()),
            dispatcher: ToolDispatcher::new(tools.clone()),
            tools,
            tracer: AgentTracer::new(),
            step_limit: 100,
            turn_timeout: None,
        }
    }

    /// Build an agent from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self> {
        let agent = &config.agent;
        let template =
            load_template(agent.system_prompt_path.as_deref()).map_err(|e| Error::Config {
                message: format!("Cannot read system prompt template: {e}"),
            })?;

        Ok(Self::new(provider, &config.model, tools)
            .with_system_template(&template)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_history_window(agent.history_window, agent.pair_safe_window)
            .with_clarification(agent.clarification.clone())
            .with_parallel_tools(agent.parallel_tools)
            .with_tool_timeout(Duration::from_secs(agent.tool_timeout_secs))
            .with_step_limit(agent.step_limit)
            .with_turn_timeout(agent.turn_timeout_secs.map(Duration::from_secs)))
    }

    /// Render `template` against the registry and use it as the system
    /// instruction.
    pub fn with_system_template(mut self, template: &str) -> Self {
        let prompt = render_system_prompt(template, &self.tools.definitions());
        self.step = self.step.with_system_prompt(prompt);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.step = self.step.with_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.step = self.step.with_max_tokens(Some(max_tokens));
        self
    }

    /// Number of recent messages the model sees, and whether the cut may
    /// start on an orphaned tool result.
    pub fn with_history_window(mut self, max_len: usize, pair_safe: bool) -> Self {
        self.step = self.step.with_history_window(max_len, pair_safe);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.gate = self.gate.with_classifier(classifier);
        self
    }

    pub fn with_clarification(mut self, config: ClarificationConfig) -> Self {
        self.gate = self.gate.with_config(config);
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.dispatcher = self.dispatcher.with_parallel(parallel);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_timeout(timeout);
        self
    }

    pub fn with_tracer(mut self, tracer: AgentTracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_step_limit(mut self, limit: u32) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn step_limit(&self) -> u32 {
        self.step_limit
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn to a terminal state.
    pub async fn run_turn(&self, input: TurnInput) -> Result<TurnOutcome> {
        self.run_turn_with_cancel(input, &CancellationToken::new())
            .await
    }

    /// Run one turn, stopping early if `cancel` fires or the turn timeout
    /// elapses.
    ///
    /// Cancellation is observed between nodes. A model call in flight is
    /// abandoned and its result discarded; a dispatch step in flight runs to
    /// completion so every tool call keeps its result.
    pub async fn run_turn_with_cancel(
        &self,
        input: TurnInput,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let limit = input.step_limit.unwrap_or(self.step_limit);
        let deadline = self.turn_timeout.map(|t| Instant::now() + t);

        let mut state = ConversationState {
            thread_id: input.thread_id,
            messages: input.messages,
            accumulators: input.accumulators,
            clarification_attempts: input.clarification_attempts,
        };
        state.messages.push(Message::user(input.user_message));

        info!(thread = %state.thread_id, step_limit = limit, "Turn starting");

        let mut node = Node::Clarify;
        let mut steps = 0u32;
        let mut visited = Vec::new();
        let mut reason = None;

        while node != Node::End {
            if is_stopped(cancel, deadline) {
                reason = Some(TerminalReason::Cancelled);
                break;
            }
            if steps >= limit {
                warn!(thread = %state.thread_id, steps, "Step ceiling reached");
                reason = Some(TerminalReason::StepBudgetExceeded);
                break;
            }

            let update = match node {
                Node::Clarify => match interruptible(self.gate.run(&state), cancel, deadline).await {
                    Some(update) => update,
                    None => {
                        reason = Some(TerminalReason::Cancelled);
                        break;
                    }
                },
                Node::Agent => match interruptible(self.step.run(&state), cancel, deadline).await {
                    Some(update) => update?,
                    None => {
                        reason = Some(TerminalReason::Cancelled);
                        break;
                    }
                },
                Node::Tools => self.dispatcher.run(&state, &self.tracer).await,
                Node::End => break,
            };

            steps += 1;
            visited.push(node);
            let next = transition(node, &update);
            debug!(from = %node, to = %next, step = steps, "Transition");
            self.trace(node, &update);
            state.apply(update);

            if next == Node::End {
                visited.push(Node::End);
                reason = reason_for_end(node);
            }
            node = next;
        }

        let reason = reason.ok_or(Error::MissingTerminalState { steps })?;
        let reply = match reason {
            TerminalReason::Answered | TerminalReason::Clarification => state
                .last_message()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            TerminalReason::StepBudgetExceeded => close_turn(&mut state, STEP_BUDGET_REPLY),
            TerminalReason::Cancelled => close_turn(&mut state, CANCELLED_REPLY),
        };

        info!(thread = %state.thread_id, ?reason, steps, "Turn finished");
        Ok(TurnOutcome {
            state,
            reason,
            reply,
            steps,
            visited,
        })
    }

    fn trace(&self, node: Node, update: &StateUpdate) {
        if !self.tracer.is_enabled() {
            return;
        }
        let name = node.as_str();
        self.tracer.node(name, &update.touched_keys());

        if let Some(request) = update.last_message().filter(|m| m.requests_tools()) {
            for call in &request.tool_calls {
                let args = serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
                self.tracer.tool_call(name, &call.name, &args);
            }
        }
        for result in update.messages.iter().filter(|m| m.is_tool_result()) {
            self.tracer
                .tool_result(name, result.tool_name.as_deref().unwrap_or("?"));
        }
    }
}

fn is_stopped(cancel: &CancellationToken, deadline: Option<Instant>) -> bool {
    cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d)
}

/// Drive `fut` unless cancellation or the deadline comes first.
async fn interruptible<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Option<F::Output> {
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        _ = expired => None,
        out = fut => Some(out),
    }
}

/// End a turn that did not reach `End`: answer any tool calls left pending
/// so the log stays well formed, then append `reply`.
fn close_turn(state: &mut ConversationState, reply: &str) -> String {
    if let Some(request) = state.last_message().filter(|m| m.requests_tools()) {
        let pending: Vec<Message> = request
            .tool_calls
            .iter()
            .map(|c| Message::tool_result(&c.id, &c.name, NOT_EXECUTED))
            .collect();
        state.messages.extend(pending);
    }
    state.messages.push(Message::assistant(reply));
    reply.to_string()
}
