//! The Sleuth agent: a bounded state machine around a reasoning model.
//!
//! Each user turn runs through an explicit graph:
//!
//! 1. **Clarify**: a cheap classification decides whether the request is
//!    specific enough; if not, the turn ends with one clarifying question
//! 2. **Agent**: the model sees a window of the conversation and either
//!    answers or asks for tool calls
//! 3. **Tools**: requested calls are executed, results appended to the log
//!    and structured records folded into typed accumulators; back to 2
//!
//! The loop stops on an answer, a question, the step ceiling or
//! cancellation. Every node and tool exchange is reported to the tracer.

pub mod clarify;
pub mod dispatch;
pub mod graph;
pub mod history;
pub mod prompt;
pub mod session;
pub mod state;
pub mod step;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use clarify::{ClarificationGate, Classifier, ProviderClassifier, Verdict};
pub use dispatch::ToolDispatcher;
pub use graph::{
    CANCELLED_REPLY, Node, ResearchAgent, STEP_BUDGET_REPLY, TerminalReason, TurnInput,
    TurnOutcome, transition,
};
pub use history::{aligned_window, window};
pub use prompt::{DEFAULT_TEMPLATE, render_system_prompt};
pub use session::SessionStore;
pub use state::{Accumulators, ConversationState, StateUpdate, fold};
pub use step::AgentStep;
pub use tokio_util::sync::CancellationToken;
