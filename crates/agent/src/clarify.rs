//! The clarification gate.
//!
//! Before any reasoning happens, the latest user message is classified as
//! either clear enough to work on or too ambiguous. An ambiguous request ends
//! the turn with a single clarifying question. Questions are bounded per
//! thread by `max_attempts`; once exhausted the gate always lets the turn
//! through without classifying.

use async_trait::async_trait;
use sleuth_config::{ClarificationConfig, ClarifyPolicy};
use sleuth_core::error::ProviderError;
use sleuth_core::message::{Message, last_user_message};
use sleuth_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::state::{ConversationState, StateUpdate};

/// Instruction sent with every classification request.
pub const CLASSIFY_INSTRUCTION: &str = "\
You decide whether a research request is specific enough to act on. \
Reply with exactly CLEAR if it is. Otherwise reply with ASK: followed by \
one short clarifying question. Do not answer the request itself.";

/// Asked when the classifier wants clarification but gives no question.
pub const DEFAULT_QUESTION: &str =
    "Could you tell me a bit more about what you are looking for?";

/// Decides whether a user message needs clarification.
///
/// Returns the raw classifier text: `CLEAR` or `ASK: <question>`.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, user_message: &str) -> Result<String, ProviderError>;
}

/// Classifies with a restricted model call: fixed instruction, the user
/// message, no tools.
pub struct ProviderClassifier {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderClassifier {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Classifier for ProviderClassifier {
    async fn classify(&self, user_message: &str) -> Result<String, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(CLASSIFY_INSTRUCTION),
                Message::user(user_message),
            ],
            temperature: 0.0,
            max_tokens: Some(128),
            tools: vec![],
        };
        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }
}

/// A parsed classifier reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clear,
    Ask(String),
}

/// Parse classifier output. `None` means there was nothing to parse.
pub fn parse_verdict(raw: &str) -> Option<Verdict> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if text.eq_ignore_ascii_case("clear") {
        return Some(Verdict::Clear);
    }
    let question = text
        .split_once(':')
        .map(|(_, rest)| rest.trim())
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_QUESTION);
    Some(Verdict::Ask(question.to_string()))
}

pub struct ClarificationGate {
    classifier: Arc<dyn Classifier>,
    config: ClarificationConfig,
}

impl ClarificationGate {
    pub fn new(classifier: Arc<dyn Classifier>, config: ClarificationConfig) -> Self {
        Self { classifier, config }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_config(mut self, config: ClarificationConfig) -> Self {
        self.config = config;
        self
    }

    /// No more questions may be asked on this thread.
    pub fn exhausted(&self, state: &ConversationState) -> bool {
        state.clarification_attempts >= self.config.max_attempts
    }

    /// Run the gate. An empty update means "proceed"; otherwise the update
    /// carries the question and a counter increment.
    pub async fn run(&self, state: &ConversationState) -> StateUpdate {
        if !self.config.enabled || self.exhausted(state) {
            return StateUpdate::new();
        }
        let Some(user) = last_user_message(&state.messages) else {
            return StateUpdate::new();
        };

        match self.verdict(&user.content).await {
            Verdict::Clear => StateUpdate::new(),
            Verdict::Ask(question) => {
                debug!(thread = %state.thread_id, %question, "Asking for clarification");
                let mut update = StateUpdate::new().with_message(Message::assistant(question));
                update.clarification_delta = 1;
                update
            }
        }
    }

    async fn verdict(&self, user_message: &str) -> Verdict {
        let attempts = match self.config.policy {
            ClarifyPolicy::FailOpen => 1,
            ClarifyPolicy::FailClosed => 2,
        };
        for attempt in 1..=attempts {
            match self.classifier.classify(user_message).await {
                Ok(raw) => match parse_verdict(&raw) {
                    Some(verdict) => return verdict,
                    None => warn!(attempt, "Classifier returned empty output"),
                },
                Err(e) => warn!(attempt, error = %e, "Classifier call failed"),
            }
        }
        match self.config.policy {
            ClarifyPolicy::FailOpen => Verdict::Clear,
            ClarifyPolicy::FailClosed => Verdict::Ask(DEFAULT_QUESTION.to_string()),
        }
    }
}
