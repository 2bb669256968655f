//! The agent step: one model call over the windowed log.

use sleuth_core::error::Result;
use sleuth_core::message::{Message, Role};
use sleuth_core::provider::{Provider, ProviderRequest, ToolDefinition};
use std::sync::Arc;
use tracing::debug;

use crate::history::{aligned_window, window};
use crate::state::{ConversationState, StateUpdate};

/// Calls the reasoning model. Holds no per-turn state.
pub struct AgentStep {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: String,
    tool_definitions: Vec<ToolDefinition>,
    history_window: usize,
    pair_safe_window: bool,
}

impl AgentStep {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        tool_definitions: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            system_prompt: system_prompt.into(),
            tool_definitions,
            history_window: 40,
            pair_safe_window: true,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_history_window(mut self, max_len: usize, pair_safe: bool) -> Self {
        self.history_window = max_len;
        self.pair_safe_window = pair_safe;
        self
    }

    /// The messages the model sees: system instruction, then the window.
    pub fn model_view(&self, state: &ConversationState) -> Vec<Message> {
        let recent = if self.pair_safe_window {
            aligned_window(&state.messages, self.history_window)
        } else {
            window(&state.messages, self.history_window)
        };
        let mut view = Vec::with_capacity(recent.len() + 1);
        view.push(Message::system(&self.system_prompt));
        view.extend(recent.iter().cloned());
        view
    }

    /// Produce exactly one assistant message.
    pub async fn run(&self, state: &ConversationState) -> Result<StateUpdate> {
        let messages = self.model_view(state);
        debug!(
            model = %self.model,
            messages = messages.len(),
            log_len = state.messages.len(),
            "Calling model"
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tool_definitions.clone(),
        };
        let response = self.provider.complete(request).await?;

        let mut message = response.message;
        message.role = Role::Assistant;
        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                tokens = usage.total_tokens,
                tool_calls = message.tool_calls.len(),
                "Model responded"
            );
        }
        Ok(StateUpdate::new().with_message(message))
    }
}
