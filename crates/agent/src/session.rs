//! In-memory sessions, one per thread.
//!
//! A turn holds its thread's lock from start to terminal state, so turns on
//! the same thread never interleave. Nothing is persisted.

use sleuth_core::error::Result;
use sleuth_core::message::ThreadId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::graph::{ResearchAgent, TurnInput, TurnOutcome};
use crate::state::ConversationState;

type Session = Arc<tokio::sync::Mutex<ConversationState>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ThreadId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `thread_id`, created empty on first use.
    pub fn session(&self, thread_id: &ThreadId) -> Session {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions
            .entry(thread_id.clone())
            .or_insert_with(|| {
                debug!(thread = %thread_id, "Creating session");
                Arc::new(tokio::sync::Mutex::new(ConversationState::new(
                    thread_id.clone(),
                )))
            })
            .clone()
    }

    /// Run one turn on `thread_id` and store the resulting state.
    ///
    /// If the turn fails, the thread's state is left as it was before.
    pub async fn run_turn(
        &self,
        agent: &ResearchAgent,
        thread_id: &ThreadId,
        user_message: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let session = self.session(thread_id);
        let mut state = session.lock().await;
        let input = TurnInput::from_state(state.clone(), user_message);
        let outcome = agent.run_turn_with_cancel(input, cancel).await?;
        *state = outcome.state.clone();
        Ok(outcome)
    }

    /// A copy of the thread's current state, if the thread exists.
    pub async fn snapshot(&self, thread_id: &ThreadId) -> Option<ConversationState> {
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(thread_id)
            .cloned()?;
        let state = session.lock().await;
        Some(state.clone())
    }

    /// Known threads, sorted.
    pub fn threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<_> = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        threads.sort();
        threads
    }

    /// Forget a thread. Returns whether it existed.
    pub fn remove(&self, thread_id: &ThreadId) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(thread_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
