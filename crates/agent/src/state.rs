//! Conversation state and the partial updates nodes produce.
//!
//! The control loop owns the authoritative [`ConversationState`]. Nodes only
//! read it and hand back a [`StateUpdate`], which the loop merges in one go
//! after the node completes. An abandoned node therefore leaves no trace in
//! the state.

use serde::{Deserialize, Serialize};
use sleuth_core::message::{Message, ThreadId};
use std::collections::BTreeMap;

/// Accumulator key → records, in fold order.
pub type Accumulators = BTreeMap<String, Vec<serde_json::Value>>;

/// Everything carried from one turn of a thread to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: ThreadId,

    /// Message log, insertion order is causal order
    pub messages: Vec<Message>,

    /// Structured tool records, merged additively across turns
    #[serde(default)]
    pub accumulators: Accumulators,

    /// Clarifying questions already asked on this thread
    #[serde(default)]
    pub clarification_attempts: u32,
}

impl ConversationState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            accumulators: Accumulators::new(),
            clarification_attempts: 0,
        }
    }

    /// Records folded under `key` so far.
    pub fn records(&self, key: &str) -> &[serde_json::Value] {
        self.accumulators.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Merge a node's update: messages are appended, accumulator records are
    /// folded after the existing ones, the attempt counter is bumped.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        for (key, records) in update.accumulators {
            let existing = self.accumulators.remove(&key).unwrap_or_default();
            self.accumulators.insert(key, fold(existing, records));
        }
        self.clarification_attempts += update.clarification_delta;
    }
}

/// A partial state update returned by one node.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub messages: Vec<Message>,
    pub accumulators: Accumulators,
    pub clarification_delta: u32,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Queue one record for `key`, after any already queued.
    pub fn push_record(&mut self, key: &str, record: serde_json::Value) {
        self.accumulators.entry(key.to_string()).or_default().push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.accumulators.is_empty() && self.clarification_delta == 0
    }

    /// The state keys this update writes, for tracing.
    pub fn touched_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if !self.messages.is_empty() {
            keys.push("messages");
        }
        keys.extend(self.accumulators.keys().map(String::as_str));
        if self.clarification_delta > 0 {
            keys.push("clarification_attempts");
        }
        keys
    }

    /// The last message this update appends.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// The accumulator reducer: concatenation, old records first. No dedup.
pub fn fold<T>(mut old: Vec<T>, new: Vec<T>) -> Vec<T> {
    old.extend(new);
    old
}
