//! # Sleuth Core
//!
//! Domain types, traits, and error definitions for the Sleuth research
//! assistant. This crate has **zero framework dependencies**: it defines the
//! domain model that the agent loop, providers, and tools implement against.
//!
//! ## Design Philosophy
//!
//! The two collaborators the agent loop talks to (the reasoning model and the
//! tools) are traits defined here. Implementations live in their respective
//! crates, so the loop can be driven by scripted stubs in tests.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, MessageToolCall, Role, ThreadId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{OutputSchema, Tool, ToolCall, ToolRegistry, ToolResult};
