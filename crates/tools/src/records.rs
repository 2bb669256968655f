//! Structured records produced by the research tools.
//!
//! Each record type doubles as the output schema of its tool: a payload is
//! folded into the named accumulator only if it deserializes as the type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleuth_core::tool::OutputSchema;

pub const SEARCH_RESULTS: &str = "search_results";
pub const FETCHED_PAGES: &str = "fetched_pages";
pub const EXEC_RESULTS: &str = "exec_results";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub title: String,
    pub link: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

/// Results of one `search` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The query as sent to the backend (including any `site:` prefix)
    pub query: String,
    pub results: Vec<SearchItem>,
    pub retrieved_at: DateTime<Utc>,
}

impl SearchResult {
    pub fn schema() -> OutputSchema {
        OutputSchema::of::<Self>(SEARCH_RESULTS)
    }
}

/// A fetched page reduced to text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub url: String,
    /// HTTP status, or 0 when the request never completed
    pub status_code: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
}

impl FetchResult {
    pub fn schema() -> OutputSchema {
        OutputSchema::of::<Self>(FETCHED_PAGES)
    }
}

/// Outcome of a sandboxed expression evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecResult {
    pub expression: String,
    pub result: String,
    pub ok: bool,
}

impl ExecResult {
    pub fn schema() -> OutputSchema {
        OutputSchema::of::<Self>(EXEC_RESULTS)
    }
}
