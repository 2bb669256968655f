//! Built-in research tools for Sleuth.
//!
//! Tools give the assistant its reach outside the model: web search, page
//! fetching, citation formatting, a sandboxed calculator, the clock, a
//! scratchpad and the conference schedule. Tools producing structured
//! records declare them through [`records`] so the agent can fold them into
//! its accumulators.

pub mod calculator;
pub mod citations;
pub mod datetime;
pub mod fetch;
mod html;
pub mod records;
pub mod schedule;
pub mod search;
pub mod think;

use sleuth_config::ToolsConfig;
use sleuth_core::error::ToolError;
use sleuth_core::tool::ToolRegistry;
use std::sync::Arc;

pub use records::{ExecResult, FetchResult, SearchItem, SearchResult};
pub use search::SearchBackend;

/// Create the default tool registry with all built-in tools.
///
/// Registration order is the order tools are listed in the system prompt.
pub fn default_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let backend = Arc::new(search::DuckDuckGoBackend::new()?);
    registry_with_search(config, backend)
}

/// Like [`default_registry`] but with a caller-supplied search backend.
pub fn registry_with_search(
    config: &ToolsConfig,
    backend: Arc<dyn SearchBackend>,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(think::ThinkTool));
    registry.register(Box::new(search::SearchTool::new(
        backend,
        config.search_max_results,
    )));
    registry.register(Box::new(fetch::FetchUrlTool::new(
        config.fetch_timeout_secs,
        config.fetch_max_chars,
    )?));
    registry.register(Box::new(citations::FormatCitationsTool));
    registry.register(Box::new(calculator::CalculatorTool));
    registry.register(Box::new(datetime::CurrentDatetimeTool));
    registry.register(Box::new(schedule::ScheduleSearchTool::new(Arc::new(
        schedule::ScheduleStore::new(&config.data_dir),
    ))));
    Ok(registry)
}
