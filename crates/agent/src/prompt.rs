//! System instruction rendering.

use sleuth_core::provider::ToolDefinition;
use std::path::Path;

/// Default system instruction. `{tools}` and `{tool_names}` are filled in by
/// [`render_system_prompt`].
pub const DEFAULT_TEMPLATE: &str = "\
You are Sleuth, a careful research assistant.

Answer the user's question. When you need information you do not have, \
use the tools below. Prefer a few targeted searches over many broad ones, \
fetch a page when a snippet is not enough, and cite the sources you relied on.

Available tools:
{tools}

You may call: {tool_names}.

When you have enough information, reply with the final answer and no tool calls.";

/// Fill `{tools}` with one line per tool (`- name: description Args: a, b`)
/// and `{tool_names}` with a comma-separated list of names.
pub fn render_system_prompt(template: &str, tools: &[ToolDefinition]) -> String {
    let tool_lines = tools
        .iter()
        .map(|t| {
            let args = t.argument_names();
            if args.is_empty() {
                format!("- {}: {}", t.name, t.description)
            } else {
                format!("- {}: {} Args: {}", t.name, t.description, args.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    let tool_names = tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    template
        .replace("{tools}", &tool_lines)
        .replace("{tool_names}", &tool_names)
}

/// Read a template file, or fall back to [`DEFAULT_TEMPLATE`] when no path
/// is configured.
pub fn load_template(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}
