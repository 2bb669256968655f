//! Citation formatter: turns sources into a numbered markdown reference list.

use async_trait::async_trait;
use serde::Deserialize;
use sleuth_core::error::ToolError;
use sleuth_core::tool::{Tool, ToolResult};

#[derive(Debug, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub title: Option<String>,
    pub link: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// `N. [title](link) — note`, one line per source. A missing title falls
/// back to the link.
pub fn format_references(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, src)| {
            let title = src
                .title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or(&src.link);
            match src.note.as_deref().filter(|n| !n.is_empty()) {
                Some(note) => format!("{}. [{title}]({}) — {note}", i + 1, src.link),
                None => format!("{}. [{title}]({})", i + 1, src.link),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct FormatCitationsTool;

#[async_trait]
impl Tool for FormatCitationsTool {
    fn name(&self) -> &str {
        "format_citations"
    }

    fn description(&self) -> &str {
        "Format a list of sources into a markdown References section. \
         Each source needs a title and a link; a short note is optional."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "description": "Sources to cite, in order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "link": { "type": "string" },
                            "note": { "type": "string" }
                        },
                        "required": ["title", "link"]
                    }
                }
            },
            "required": ["items"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let items = arguments
            .get("items")
            .cloned()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'items' argument".into()))?;
        let sources: Vec<Source> = serde_json::from_value(items)
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid 'items': {e}")))?;

        Ok(ToolResult::text(format_references(&sources)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn formats_numbered_references() {
        let result = FormatCitationsTool
            .execute(serde_json::json!({"items": [
                {"title": "Tokio", "link": "https://tokio.rs", "note": "runtime docs"},
                {"title": "Serde", "link": "https://serde.rs"}
            ]}))
            .await
            .unwrap();
        assert_eq!(
            result.output,
            "1. [Tokio](https://tokio.rs) — runtime docs\n2. [Serde](https://serde.rs)"
        );
    }

    #[test]
    fn missing_title_uses_link() {
        let sources = vec![Source {
            title: None,
            link: "https://arxiv.org/abs/1".into(),
            note: Some(String::new()),
        }];
        assert_eq!(
            format_references(&sources),
            "1. [https://arxiv.org/abs/1](https://arxiv.org/abs/1)"
        );
    }

    #[tokio::test]
    async fn empty_list_is_empty_text() {
        let result = FormatCitationsTool
            .execute(serde_json::json!({"items": []}))
            .await
            .unwrap();
        assert!(result.output.is_empty());
    }

    #[tokio::test]
    async fn malformed_items_rejected() {
        let err = FormatCitationsTool
            .execute(serde_json::json!({"items": [{"title": "no link"}]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
