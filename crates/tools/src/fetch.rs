//! Page fetch tool: GET a URL and reduce HTML to readable text.

use async_trait::async_trait;
use sleuth_core::error::ToolError;
use sleuth_core::tool::{OutputSchema, Tool, ToolResult};
use std::time::Duration;
use tracing::{debug, warn};

use crate::html::{page_text, page_title, truncate_chars};
use crate::records::FetchResult;

pub struct FetchUrlTool {
    client: reqwest::Client,
    default_timeout_secs: u64,
    max_chars: usize,
}

impl FetchUrlTool {
    pub fn new(default_timeout_secs: u64, max_chars: usize) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; sleuth/0.1)")
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "fetch_url".into(),
                reason: format!("HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            default_timeout_secs,
            max_chars,
        })
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResult, reqwest::Error> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.text().await?;
        Ok(self.build_result(url, status_code, content_type, &body))
    }

    /// Only HTML bodies are reduced to text; anything else yields empty text.
    fn build_result(
        &self,
        url: &str,
        status_code: u16,
        content_type: String,
        body: &str,
    ) -> FetchResult {
        let is_html = content_type.to_lowercase().contains("text/html");
        let (title, text) = if is_html {
            (page_title(body), truncate_chars(page_text(body), self.max_chars))
        } else {
            (None, String::new())
        };

        FetchResult {
            url: url.to_string(),
            status_code,
            content_type: Some(content_type),
            title,
            text,
        }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return cleaned page text along with the status code, \
         content type and page title. Text is truncated for long pages."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to fetch"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Request timeout in seconds (default 10)"
                }
            },
            "required": ["url"]
        })
    }

    fn output_schema(&self) -> Option<OutputSchema> {
        Some(FetchResult::schema())
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;
        let timeout_secs = arguments["timeout"]
            .as_u64()
            .filter(|t| *t > 0)
            .unwrap_or(self.default_timeout_secs);

        let record = match self.fetch(url, Duration::from_secs(timeout_secs)).await {
            Ok(record) => {
                debug!(url, status = record.status_code, chars = record.text.len(), "Fetched page");
                record
            }
            Err(e) => {
                warn!(url, error = %e, "Fetch failed");
                fetch_error(url, &e.to_string())
            }
        };

        ToolResult::structured(&record)
    }
}

fn fetch_error(url: &str, reason: &str) -> FetchResult {
    FetchResult {
        url: url.to_string(),
        status_code: 0,
        content_type: None,
        title: None,
        text: format!("Fetch error: {reason}"),
    }
}
