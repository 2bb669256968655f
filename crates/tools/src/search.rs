//! Web search tool backed by DuckDuckGo's HTML endpoint.
//!
//! The backend sits behind [`SearchBackend`] so the tool can be exercised
//! without network access. Any backend failure degrades to an empty result.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use sleuth_core::error::ToolError;
use sleuth_core::tool::{OutputSchema, Tool, ToolResult};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::html::element_text;
use crate::records::{SearchItem, SearchResult};

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) sleuth/0.1";

/// Something that can answer a text query with ranked results.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        time_limit: Option<&'static str>,
        max_results: usize,
    ) -> Result<Vec<SearchItem>, ToolError>;
}

/// Scrapes `html.duckduckgo.com`.
pub struct DuckDuckGoBackend {
    client: reqwest::Client,
}

impl DuckDuckGoBackend {
    pub fn new() -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "search".into(),
                reason: format!("HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    async fn search(
        &self,
        query: &str,
        time_limit: Option<&'static str>,
        max_results: usize,
    ) -> Result<Vec<SearchItem>, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "search".into(),
            reason,
        };

        let mut params = vec![("q", query)];
        if let Some(df) = time_limit {
            params.push(("df", df));
        }
        let url = url::Url::parse_with_params(DDG_HTML_URL, &params)
            .map_err(|e| failed(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        Ok(parse_results(&body, max_results))
    }
}

static RESULT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("valid selector"));

static RESULT_SNIPPET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__snippet").expect("valid selector"));

static RESULT_TIMESTAMP: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".result__timestamp").expect("valid selector"));

/// Parse a DuckDuckGo HTML results page.
///
/// Each title link belongs to the enclosing `.result` block; snippet and
/// timestamp are looked up inside that block.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchItem> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for anchor in document.select(&RESULT_LINK) {
        if items.len() >= max_results {
            break;
        }
        let link = normalize_link(anchor.value().attr("href").unwrap_or_default());
        if link.is_empty() {
            continue;
        }
        let title = match element_text(anchor) {
            t if t.is_empty() => "No title".to_string(),
            t => t,
        };
        let block = result_block(anchor);
        let snippet = block
            .and_then(|b| b.select(&RESULT_SNIPPET).next())
            .map(element_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "No description".to_string());
        let published = block
            .and_then(|b| b.select(&RESULT_TIMESTAMP).next())
            .map(element_text)
            .filter(|s| !s.is_empty());

        items.push(SearchItem {
            title,
            link,
            snippet,
            published,
        });
    }

    items
}

fn result_block<'a>(anchor: ElementRef<'a>) -> Option<ElementRef<'a>> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().classes().any(|class| class == "result"))
}

/// Unwrap DuckDuckGo redirect links (`duckduckgo.com/l/?uddg=<target>`).
pub fn normalize_link(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let absolute = if raw.starts_with("//") {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };

    let Ok(parsed) = url::Url::parse(&absolute) else {
        return raw.to_string();
    };
    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"))
        && parsed.path().starts_with("/l/");
    if is_redirect {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
            return target.into_owned();
        }
    }
    absolute
}

/// Map a recency window in days onto DuckDuckGo's time-limit codes.
pub fn time_limit(days: Option<i64>) -> Option<&'static str> {
    match days? {
        d if d <= 1 => Some("d"),
        d if d <= 7 => Some("w"),
        d if d <= 31 => Some("m"),
        _ => Some("y"),
    }
}

pub struct SearchTool {
    backend: Arc<dyn SearchBackend>,
    max_results: usize,
}

impl SearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>, max_results: usize) -> Self {
        Self {
            backend,
            max_results,
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web using DuckDuckGo. Use `site` to restrict results to a domain \
         (e.g. \"github.com\" or \"arxiv.org\") and `days` to prefer recent results \
         (1 = past day, 7 = past week, 30 = past month, more = past year)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "site": {
                    "type": "string",
                    "description": "Optional domain restriction"
                },
                "days": {
                    "type": "integer",
                    "description": "Optional recency window in days"
                }
            },
            "required": ["query"]
        })
    }

    fn output_schema(&self) -> Option<OutputSchema> {
        Some(SearchResult::schema())
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let query = match arguments["site"].as_str().filter(|s| !s.trim().is_empty()) {
            Some(site) => format!("site:{} {query}", site.trim()),
            None => query.to_string(),
        };
        let limit = time_limit(arguments["days"].as_i64());

        let results = match self.backend.search(&query, limit, self.max_results).await {
            Ok(mut items) => {
                items.truncate(self.max_results);
                items
            }
            Err(e) => {
                warn!(query = %query, error = %e, "Search failed, returning no results");
                Vec::new()
            }
        };
        debug!(query = %query, count = results.len(), "Search complete");

        ToolResult::structured(&SearchResult {
            query,
            results,
            retrieved_at: chrono::Utc::now(),
        })
    }
}
