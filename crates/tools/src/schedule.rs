//! Conference schedule lookup over static reference data.
//!
//! Three JSON files under the data directory are read on first use and kept
//! for the life of the store:
//! - the schedule: a list of talk objects carrying an `event_id`
//! - descriptions keyed by event id
//! - speaker descriptions keyed by speaker id

use async_trait::async_trait;
use serde_json::{Map, Value};
use sleuth_core::error::ToolError;
use sleuth_core::tool::{Tool, ToolResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub const SCHEDULE_FILE: &str = "pydata_amsterdam_2025_schedule.json";
pub const DESCRIPTIONS_FILE: &str = "pydata_amsterdam_2025_descriptions.json";
pub const SPEAKERS_FILE: &str = "pydata_amsterdam_2025_speakers_description.json";

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 20;

#[derive(Debug)]
pub struct ConferenceData {
    pub schedule: Vec<Map<String, Value>>,
    pub descriptions: HashMap<String, String>,
    pub speakers: HashMap<String, String>,
}

/// Lazily loaded, read-only conference data.
///
/// Concurrent first callers wait on a single load; a failed load leaves the
/// store empty so the next call tries again.
pub struct ScheduleStore {
    dir: PathBuf,
    data: OnceCell<ConferenceData>,
}

impl ScheduleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            data: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<&ConferenceData, ToolError> {
        self.data.get_or_try_init(|| load(&self.dir)).await
    }

    pub fn is_loaded(&self) -> bool {
        self.data.initialized()
    }
}

async fn load(dir: &Path) -> Result<ConferenceData, ToolError> {
    let data = ConferenceData {
        schedule: read_json(&dir.join(SCHEDULE_FILE)).await?,
        descriptions: read_json(&dir.join(DESCRIPTIONS_FILE)).await?,
        speakers: read_json(&dir.join(SPEAKERS_FILE)).await?,
    };
    info!(
        dir = %dir.display(),
        events = data.schedule.len(),
        speakers = data.speakers.len(),
        "Loaded conference data"
    );
    Ok(data)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ToolError> {
    let failed = |reason: String| ToolError::ExecutionFailed {
        tool_name: "schedule_search".into(),
        reason: format!("{}: {reason}", path.display()),
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| failed(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| failed(e.to_string()))
}

fn event_id(event: &Map<String, Value>) -> Option<String> {
    match event.get("event_id").or_else(|| event.get("id"))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn searchable_text(event: &Map<String, Value>) -> String {
    event
        .values()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl ConferenceData {
    /// Events and speakers whose text contains every query term
    /// (case-insensitive), in file order.
    pub fn search(&self, query: &str, limit: usize) -> Value {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let matches = |text: &str| terms.iter().all(|t| text.contains(t.as_str()));

        let events: Vec<Value> = self
            .schedule
            .iter()
            .filter_map(|event| {
                let description = event_id(event).and_then(|id| self.descriptions.get(&id));
                let mut text = searchable_text(event);
                if let Some(d) = description {
                    text.push(' ');
                    text.push_str(&d.to_lowercase());
                }
                if !matches(&text) {
                    return None;
                }
                let mut hit = event.clone();
                if let Some(d) = description {
                    hit.insert("description".into(), Value::String(d.clone()));
                }
                Some(Value::Object(hit))
            })
            .take(limit)
            .collect();

        let mut speaker_ids: Vec<&String> = self.speakers.keys().collect();
        speaker_ids.sort();
        let speakers: Vec<Value> = speaker_ids
            .into_iter()
            .filter(|id| matches(&self.speakers[*id].to_lowercase()))
            .take(limit)
            .map(|id| serde_json::json!({"speaker_id": id, "description": self.speakers[id]}))
            .collect();

        serde_json::json!({ "events": events, "speakers": speakers })
    }
}

pub struct ScheduleSearchTool {
    store: Arc<ScheduleStore>,
}

impl ScheduleSearchTool {
    pub fn new(store: Arc<ScheduleStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ScheduleSearchTool {
    fn name(&self) -> &str {
        "schedule_search"
    }

    fn description(&self) -> &str {
        "Search the PyData Amsterdam 2025 conference schedule, talk descriptions \
         and speaker bios by keywords. Returns matching talks and speakers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords to match, e.g. 'polars keynote'"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum talks and speakers to return (default 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let limit = arguments["limit"]
            .as_u64()
            .map_or(DEFAULT_LIMIT, |l| (l as usize).clamp(1, MAX_LIMIT));

        let data = self.store.get().await?;
        let found = data.search(query, limit);
        Ok(ToolResult::text(
            serde_json::to_string_pretty(&found).unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &Path) {
        std::fs::write(
            dir.join(SCHEDULE_FILE),
            r#"[
                {"event_id": 101, "title": "Polars in production", "room": "Bar", "start": "2025-09-24T09:00:00+02:00", "speakers": ["Ada"]},
                {"event_id": 102, "title": "Keynote: open data", "room": "Main", "start": "2025-09-24T10:00:00+02:00", "speakers": ["Grace"]},
                {"event_id": 103, "title": "Lunch", "room": "Hall"}
            ]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join(DESCRIPTIONS_FILE),
            r#"{"101": "Lessons from moving pipelines to Polars.", "102": "Why open data matters for Amsterdam."}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join(SPEAKERS_FILE),
            r#"{"s1": "Ada maintains a Polars plugin.", "s2": "Grace works on open data portals."}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn loads_once_and_searches() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let store = Arc::new(ScheduleStore::new(dir.path()));
        let tool = ScheduleSearchTool::new(store.clone());
        assert!(!store.is_loaded());

        let result = tool
            .execute(serde_json::json!({"query": "polars"}))
            .await
            .unwrap();
        assert!(store.is_loaded());

        let found: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(found["events"].as_array().unwrap().len(), 1);
        assert_eq!(found["events"][0]["event_id"], 101);
        assert_eq!(
            found["events"][0]["description"],
            "Lessons from moving pipelines to Polars."
        );
        assert_eq!(found["speakers"][0]["speaker_id"], "s1");
    }

    #[tokio::test]
    async fn data_is_read_only_once() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let store = ScheduleStore::new(dir.path());
        let first = store.get().await.unwrap() as *const ConferenceData;

        // Later changes on disk are not picked up.
        std::fs::remove_file(dir.path().join(SCHEDULE_FILE)).unwrap();
        let second = store.get().await.unwrap() as *const ConferenceData;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn concurrent_first_use_shares_one_load() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let store = Arc::new(ScheduleStore::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get().await.map(|d| d.schedule.len()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 3);
        }
    }

    #[tokio::test]
    async fn all_terms_must_match() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let store = ScheduleStore::new(dir.path());
        let data = store.get().await.unwrap();

        let found = data.search("open keynote", 5);
        assert_eq!(found["events"].as_array().unwrap().len(), 1);
        assert_eq!(found["events"][0]["title"], "Keynote: open data");

        let none = data.search("rust keynote", 5);
        assert!(none["events"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_data_is_tool_error_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(dir.path());
        assert!(matches!(
            store.get().await,
            Err(ToolError::ExecutionFailed { .. })
        ));
        assert!(!store.is_loaded());

        write_fixture(dir.path());
        assert!(store.get().await.is_ok());
    }
}
