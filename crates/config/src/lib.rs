//! Configuration loading, validation, and management for Sleuth.
//!
//! Loads configuration from `~/.sleuth/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sleuth/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider name (used for logging and well-known base URLs)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL (any OpenAI-compatible endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used for reasoning and clarification
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Control loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Trace output settings
    #[serde(default)]
    pub trace: TraceConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("trace", &self.trace)
            .field("tools", &self.tools)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum node executions per turn
    #[serde(default = "default_step_limit")]
    pub step_limit: u32,

    /// Number of most recent messages shown to the model
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Never start the model's window with an orphaned tool result
    #[serde(default = "default_true")]
    pub pair_safe_window: bool,

    /// Run the tool calls of one step concurrently
    #[serde(default = "default_true")]
    pub parallel_tools: bool,

    /// Per tool call timeout
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// Cancel a turn after this many seconds (unset = no limit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_timeout_secs: Option<u64>,

    /// Prompt template file with `{tools}` / `{tool_names}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<PathBuf>,

    /// Thread used by the CLI when none is given
    #[serde(default = "default_thread")]
    pub default_thread: String,

    #[serde(default)]
    pub clarification: ClarificationConfig,
}

fn default_step_limit() -> u32 {
    100
}
fn default_history_window() -> usize {
    40
}
fn default_tool_timeout() -> u64 {
    30
}
fn default_thread() -> String {
    "research-1".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            step_limit: default_step_limit(),
            history_window: default_history_window(),
            pair_safe_window: true,
            parallel_tools: true,
            tool_timeout_secs: default_tool_timeout(),
            turn_timeout_secs: None,
            system_prompt_path: None,
            default_thread: default_thread(),
            clarification: ClarificationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Clarifying questions allowed per thread
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// What to do when the classifier fails
    #[serde(default)]
    pub policy: ClarifyPolicy,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            policy: ClarifyPolicy::default(),
        }
    }
}

/// Behavior of the clarification gate when the classifier errors or
/// returns empty text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarifyPolicy {
    /// Treat the failure as `CLEAR` and proceed.
    #[default]
    FailOpen,
    /// Retry once, then ask the default clarifying question.
    FailClosed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Print the state keys each node touched
    #[serde(default)]
    pub show_payload: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_payload: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Page text is truncated to this many characters
    #[serde(default = "default_fetch_max_chars")]
    pub fetch_max_chars: usize,

    /// Directory holding the conference reference data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_search_max_results() -> usize {
    5
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_fetch_max_chars() -> usize {
    20_000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_max_results: default_search_max_results(),
            fetch_timeout_secs: default_fetch_timeout(),
            fetch_max_chars: default_fetch_max_chars(),
            data_dir: default_data_dir(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.sleuth/config.toml).
    ///
    /// Environment overrides:
    /// - `SLEUTH_API_KEY`, then `OPENAI_API_KEY` (only if no key is configured)
    /// - `SLEUTH_BASE_URL`
    /// - `SLEUTH_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("SLEUTH_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(url) = var("SLEUTH_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(model) = var("SLEUTH_MODEL") {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sleuth")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.step_limit < 2 {
            return Err(ConfigError::ValidationError(
                "agent.step_limit must be at least 2 (clarify + agent)".into(),
            ));
        }

        if self.agent.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_window must be > 0".into(),
            ));
        }

        if self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.tool_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            trace: TraceConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
