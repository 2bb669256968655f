//! Provider selection from configuration.

use sleuth_config::AppConfig;
use sleuth_core::error::ProviderError;
use sleuth_core::provider::Provider;
use std::sync::Arc;
use tracing::info;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the reasoning model from configuration.
///
/// `base_url` wins over the provider's well-known URL. A missing API key is
/// only tolerated for local endpoints.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = config
        .base_url
        .clone()
        .or_else(|| default_base_url(&config.provider))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no base_url configured for provider '{}'",
                config.provider
            ))
        })?;

    let api_key = match &config.api_key {
        Some(key) => key.clone(),
        None if is_local(&base_url) => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(
                "no API key; set api_key in config.toml or SLEUTH_API_KEY".into(),
            ));
        }
    };

    info!(provider = %config.provider, base_url = %base_url, model = %config.model, "Using provider");
    let provider = OpenAiCompatProvider::new(&config.provider, &base_url, &api_key)?;
    Ok(Arc::new(provider))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.into())
}

fn is_local(base_url: &str) -> bool {
    base_url.contains("://localhost") || base_url.contains("://127.0.0.1")
}
