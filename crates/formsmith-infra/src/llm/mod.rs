//! LLM provider implementations.
//!
//! Contains concrete implementations of the [`LlmProvider`] trait defined in
//! `formsmith-core`, a provider factory ([`create_provider`]) that constructs
//! the right provider from a [`ProviderConfig`], and [`build_registry`] which
//! turns the whole `[[providers]]` list into a [`ProviderRegistry`].
//!
//! [`LlmProvider`]: formsmith_core::llm::provider::LlmProvider

pub mod anthropic;
pub mod http;
pub mod ndjson;
pub mod openai_compat;

use secrecy::SecretString;

use formsmith_core::llm::box_provider::BoxLlmProvider;
use formsmith_core::llm::registry::ProviderRegistry;
use formsmith_types::config::{PipelineConfig, ProviderConfig};
use formsmith_types::error::ProviderError;
use formsmith_types::llm::{CompletionRequest, ProviderType};

use self::anthropic::AnthropicProvider;
use self::ndjson::NdjsonProvider;
use self::openai_compat::config::OpenAiCompatConfig;
use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxLlmProvider`] from a [`ProviderConfig`].
///
/// A missing `api_key` does not fail: the provider is built unconfigured and
/// the cascade records it as skipped.
pub fn create_provider(
    config: &ProviderConfig,
    api_key: Option<SecretString>,
) -> Result<BoxLlmProvider, ProviderError> {
    let provider = match config.provider_type {
        ProviderType::Anthropic => {
            let mut provider = AnthropicProvider::new(&config.name, &config.model, api_key)?
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            BoxLlmProvider::new(provider)
        }
        ProviderType::OpenAiCompatible => {
            let mut oai_config = OpenAiCompatConfig::resolve(
                &config.name,
                &config.model,
                config.base_url.as_deref(),
                api_key,
            );
            oai_config.temperature = config.temperature;
            BoxLlmProvider::new(OpenAiCompatibleProvider::new(oai_config))
        }
        ProviderType::Ndjson => {
            let mut provider = NdjsonProvider::new(&config.name, &config.model)?
                .with_temperature(config.temperature);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url);
            }
            BoxLlmProvider::new(provider)
        }
    };
    Ok(provider)
}

/// Read the API key for a provider from the environment variable it names.
pub fn api_key_from_env(config: &ProviderConfig) -> Option<SecretString> {
    let var = config.api_key_env.as_deref()?;
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value.trim().to_string())),
        _ => {
            tracing::debug!(provider = %config.name, env = %var, "API key variable not set");
            None
        }
    }
}

/// Build a registry from every enabled provider in the config.
///
/// Providers that fail to build are logged and left out; the cascade then
/// records them as skipped.
pub fn build_registry(config: &PipelineConfig) -> ProviderRegistry {
    build_registry_with(config, api_key_from_env)
}

/// [`build_registry`] with an explicit key lookup.
pub fn build_registry_with<F>(config: &PipelineConfig, mut key_for: F) -> ProviderRegistry
where
    F: FnMut(&ProviderConfig) -> Option<SecretString>,
{
    let mut registry = ProviderRegistry::new();
    for provider_config in config.providers.iter().filter(|p| p.enabled) {
        match create_provider(provider_config, key_for(provider_config)) {
            Ok(provider) => {
                tracing::debug!(
                    provider = %provider_config.name,
                    provider_type = %provider_config.provider_type,
                    configured = provider.is_configured(),
                    "registered provider"
                );
                registry.register(provider_config.name.clone(), provider);
            }
            Err(e) => {
                tracing::warn!(provider = %provider_config.name, error = %e, "failed to build provider");
            }
        }
    }
    registry
}

/// Test provider connectivity by sending a minimal completion request.
pub async fn test_provider_connection(provider: &BoxLlmProvider) -> Result<(), ProviderError> {
    let mut request = CompletionRequest::from_prompts("", "Reply with {}", 10);
    request.temperature = Some(0.0);
    provider.complete(&request).await?;
    Ok(())
}
