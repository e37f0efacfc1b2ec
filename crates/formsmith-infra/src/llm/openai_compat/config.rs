//! Configuration types and per-provider defaults for OpenAI-compatible providers.
//!
//! Each well-known provider that speaks the OpenAI chat completions protocol
//! gets a default base URL and output ceiling. Anything else needs an explicit
//! `base_url`.

use secrecy::SecretString;

use formsmith_types::llm::ProviderCapabilities;

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Name used in cascade lists and logs.
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    /// API key. `None` builds an unconfigured provider.
    pub api_key: Option<SecretString>,
    /// Model identifier (e.g., "gpt-4o", "gemini-2.5-pro").
    pub model: String,
    pub temperature: Option<f64>,
    pub capabilities: ProviderCapabilities,
}

/// A provider family with known endpoint defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownProvider {
    OpenAi,
    Gemini,
    Mistral,
}

impl KnownProvider {
    /// Match a configured provider name against the known families.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.starts_with("openai") || name.starts_with("gpt") {
            Some(Self::OpenAi)
        } else if name.starts_with("gemini") || name.starts_with("google") {
            Some(Self::Gemini)
        } else if name.starts_with("mistral") {
            Some(Self::Mistral)
        } else {
            None
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::Mistral => "https://api.mistral.ai/v1",
        }
    }

    pub fn capabilities(self) -> ProviderCapabilities {
        let max_output_tokens = match self {
            Self::OpenAi => 16_384,
            Self::Gemini => 65_536,
            Self::Mistral => 32_768,
        };
        ProviderCapabilities {
            streaming: true,
            max_output_tokens,
        }
    }
}

impl OpenAiCompatConfig {
    /// Resolve defaults for `name`, letting `base_url` override the endpoint.
    ///
    /// Unknown names without a base URL fall back to the OpenAI endpoint.
    pub fn resolve(
        name: &str,
        model: &str,
        base_url: Option<&str>,
        api_key: Option<SecretString>,
    ) -> Self {
        let known = KnownProvider::from_name(name);
        let base_url = match (base_url, known) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(known)) => known.base_url().to_string(),
            (None, None) => {
                tracing::warn!(provider = %name, "no base_url configured, using the OpenAI endpoint");
                KnownProvider::OpenAi.base_url().to_string()
            }
        };
        Self {
            provider_name: name.to_string(),
            base_url,
            api_key,
            model: model.to_string(),
            temperature: None,
            capabilities: known.map(KnownProvider::capabilities).unwrap_or_default(),
        }
    }
}
