//! Provider registry for runtime provider lookup.
//!
//! Names in a `GenerationRequest` resolve against this registry. A name can
//! be missing, registered without a credential, or ready to call.

use std::collections::HashMap;

use super::box_provider::BoxLlmProvider;

/// Result of resolving one provider name.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    Ready(&'a BoxLlmProvider),
    /// Registered, but the credential is missing.
    Unconfigured,
    /// No client registered under this name.
    Missing,
}

impl Lookup<'_> {
    /// Reason recorded in the attempt log when the provider is skipped.
    pub fn skip_reason(&self) -> Option<&'static str> {
        match self {
            Lookup::Ready(_) => None,
            Lookup::Unconfigured => Some("missing credential"),
            Lookup::Missing => Some("no registered client"),
        }
    }
}

/// Registry of available LLM providers, indexed by name.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, BoxLlmProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under the given name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, provider: BoxLlmProvider) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&BoxLlmProvider> {
        self.providers.get(name)
    }

    /// Resolve a name for the cascade.
    pub fn lookup(&self, name: &str) -> Lookup<'_> {
        match self.providers.get(name) {
            Some(provider) if provider.is_configured() => Lookup::Ready(provider),
            Some(_) => Lookup::Unconfigured,
            None => Lookup::Missing,
        }
    }

    /// Registered names, sorted.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
