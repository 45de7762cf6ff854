// src/provider/registry.rs — Provider lookup by id, built from config + env

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use super::openai_compat::OpenAICompatProvider;
use super::retry::RetryProvider;
use super::ModelProvider;
use crate::infra::config::{Config, ProviderEntry};
use crate::infra::errors::GoalForgeError;

/// Built-in endpoints used when the config declares no `[[providers]]`.
/// (id, display name, base url, api key env var)
const DEFAULT_ENDPOINTS: &[(&str, &str, &str, &str)] = &[
    ("openai", "OpenAI", "https://api.openai.com/v1", "OPENAI_API_KEY"),
    ("anthropic", "Anthropic", "https://api.anthropic.com/v1", "ANTHROPIC_API_KEY"),
    (
        "google",
        "Google Gemini",
        "https://generativelanguage.googleapis.com/v1beta/openai",
        "GEMINI_API_KEY",
    ),
    ("groq", "Groq", "https://api.groq.com/openai/v1", "GROQ_API_KEY"),
    ("ollama", "Ollama", "http://localhost:11434/v1", ""),
];

/// All providers available to one process, keyed by provider id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, provider_id: &str) -> Result<Arc<dyn ModelProvider>, GoalForgeError> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| GoalForgeError::UnknownProvider {
                provider: provider_id.to_string(),
            })
    }

    pub fn contains(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id)
    }

    /// Sorted provider ids.
    pub fn ids(&self) -> BTreeSet<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build the registry from config, resolving API keys from the environment.
    ///
    /// Every provider is wrapped in a `RetryProvider`.
    pub fn from_config(config: &Config) -> Self {
        let entries: Vec<ProviderEntry> = if config.providers.is_empty() {
            DEFAULT_ENDPOINTS
                .iter()
                .map(|(id, name, url, env)| ProviderEntry {
                    id: id.to_string(),
                    name: Some(name.to_string()),
                    base_url: url.to_string(),
                    api_key_env: env.to_string(),
                    timeout_secs: 60,
                })
                .collect()
        } else {
            config.providers.clone()
        };

        let mut registry = Self::new();
        for entry in entries {
            let api_key = if entry.api_key_env.is_empty() {
                None
            } else {
                match std::env::var(&entry.api_key_env) {
                    Ok(key) if !key.trim().is_empty() => Some(key),
                    _ => {
                        tracing::debug!(
                            provider = %entry.id,
                            env = %entry.api_key_env,
                            "Skipping provider without API key"
                        );
                        continue;
                    }
                }
            };

            let name = entry.name.clone().unwrap_or_else(|| entry.id.clone());
            let inner: Arc<dyn ModelProvider> = Arc::new(OpenAICompatProvider::new(
                entry.id.clone(),
                name,
                api_key,
                entry.base_url.clone(),
                Duration::from_secs(entry.timeout_secs),
            ));
            registry.register(Arc::new(RetryProvider::new(inner)));
            tracing::debug!(provider = %entry.id, "Registered provider");
        }
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::ProviderEntry;

    #[test]
    fn test_unknown_provider_error() {
        let r = ProviderRegistry::new();
        let err = r.get("openai").err().unwrap();
        assert!(matches!(err, GoalForgeError::UnknownProvider { .. }));
    }

    #[test]
    fn test_keyless_provider_is_registered() {
        let config = Config {
            providers: vec![ProviderEntry {
                id: "local".into(),
                name: None,
                base_url: "http://localhost:8080/v1".into(),
                api_key_env: String::new(),
                timeout_secs: 5,
            }],
            ..Default::default()
        };
        let r = ProviderRegistry::from_config(&config);
        assert!(r.contains("local"));
        assert_eq!(r.get("local").unwrap().name(), "local");
    }

    #[test]
    fn test_provider_with_missing_key_is_skipped() {
        let config = Config {
            providers: vec![ProviderEntry {
                id: "ghost".into(),
                name: Some("Ghost".into()),
                base_url: "https://example.invalid/v1".into(),
                api_key_env: "GOALFORGE_TEST_KEY_THAT_IS_NEVER_SET".into(),
                timeout_secs: 5,
            }],
            ..Default::default()
        };
        let r = ProviderRegistry::from_config(&config);
        assert!(r.is_empty());
    }
}
