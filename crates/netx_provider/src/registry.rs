use std::time::Duration;

use lazy_static::lazy_static;
use netx_domain::{ContextWindow, Error, ModelId, Result};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini through its OpenAI-compatible endpoint.
    Gemini,
    Groq,
    /// Locally hosted models.
    Ollama,
}

impl ProviderKind {
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Gemini => Some("GOOGLE_API_KEY"),
            ProviderKind::Groq => Some("GROQ_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn base_url_var(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "NETX_GEMINI_URL",
            ProviderKind::Groq => "NETX_GROQ_URL",
            ProviderKind::Ollama => "OLLAMA_HOST",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai/",
            ProviderKind::Groq => "https://api.groq.com/openai/v1/",
            ProviderKind::Ollama => "http://localhost:11434/",
        }
    }

    /// Minimum spacing between two calls to the same provider.
    pub fn default_delay(&self) -> Duration {
        match self {
            ProviderKind::Gemini => Duration::from_millis(4000),
            ProviderKind::Groq => Duration::from_millis(2000),
            ProviderKind::Ollama => Duration::from_millis(1500),
        }
    }
}

/// A model that can be evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: ModelId,
    pub provider: ProviderKind,
    pub window: ContextWindow,
    /// Name the provider knows the model by.
    pub remote_name: &'static str,
}

impl ModelSpec {
    fn new(
        id: &str,
        provider: ProviderKind,
        window: ContextWindow,
        remote_name: &'static str,
    ) -> Self {
        Self { id: ModelId::new(id), provider, window, remote_name }
    }

    pub fn remote_id(&self) -> ModelId {
        ModelId::new(self.remote_name)
    }
}

lazy_static! {
    static ref MODELS: Vec<ModelSpec> = vec![
        ModelSpec::new("gemini-2.0-flash", ProviderKind::Gemini, ContextWindow::Big, "gemini-2.0-flash"),
        ModelSpec::new(
            "gemini-2.0-flash-lite",
            ProviderKind::Gemini,
            ContextWindow::Big,
            "gemini-2.0-flash-lite"
        ),
        ModelSpec::new("llama3-8b-8192", ProviderKind::Groq, ContextWindow::Small, "llama3-8b-8192"),
        ModelSpec::new(
            "llama-3.3-70b-versatile",
            ProviderKind::Groq,
            ContextWindow::Small,
            "llama-3.3-70b-versatile"
        ),
        ModelSpec::new("mistral-7b", ProviderKind::Ollama, ContextWindow::Small, "mistral:7b"),
        ModelSpec::new("qwen2.5-7b", ProviderKind::Ollama, ContextWindow::Small, "qwen2.5:7b"),
    ];
}

/// The fixed set of models known to the harness.
pub struct ModelRegistry;

impl ModelRegistry {
    pub fn all() -> &'static [ModelSpec] {
        &MODELS
    }

    pub fn lookup(id: &ModelId) -> Result<&'static ModelSpec> {
        MODELS.iter().find(|spec| &spec.id == id).ok_or_else(|| {
            let known = MODELS.iter().map(|spec| spec.id.as_str()).collect::<Vec<_>>().join(", ");
            Error::Config(format!("unknown model '{id}', expected one of: {known}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_lookup_known_models() {
        let actual = ModelRegistry::lookup(&ModelId::new("llama3-8b-8192")).unwrap();
        assert_eq!(actual.provider, ProviderKind::Groq);
        assert_eq!(actual.window, ContextWindow::Small);

        let actual = ModelRegistry::lookup(&ModelId::new("gemini-2.0-flash")).unwrap();
        assert_eq!(actual.window, ContextWindow::Big);
    }

    #[test]
    fn test_ollama_models_use_tagged_names() {
        let actual = ModelRegistry::lookup(&ModelId::new("mistral-7b")).unwrap().remote_id();
        let expected = ModelId::new("mistral:7b");
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_unknown_model_is_config_error() {
        let actual = ModelRegistry::lookup(&ModelId::new("gpt-2")).unwrap_err();
        assert!(matches!(actual, Error::Config(message) if message.contains("gpt-2")));
    }

    #[test]
    fn test_registry_ids_are_unique() {
        let mut ids = ModelRegistry::all().iter().map(|spec| spec.id.clone()).collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ModelRegistry::all().len());
    }
}
