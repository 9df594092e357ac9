use std::time::Duration;

use netx_domain::{ChatCompletion, Context, Error, ModelId, Result};

use crate::{ChatProvider, OllamaProvider, OpenAiProvider, ProviderEndpoint, ProviderKind};

/// Provider client picked by the kind of endpoint it talks to.
#[derive(Clone, Debug)]
pub enum Client {
    OpenAiCompat(OpenAiProvider),
    Ollama(OllamaProvider),
}

impl Client {
    pub fn new(endpoint: ProviderEndpoint, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(match endpoint.kind {
            ProviderKind::Gemini | ProviderKind::Groq => {
                Client::OpenAiCompat(OpenAiProvider::new(endpoint, http))
            }
            ProviderKind::Ollama => Client::Ollama(OllamaProvider::new(endpoint, http)),
        })
    }
}

#[async_trait::async_trait]
impl ChatProvider for Client {
    async fn chat(&self, model: &ModelId, context: &Context) -> Result<ChatCompletion> {
        match self {
            Client::OpenAiCompat(provider) => provider.chat(model, context).await,
            Client::Ollama(provider) => provider.chat(model, context).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_kind() {
        let endpoint = ProviderEndpoint::new(ProviderKind::Ollama, "http://localhost:11434", None)
            .unwrap();
        let actual = Client::new(endpoint, Duration::from_secs(5)).unwrap();
        assert!(matches!(actual, Client::Ollama(_)));

        let endpoint =
            ProviderEndpoint::new(ProviderKind::Gemini, "http://localhost:1", Some("k".into()))
                .unwrap();
        let actual = Client::new(endpoint, Duration::from_secs(5)).unwrap();
        assert!(matches!(actual, Client::OpenAiCompat(_)));
    }
}
