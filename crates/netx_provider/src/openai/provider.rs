use netx_domain::{ChatCompletion, Context, Error, ModelId, Result};
use reqwest::Client;

use super::request::Request;
use super::response::Response;
use crate::http::post_json;
use crate::{ChatProvider, ProviderEndpoint};

/// Speaks the OpenAI chat-completions protocol. Used for Gemini and Groq,
/// which both expose a compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiProvider {
    endpoint: ProviderEndpoint,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(endpoint: ProviderEndpoint, client: Client) -> Self {
        Self { endpoint, client }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat(&self, model: &ModelId, context: &Context) -> Result<ChatCompletion> {
        let url = self.endpoint.url("chat/completions")?;
        let request = Request::new(model, context);
        let response: Response = post_json(
            &self.client,
            self.endpoint.kind,
            &url,
            self.endpoint.api_key.as_deref(),
            &request,
        )
        .await?;

        response
            .into_completion()
            .ok_or_else(|| Error::provider(self.endpoint.kind, format!("{model} returned no choices")))
    }
}
