use std::sync::Arc;

use netx_domain::{ChatCompletion, Context, ModelId, Result};

/// A chat-completion backend. Implementations perform exactly one request
/// per call and never retry.
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, model: &ModelId, context: &Context) -> Result<ChatCompletion>;
}

#[async_trait::async_trait]
impl<T: ChatProvider + ?Sized> ChatProvider for Arc<T> {
    async fn chat(&self, model: &ModelId, context: &Context) -> Result<ChatCompletion> {
        self.as_ref().chat(model, context).await
    }
}
