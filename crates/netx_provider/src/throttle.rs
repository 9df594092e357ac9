use std::sync::Arc;
use std::time::Duration;

use netx_domain::{ChatCompletion, Context, ModelId, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{ChatProvider, ProviderKind};

/// Enforces a minimum spacing between the starts of consecutive calls.
/// Shared by every adapter that talks to the same provider.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_call: Mutex::new(None) }
    }

    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                let pause = self.interval - elapsed;
                debug!(pause_ms = pause.as_millis() as u64, "Throttling provider call");
                tokio::time::sleep(pause).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Per-provider spacing in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub gemini: u64,
    pub groq: u64,
    pub ollama: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        let ms = |kind: ProviderKind| kind.default_delay().as_millis() as u64;
        Self {
            gemini: ms(ProviderKind::Gemini),
            groq: ms(ProviderKind::Groq),
            ollama: ms(ProviderKind::Ollama),
        }
    }
}

impl ThrottleConfig {
    pub fn interval(&self, kind: ProviderKind) -> Duration {
        Duration::from_millis(match kind {
            ProviderKind::Gemini => self.gemini,
            ProviderKind::Groq => self.groq,
            ProviderKind::Ollama => self.ollama,
        })
    }
}

/// A provider whose calls pass through a shared [`Throttle`] first.
#[derive(Clone, Debug)]
pub struct Throttled<P> {
    inner: P,
    throttle: Arc<Throttle>,
}

impl<P> Throttled<P> {
    pub fn new(inner: P, throttle: Arc<Throttle>) -> Self {
        Self { inner, throttle }
    }
}

#[async_trait::async_trait]
impl<P: ChatProvider> ChatProvider for Throttled<P> {
    async fn chat(&self, model: &ModelId, context: &Context) -> Result<ChatCompletion> {
        self.throttle.wait().await;
        self.inner.chat(model, context).await
    }
}
