mod adapter;
mod calculator;
mod client;
mod credentials;
mod http;
mod ollama;
mod openai;
mod prompts;
mod provider;
mod registry;
mod throttle;

pub use adapter::*;
pub use calculator::*;
pub use client::*;
pub use credentials::*;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::*;
pub use registry::*;
pub use throttle::*;
