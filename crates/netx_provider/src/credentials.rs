use netx_domain::{Error, Result};
use url::Url;

use crate::ProviderKind;

/// Where and how to reach one provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoint {
    pub kind: ProviderKind,
    /// Always ends with a slash so relative paths can be joined onto it.
    pub base_url: Url,
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(kind: ProviderKind, base_url: &str, api_key: Option<String>) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|err| {
            Error::Config(format!("invalid base URL '{base_url}' for {kind}: {err}"))
        })?;
        Ok(Self { kind, base_url, api_key })
    }

    /// Resolves the endpoint from environment variables. Hosted providers
    /// without an API key fail here, before any request is made.
    pub fn from_env(kind: ProviderKind) -> Result<Self> {
        Self::resolve(kind, |name| std::env::var(name).ok())
    }

    pub fn resolve(kind: ProviderKind, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = match kind.api_key_var() {
            Some(var) => Some(value(var).ok_or_else(|| {
                Error::Config(format!("environment variable {var} is required for {kind} models"))
            })?),
            None => None,
        };

        let base_url = value(kind.base_url_var())
            .map(|url| {
                if kind == ProviderKind::Ollama && !url.contains("://") {
                    format!("http://{url}")
                } else {
                    url
                }
            })
            .unwrap_or_else(|| kind.default_base_url().to_string());

        Self::new(kind, &base_url, api_key)
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|err| {
            Error::provider(self.kind, format!("failed to append {path} to {}: {err}", self.base_url))
        })
    }
}
