use netx_domain::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::ProviderKind;

const ERROR_BODY_LIMIT: usize = 300;

/// Sends one JSON POST and decodes the reply. Non-2xx statuses, transport
/// failures and undecodable bodies all surface as provider errors.
pub(crate) async fn post_json<Req: Serialize, Res: DeserializeOwned>(
    client: &Client,
    kind: ProviderKind,
    url: &Url,
    api_key: Option<&str>,
    body: &Req,
) -> Result<Res> {
    info!(url = %url, provider = %kind, "Connecting Upstream");

    let mut request = client.post(url.clone()).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|err| Error::provider(kind, format_http_context(None, "POST", url, err)))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| Error::provider(kind, format_http_context(Some(status), "POST", url, err)))?;

    if !status.is_success() {
        let message = error_message(&text);
        debug!(status = %status, body = %text, "Upstream returned an error");
        return Err(Error::provider(
            kind,
            format_http_context(Some(status), "POST", url, message),
        ));
    }

    serde_json::from_str(&text).map_err(|err| {
        Error::provider(kind, format!("failed to decode response from {url}: {err}"))
    })
}

fn format_http_context(
    status: Option<reqwest::StatusCode>,
    method: &str,
    url: &Url,
    detail: impl std::fmt::Display,
) -> String {
    match status {
        Some(status) => format!("{status} {method} {url}: {detail}"),
        None => format!("{method} {url}: {detail}"),
    }
}

/// Pulls the human readable part out of an error body. Understands the
/// `{"error": {"message": ..}}` and `{"error": ".."}` shapes.
fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        let error = value.get("error")?;
        error
            .get("message")
            .and_then(|message| message.as_str())
            .or_else(|| error.as_str())
            .map(str::to_string)
    });

    message.unwrap_or_else(|| {
        let trimmed = body.trim();
        match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
            Some((index, _)) => format!("{}...", &trimmed[..index]),
            None => trimmed.to_string(),
        }
    })
}
