//! Shared HTTP plumbing for provider clients

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::cache::FetchError;

/// Upper bound on any single upstream request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the HTTP client shared by every provider
pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("lcp/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Sends a request and decodes a successful JSON response
///
/// Non-2xx statuses become [`FetchError::Status`]; a 2xx body that fails to
/// parse becomes [`FetchError::ParseError`].
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
    let response = request.send().await?;
    let response = ensure_success(response)?;
    let body = response.text().await?;
    parse_body(&body)
}

/// Rejects non-2xx responses
pub fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status {
            status: status.as_u16(),
            url: redacted_url(&response),
        })
    }
}

/// Parses a JSON body, logging it at debug level if it doesn't match
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::debug!(body = %body, "unexpected response body");
        FetchError::from(e)
    })
}

/// The response URL without its query string, which may carry API keys
pub(crate) fn redacted_url(response: &Response) -> String {
    let mut url = response.url().clone();
    url.set_query(None);
    url.to_string()
}
