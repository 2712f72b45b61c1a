//! Shared HTTP transport for provider adapters.
//!
//! `HttpProvider` wraps a `reqwest::Client` with pre-configured headers and
//! endpoint URL. Provides `send()` for single-shot calls and `post_stream()`
//! for streaming bodies; both map failures onto the shared error taxonomy.

use kcore::{Error, Result};
use reqwest::{
    Client, Method, Response,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};

/// Map a reqwest failure to a transport error.
pub fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

fn header_value(value: &str) -> Result<HeaderValue> {
    value
        .parse::<HeaderValue>()
        .map_err(|e| Error::Config(format!("invalid header value: {e}")))
}

/// Shared HTTP transport.
///
/// Holds a `reqwest::Client`, pre-built headers (auth + content-type),
/// and the target endpoint URL.
#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    headers: HeaderMap,
    endpoint: String,
}

impl HttpProvider {
    /// Create a provider with Bearer token authentication.
    pub fn bearer(client: Client, key: &str, endpoint: &str) -> Result<Self> {
        let mut headers = json_headers();
        headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {key}"))?);
        Ok(Self {
            client,
            headers,
            endpoint: endpoint.to_owned(),
        })
    }

    /// Create a provider without authentication (e.g. Ollama).
    pub fn no_auth(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            headers: json_headers(),
            endpoint: endpoint.to_owned(),
        }
    }

    /// Create a provider with a custom header for authentication.
    ///
    /// Used by providers that don't use Bearer tokens (e.g. Anthropic
    /// uses `x-api-key`, Gemini uses `x-goog-api-key`).
    pub fn custom_header(
        client: Client,
        header_name: &str,
        header_value: &str,
        endpoint: &str,
    ) -> Result<Self> {
        Self::no_auth(client, endpoint).with_header(header_name, header_value)
    }

    /// Add an extra header to every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = name
            .parse::<HeaderName>()
            .map_err(|e| Error::Config(format!("invalid header name: {e}")))?;
        self.headers.insert(name, header_value(value)?);
        Ok(self)
    }

    /// Point the transport at a different endpoint, keeping its headers.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_owned();
        self
    }

    /// POST `body` to the endpoint and decode the JSON response.
    pub async fn send<T: DeserializeOwned>(&self, body: &impl Serialize, context: &str) -> Result<T> {
        self.send_to(&self.endpoint, body, context).await
    }

    /// POST `body` to `url` and decode the JSON response.
    pub async fn send_to<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &impl Serialize,
        context: &str,
    ) -> Result<T> {
        let response = self.post(url, body).await?;
        let text = response.text().await.map_err(transport)?;
        tracing::trace!("response: {text}");
        serde_json::from_str(&text).map_err(|e| Error::decode(context, e))
    }

    /// POST `body` to the endpoint and return the streaming response.
    ///
    /// The status is checked before any of the body is read.
    pub async fn post_stream(&self, body: &impl Serialize) -> Result<Response> {
        self.post(&self.endpoint, body).await
    }

    async fn post(&self, url: &str, body: &impl Serialize) -> Result<Response> {
        if let Ok(body) = serde_json::to_string(body) {
            tracing::trace!("request: {body}");
        }
        let response = self
            .client
            .request(Method::POST, url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("backend returned {status}: {body}");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Get the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
