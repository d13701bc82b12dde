//! Async HTTP client wrapping reqwest.
//!
//! One attempt per request. A non-success status is returned to the caller
//! as data; only transport failures become errors here.

use crate::error::TrackResult;
use serde::Serialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("parcel-track/", env!("CARGO_PKG_VERSION"));

/// Response from a courier endpoint.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// HTTP client shared by the courier adapters.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// GET `url` with the given query parameters.
    pub async fn get(&self, url: &str, query: &[(&str, &str)]) -> TrackResult<HttpResponse> {
        tracing::debug!(url, ?query, "GET");
        let resp = self.client.get(url).query(query).send().await?;
        Self::into_response(resp).await
    }

    /// POST `body` as JSON to `url`.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> TrackResult<HttpResponse> {
        tracing::debug!(url, "POST");
        let resp = self.client.post(url).json(body).send().await?;
        Self::into_response(resp).await
    }

    async fn into_response(resp: reqwest::Response) -> TrackResult<HttpResponse> {
        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let body = resp.text().await?;
        Ok(HttpResponse { url, status, body })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(30_000)
    }
}
