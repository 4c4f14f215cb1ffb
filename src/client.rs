//! HTTP client for upstream platform APIs
//!
//! A thin wrapper over reqwest with the defaults every adapter needs: a
//! browser-like User-Agent, a hard total timeout, and status-code checking.
//! Response bodies are accumulated into pooled buffers to keep per-request
//! allocation flat under load.
//!
//! One instance is constructed at the composition root and injected into the
//! fetch context; adapters never build their own clients.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::pool::ObjectPools;

/// Default total timeout for one upstream request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared HTTP client for all platform adapters.
pub struct HttpClient {
    client: reqwest::Client,
    pools: Arc<ObjectPools>,
}

impl HttpClient {
    /// Build a client with the default timeout.
    pub fn new(pools: Arc<ObjectPools>) -> Result<Self> {
        Self::with_timeout(pools, DEFAULT_TIMEOUT)
    }

    /// Build a client with a custom total timeout.
    pub fn with_timeout(pools: Arc<ObjectPools>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(DEFAULT_USER_AGENT),
        );
        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()?;

        Ok(Self { client, pools })
    }

    /// GET a URL and return the body bytes.
    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Bytes> {
        let request = self.client.get(url).headers(build_headers(headers)?);
        self.execute(url, request).await
    }

    /// POST a JSON body and return the response bytes.
    pub async fn post<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> Result<Bytes> {
        let request = self
            .client
            .post(url)
            .headers(build_headers(headers)?)
            .json(body);
        self.execute(url, request).await
    }

    /// GET a URL and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.get(url, headers).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn execute(&self, url: &str, request: reqwest::RequestBuilder) -> Result<Bytes> {
        debug!(url, "issuing upstream request");
        let mut response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        // Accumulate the body into a pooled buffer, then copy out the exact
        // bytes so the buffer's capacity survives for the next request.
        let mut buf = self.pools.acquire_buffer();
        while let Some(chunk) = response.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        let body = Bytes::copy_from_slice(&buf);
        self.pools.release_buffer(buf);

        debug!(url, status = status.as_u16(), bytes = body.len(), "upstream response");
        Ok(body)
    }
}

fn build_headers(headers: &[(&str, &str)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Internal(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Internal(format!("invalid header value for {name:?}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

// =============================================================================
// Tests
// =============================================================================
