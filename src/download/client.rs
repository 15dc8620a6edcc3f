//! HTTP transport used by the download pipeline.
//!
//! The pipeline only needs "GET a URL, get back a status, headers and a byte
//! stream", expressed as the [`Transport`] trait. [`HttpClient`] is the
//! reqwest-backed default; tests and embedders can plug in their own.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Error type transports report failures with.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Response body as a stream of chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// What a transport hands back for a GET request.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body length as the transport understood it, when trustworthy.
    pub content_length: Option<u64>,
    /// Response body.
    pub body: BodyStream,
}

impl TransportResponse {
    /// Returns true for 2xx status codes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the `Content-Type` header, if it is valid text.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Anything that can perform a GET request and stream the body back.
///
/// Non-success status codes are *not* errors at this level; the pipeline
/// classifies them. `Err` means the request never produced a response.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed [`Transport`].
///
/// Created once and shared across workers to reuse pooled connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default timeouts (30s connect, 5min read).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. Use [`HttpClient::try_new`] to handle that case.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::try_new().expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend or system configuration
    /// can't be initialised.
    pub fn try_new() -> Result<Self, reqwest::Error> {
        Self::with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the client can't be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .user_agent(concat!("dlfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an already configured reqwest client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url).send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let content_length = response.content_length();
        debug!(status, ?content_length, "received response headers");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed();

        Ok(TransportResponse {
            status,
            headers,
            content_length,
            body,
        })
    }
}
