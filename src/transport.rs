//! HTTP round-trip abstraction and the default `reqwest` transport.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, TryStreamExt, stream};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::config::TransportConfig;
use crate::error::{Result, TosError};

/// A streaming response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A fully prepared request: signed, with every header in place.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A response whose body has not been read yet.
///
/// Dropping the response releases the body and its connection.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: BodyStream,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response with an in-memory body.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self::new(status, headers, Box::pin(stream::once(async move { Ok::<_, TosError>(body) })))
    }

    /// Returns a header value if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn into_body(self) -> BodyStream {
        self.body
    }

    /// Reads the remaining body to the end.
    pub async fn bytes(self) -> Result<Bytes> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes prepared requests.
///
/// A transport does not retry, sign, or interpret status codes. It is
/// shared by every client built from a session and must be safe for
/// concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// The default transport: pooled HTTP/1.1 keep-alive connections over
/// `reqwest` with rustls and host verification.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .http1_only()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);

        if let Some(keepalive) = config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        let http = builder.build().map_err(|e| {
            TosError::InvalidArgument(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { http })
    }
}

/// Maps a `reqwest` failure onto [`TosError::Network`].
///
/// Connect and read timeouts belong to the transport, not to the caller's
/// deadline, so they stay network errors. A connect timeout keeps
/// `connect: true` and is retried like a refused connection.
pub(crate) fn map_reqwest_error(e: reqwest::Error) -> TosError {
    TosError::Network {
        message: e.to_string(),
        connect: e.is_connect(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(map_reqwest_error);
        Ok(HttpResponse::new(status, headers, Box::pin(body)))
    }
}
