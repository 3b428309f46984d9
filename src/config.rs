use std::time::Duration;

use url::{Host, Url};

use crate::error::{Result, TosError};

/// Default per-operation deadline when the caller's context has none.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound for retries of connection errors raised before sending.
pub const MAX_RETRY_COUNT: u32 = 5;

/// User agent prefix; a configured user agent is appended to it.
pub const DEFAULT_USER_AGENT: &str = concat!("tos-rust-sdk/", env!("CARGO_PKG_VERSION"));

/// Resolved, immutable configuration of a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) endpoint: Url,
    pub(crate) region: String,
    pub(crate) request_timeout: Duration,
    pub(crate) user_agent: String,
    pub(crate) enable_crc: bool,
    pub(crate) auto_recognize_content_type: bool,
    pub(crate) max_retry_count: u32,
    pub(crate) path_style: bool,
}

impl ClientConfig {
    /// The normalized endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Signing region; empty when neither configured nor derivable.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Full user agent sent with every request.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn enable_crc(&self) -> bool {
        self.enable_crc
    }

    pub fn auto_recognize_content_type(&self) -> bool {
        self.auto_recognize_content_type
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// Whether buckets are addressed as `host/bucket` instead of `bucket.host`.
    pub fn path_style(&self) -> bool {
        self.path_style
    }
}

/// Parses an endpoint into an absolute http(s) URL.
///
/// An endpoint without a scheme gets `https://` prepended.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(TosError::invalid_endpoint(endpoint, "endpoint is empty"));
    }

    let url = if endpoint.contains("://") {
        Url::parse(endpoint)
    } else {
        Url::parse(&format!("https://{}", endpoint))
    }
    .map_err(|e| TosError::invalid_endpoint(endpoint, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TosError::invalid_endpoint(
                endpoint,
                format!("unsupported scheme '{}'", other),
            ));
        }
    }
    if url.host().is_none() {
        return Err(TosError::invalid_endpoint(endpoint, "endpoint has no host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(TosError::invalid_endpoint(
            endpoint,
            "endpoint must not carry a query or fragment",
        ));
    }
    Ok(url)
}

/// Derives the region from a regional endpoint host such as
/// `tos-cn-beijing.volces.com` or `tos-s3-cn-beijing.ivolces.com`.
pub(crate) fn derive_region(endpoint: &Url) -> Option<String> {
    let Some(Host::Domain(domain)) = endpoint.host() else {
        return None;
    };
    let label = domain.split('.').next()?;
    let rest = label.strip_prefix("tos-")?;
    let region = rest.strip_prefix("s3-").unwrap_or(rest);
    (!region.is_empty()).then(|| region.to_string())
}

/// Returns true for IP and localhost endpoints, where `{bucket}.{host}`
/// would not resolve.
pub(crate) fn is_path_style_default(endpoint: &Url) -> bool {
    match endpoint.host() {
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        Some(Host::Domain(domain)) => domain == "localhost",
        None => false,
    }
}

/// Settings for the default [`crate::transport::HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Maximum idle time between reads of a response.
    pub read_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub tcp_keepalive: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(60),
            pool_max_idle_per_host: 32,
            tcp_keepalive: Some(Duration::from_secs(30)),
        }
    }
}

impl TransportConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    pub fn with_tcp_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.tcp_keepalive = keepalive;
        self
    }
}
