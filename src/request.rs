//! Operation descriptions and their translation into HTTP requests.

use std::sync::OnceLock;

use bytes::Bytes;
use regex::Regex;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HOST, USER_AGENT};

use crate::config::ClientConfig;
use crate::error::{Result, TosError};
use crate::exec::{HEADER_CRC64, crc64_ecma};
use crate::sign::{HEADER_CONTENT_SHA256, UNSIGNED_PAYLOAD, percent_encode_path, set_header};
use crate::transport::HttpRequest;

/// Cached regex for bucket name validation.
///
/// 3-63 characters of lowercase letters, digits and `-`, not starting or
/// ending with `-`.
static BUCKET_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn bucket_name_regex() -> &'static Regex {
    BUCKET_NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9-]{1,61}[a-z0-9]$").expect("Invalid BUCKET_NAME_REGEX pattern")
    })
}

fn validate_bucket(bucket: &str) -> Result<()> {
    if !bucket_name_regex().is_match(bucket) {
        return Err(TosError::InvalidArgument(format!(
            "Invalid bucket name '{}'. Expected 3-63 lowercase letters, digits or '-', not starting or ending with '-'",
            bucket
        )));
    }
    Ok(())
}

/// A service operation before it is addressed and signed.
///
/// Verbs on [`crate::Client`] build these; callers may build their own for
/// operations the client has no verb for and run them through
/// [`crate::Client::execute`].
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub method: Method,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Sign with `UNSIGNED-PAYLOAD` instead of hashing the body.
    pub unsigned_payload: bool,
}

impl OperationRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            unsigned_payload: false,
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Appends a query parameter; an empty value renders as `name=`.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_unsigned_payload(mut self, unsigned: bool) -> Self {
        self.unsigned_payload = unsigned;
        self
    }

    /// Returns true if a header with this name (case-insensitive) was set.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// Addresses `op` against the configured endpoint and fills in the
/// unsigned headers.
///
/// Buckets are virtual-hosted (`bucket.host/key`) unless the client is
/// path-style (`host/bucket/key`). The path is written percent-encoded so
/// the signer can use it verbatim.
pub(crate) fn build_http_request(config: &ClientConfig, op: &OperationRequest) -> Result<HttpRequest> {
    let mut url = config.endpoint.clone();

    let mut path = String::from("/");
    match (&op.bucket, &op.key) {
        (Some(bucket), key) => {
            validate_bucket(bucket)?;
            if config.path_style {
                path.push_str(bucket);
                path.push('/');
            } else {
                let host = url
                    .host_str()
                    .ok_or_else(|| TosError::invalid_endpoint(config.endpoint.as_str(), "endpoint has no host"))?;
                let virtual_host = format!("{}.{}", bucket, host);
                url.set_host(Some(&virtual_host))
                    .map_err(|e| TosError::invalid_endpoint(&virtual_host, e))?;
            }
            if let Some(key) = key {
                if key.is_empty() {
                    return Err(TosError::InvalidArgument("object key must not be empty".into()));
                }
                path.push_str(&percent_encode_path(key));
            }
        }
        (None, Some(_)) => {
            return Err(TosError::InvalidArgument("object key given without a bucket".into()));
        }
        (None, None) => {}
    }
    url.set_path(&path);

    if !op.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &op.query {
            pairs.append_pair(name, value);
        }
    }

    let mut request = HttpRequest::new(op.method.clone(), url);
    for (name, value) in &op.headers {
        set_header(&mut request.headers, &name.to_ascii_lowercase(), value)?;
    }

    let host = match request.url.port() {
        Some(port) => format!("{}:{}", request.url.host_str().unwrap_or_default(), port),
        None => request.url.host_str().unwrap_or_default().to_string(),
    };
    set_header(&mut request.headers, HOST.as_str(), &host)?;
    set_header(&mut request.headers, USER_AGENT.as_str(), &config.user_agent)?;

    if let Some(body) = &op.body {
        if config.enable_crc && !op.has_header(HEADER_CRC64) {
            set_header(&mut request.headers, HEADER_CRC64, &crc64_ecma(body).to_string())?;
        }
        if !request.headers.contains_key(CONTENT_TYPE) {
            set_header(&mut request.headers, CONTENT_TYPE.as_str(), "application/octet-stream")?;
        }
        request.body = Some(body.clone());
    }

    if op.unsigned_payload {
        set_header(&mut request.headers, HEADER_CONTENT_SHA256, UNSIGNED_PAYLOAD)?;
    }

    Ok(request)
}
