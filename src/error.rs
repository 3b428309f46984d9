use thiserror::Error;

/// Maximum characters to include in error message body for debugging.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 200;

/// Coarse classification of a [`TosError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad endpoint, missing region, missing credentials, malformed input.
    ClientInvalidArgument,
    /// A body could not be encoded or decoded.
    ClientSerialization,
    /// Connection, TLS, DNS, or socket failure.
    Network,
    /// The caller's cancellation token fired.
    Canceled,
    /// The caller's deadline (or the client request timeout) expired.
    DeadlineExceeded,
    /// Non-2xx response carrying a recognized error envelope.
    Service,
    /// Non-2xx response whose body is not a recognized envelope.
    ServiceUnparseable,
}

/// Errors that can occur when using the TOS client.
#[derive(Debug, Error)]
pub enum TosError {
    /// Invalid client-side input (endpoint, region, credentials, request).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Network layer failure. `connect` is set when nothing was sent yet.
    #[error("network error: {message}")]
    Network { message: String, connect: bool },

    #[error("operation canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The service returned an error envelope.
    #[error("service error (status: {status}, RequestId: {request_id}): [{code}] {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: String,
        host_id: String,
    },

    /// The service returned a non-2xx response without a parseable envelope.
    #[error("HTTP {status} with body: {body}")]
    ServiceUnparseable {
        status: u16,
        body: String,
        request_id: Option<String>,
    },
}

impl From<serde_json::Error> for TosError {
    fn from(err: serde_json::Error) -> Self {
        TosError::Serialization(err.to_string())
    }
}

impl TosError {
    /// Error for an endpoint that is not an absolute http(s) URL.
    pub(crate) fn invalid_endpoint(endpoint: &str, reason: impl std::fmt::Display) -> Self {
        TosError::InvalidArgument(format!("InvalidEndpoint: '{}': {}", endpoint, reason))
    }

    /// Error for a policy document fragment with an unsupported JSON shape.
    pub(crate) fn invalid_policy_syntax(detail: impl std::fmt::Display) -> Self {
        TosError::Serialization(format!("InvalidPolicySyntax: {}", detail))
    }

    pub(crate) fn missing_region() -> Self {
        TosError::InvalidArgument(
            "MissingRegion: region is required by the signer and could not be derived from the endpoint"
                .to_string(),
        )
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TosError::InvalidArgument(_) => ErrorKind::ClientInvalidArgument,
            TosError::Serialization(_) => ErrorKind::ClientSerialization,
            TosError::Network { .. } => ErrorKind::Network,
            TosError::Canceled => ErrorKind::Canceled,
            TosError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            TosError::Service { .. } => ErrorKind::Service,
            TosError::ServiceUnparseable { .. } => ErrorKind::ServiceUnparseable,
        }
    }

    /// Returns `true` if the error is potentially recoverable by retrying.
    ///
    /// The client itself only retries connection errors raised before any
    /// byte was sent; this is a hint for retry layers above it.
    pub fn is_retryable(&self) -> bool {
        match self {
            TosError::Network { .. } => true,
            TosError::Service { status, code, .. } => {
                *status == 429
                    || *status >= 500
                    || code == "SlowDown"
                    || code == "ServiceUnavailable"
                    || code.starts_with("Internal")
            }
            TosError::ServiceUnparseable { status, .. } => *status == 429 || *status >= 500,
            TosError::InvalidArgument(_)
            | TosError::Serialization(_)
            | TosError::Canceled
            | TosError::DeadlineExceeded => false,
        }
    }

    /// Returns `true` for network errors raised before the request was sent.
    pub(crate) fn is_connect(&self) -> bool {
        matches!(self, TosError::Network { connect: true, .. })
    }

    /// Returns the service request ID, if the service produced one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            TosError::Service { request_id, .. } => Some(request_id),
            TosError::ServiceUnparseable { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the error code if this is a service error.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            TosError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns the HTTP status for service errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            TosError::Service { status, .. } | TosError::ServiceUnparseable { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// A specialized Result type for TOS operations.
pub type Result<T> = std::result::Result<T, TosError>;

/// Truncates a string to at most `max_chars` characters on a valid UTF-8 boundary.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_error(status: u16, code: &str) -> TosError {
        TosError::Service {
            status,
            code: code.to_string(),
            message: "The specified bucket does not exist.".to_string(),
            request_id: "req-123".to_string(),
            host_id: "host-1".to_string(),
        }
    }

    #[test]
    fn service_error_display() {
        let msg = service_error(404, "NoSuchBucket").to_string();
        assert!(msg.contains("req-123"));
        assert!(msg.contains("NoSuchBucket"));
        assert!(msg.contains("404"));
        assert!(msg.contains("The specified bucket does not exist."));
    }

    #[test]
    fn unparseable_error_display() {
        let err = TosError::ServiceUnparseable {
            status: 502,
            body: "Bad Gateway".to_string(),
            request_id: None,
        };
        assert_eq!(err.to_string(), "HTTP 502 with body: Bad Gateway");
    }

    #[test]
    fn invalid_endpoint_is_invalid_argument() {
        let err = TosError::invalid_endpoint("ftp://x", "unsupported scheme 'ftp'");
        assert_eq!(err.kind(), ErrorKind::ClientInvalidArgument);
        assert!(err.to_string().contains("InvalidEndpoint"));
    }

    #[test]
    fn invalid_policy_syntax_is_serialization() {
        let err = TosError::invalid_policy_syntax("unexpected number");
        assert_eq!(err.kind(), ErrorKind::ClientSerialization);
        assert!(err.to_string().contains("InvalidPolicySyntax"));
    }

    #[test]
    fn accessors_on_service_error() {
        let err = service_error(404, "NoSuchBucket");
        assert_eq!(err.kind(), ErrorKind::Service);
        assert_eq!(err.request_id(), Some("req-123"));
        assert_eq!(err.error_code(), Some("NoSuchBucket"));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn retryable_classification() {
        assert!(service_error(503, "ServiceUnavailable").is_retryable());
        assert!(service_error(429, "TooManyRequests").is_retryable());
        assert!(!service_error(404, "NoSuchBucket").is_retryable());
        assert!(
            TosError::Network {
                message: "connection refused".into(),
                connect: true
            }
            .is_retryable()
        );
        assert!(!TosError::Canceled.is_retryable());
        assert!(!TosError::InvalidArgument("x".into()).is_retryable());
    }

    #[test]
    fn truncate_str_long() {
        assert_eq!(truncate_str("hello world", 5), "hello");
    }

    #[test]
    fn truncate_str_multibyte() {
        let s = "中文测试数据";
        assert_eq!(truncate_str(s, 4), "中文测试");
    }

    #[test]
    fn truncate_str_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("", 10), "");
    }
}
