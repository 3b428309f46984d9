use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use rs_tos::{
    Client, Context, CredentialsProvider, Credentials, ErrorKind, HttpRequest, HttpResponse,
    OperationRequest, Result, Session, StaticProvider, TosError, Transport,
};
use tokio_util::sync::CancellationToken;

enum Step {
    Respond {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    },
    ConnectError,
    ResetError,
    Hang,
}

fn respond(status: u16, body: &str) -> Step {
    Step::Respond {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

/// Replays a fixed list of outcomes and records every request it sees.
struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport called more often than scripted");
        match step {
            Step::Respond {
                status,
                headers,
                body,
            } => {
                let mut map = HeaderMap::new();
                for (name, value) in headers {
                    map.insert(
                        HeaderName::from_static(name),
                        HeaderValue::from_str(&value).unwrap(),
                    );
                }
                Ok(HttpResponse::from_bytes(
                    StatusCode::from_u16(status).unwrap(),
                    map,
                    body,
                ))
            }
            Step::ConnectError => Err(TosError::Network {
                message: "connection refused".into(),
                connect: true,
            }),
            Step::ResetError => Err(TosError::Network {
                message: "connection reset by peer".into(),
                connect: false,
            }),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(HttpResponse::from_bytes(StatusCode::OK, HeaderMap::new(), ""))
            }
        }
    }
}

fn client_with(transport: Arc<ScriptedTransport>) -> Client {
    Session::builder()
        .credentials(StaticProvider::new("test-ak", "test-sk").with_security_token("test-token"))
        .shared_transport(transport)
        .build()
        .new_client("tos-cn-beijing.volces.com")
        .unwrap()
}

#[tokio::test]
async fn head_bucket_not_found_is_service_error() {
    let transport = ScriptedTransport::new(vec![respond(
        404,
        r#"{"Code":"NoSuchBucket","Message":"x","RequestId":"r","HostId":"h"}"#,
    )]);
    let client = client_with(transport.clone());

    let err = client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(err.error_code(), Some("NoSuchBucket"));
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.request_id(), Some("r"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::HEAD);
    assert_eq!(
        requests[0].url.as_str(),
        "https://my-bucket.tos-cn-beijing.volces.com/"
    );
}

#[tokio::test]
async fn requests_are_signed_with_session_token() {
    let transport = ScriptedTransport::new(vec![respond(200, "")]);
    let client = client_with(transport.clone());

    client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap();

    let requests = transport.requests();
    let request = &requests[0];
    let authorization = request.headers["authorization"].to_str().unwrap();
    assert!(authorization.starts_with("TOS4-HMAC-SHA256 Credential=test-ak/"));
    assert!(authorization.contains("/cn-beijing/tos/request, "));
    assert!(authorization.contains("x-tos-security-token"));
    assert_eq!(request.headers["x-tos-security-token"], "test-token");
    assert!(request.headers.contains_key("x-tos-date"));
    assert!(request.headers.contains_key("x-tos-content-sha256"));
}

#[tokio::test]
async fn missing_region_fails_before_sending() {
    let transport = ScriptedTransport::new(Vec::new());
    let client = Session::builder()
        .credentials(StaticProvider::new("test-ak", "test-sk"))
        .shared_transport(transport.clone())
        .build()
        .new_client("example.tos.local")
        .unwrap();

    let err = client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ClientInvalidArgument);
    assert!(err.to_string().contains("MissingRegion"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn anonymous_client_needs_no_region() {
    let transport = ScriptedTransport::new(vec![respond(200, "")]);
    let client = Session::builder()
        .shared_transport(transport.clone())
        .build()
        .new_client("example.tos.local")
        .unwrap();

    client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap();
    let requests = transport.requests();
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn connect_errors_are_retried_and_resigned() {
    let transport = ScriptedTransport::new(vec![
        Step::ConnectError,
        Step::ConnectError,
        respond(200, ""),
    ]);
    let client = Session::builder()
        .credentials(StaticProvider::new("test-ak", "test-sk"))
        .shared_transport(transport.clone())
        .build()
        .client_builder("tos-cn-beijing.volces.com")
        .unwrap()
        .max_retry_count(2)
        .build()
        .unwrap();

    client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert!(
        requests
            .iter()
            .all(|r| r.headers.contains_key("authorization"))
    );
}

#[tokio::test]
async fn retries_stop_at_the_configured_count() {
    let transport = ScriptedTransport::new(vec![Step::ConnectError, Step::ConnectError]);
    let client = Session::builder()
        .shared_transport(transport.clone())
        .build()
        .client_builder("tos-cn-beijing.volces.com")
        .unwrap()
        .max_retry_count(1)
        .build()
        .unwrap();

    let err = client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn errors_after_sending_are_not_retried() {
    let transport = ScriptedTransport::new(vec![Step::ResetError]);
    let client = Session::builder()
        .shared_transport(transport.clone())
        .build()
        .client_builder("tos-cn-beijing.volces.com")
        .unwrap()
        .max_retry_count(5)
        .build()
        .unwrap();

    let err = client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn service_errors_are_not_retried() {
    let transport = ScriptedTransport::new(vec![respond(
        503,
        r#"{"Code":"ServiceUnavailable","Message":"busy","RequestId":"r"}"#,
    )]);
    let client = Session::builder()
        .shared_transport(transport.clone())
        .build()
        .client_builder("tos-cn-beijing.volces.com")
        .unwrap()
        .max_retry_count(5)
        .build()
        .unwrap();

    let err = client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn deadline_exceeded() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let client = client_with(transport);

    let ctx = Context::with_timeout(Duration::from_millis(50));
    let err = client.head_bucket(&ctx, "my-bucket").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}

#[tokio::test]
async fn request_timeout_applies_without_deadline() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let client = Session::builder()
        .shared_transport(transport)
        .build()
        .client_builder("tos-cn-beijing.volces.com")
        .unwrap()
        .request_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
}

#[tokio::test]
async fn unbounded_request_timeout_means_no_deadline() {
    let transport = ScriptedTransport::new(vec![respond(200, ""), respond(200, "")]);
    let client = Session::builder()
        .shared_transport(transport.clone())
        .build()
        .client_builder("tos-cn-beijing.volces.com")
        .unwrap()
        .request_timeout(Duration::MAX)
        .build()
        .unwrap();

    client
        .head_bucket(&Context::with_timeout(Duration::MAX), "my-bucket")
        .await
        .unwrap();
    client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap();
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn cancellation() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let client = client_with(transport);

    let token = CancellationToken::new();
    let ctx = Context::background().cancel_with(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = client.head_bucket(&ctx, "my-bucket").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Canceled);
}

struct FailingProvider;

#[async_trait]
impl CredentialsProvider for FailingProvider {
    async fn credentials(&self) -> Result<Credentials> {
        Err(TosError::InvalidArgument("credentials expired".into()))
    }
}

#[tokio::test]
async fn credential_failures_surface() {
    let transport = ScriptedTransport::new(Vec::new());
    let client = Session::builder()
        .credentials(FailingProvider)
        .shared_transport(transport.clone())
        .build()
        .new_client("tos-cn-beijing.volces.com")
        .unwrap();

    let err = client
        .head_bucket(&Context::background(), "my-bucket")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientInvalidArgument);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn put_object_detects_crc_mismatch() {
    let transport = ScriptedTransport::new(vec![Step::Respond {
        status: 200,
        headers: vec![("x-tos-hash-crc64ecma", "42".to_string())],
        body: String::new(),
    }]);
    let client = client_with(transport.clone());

    let err = client
        .put_object(&Context::background(), "my-bucket", "photo.png", "not really a png")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientSerialization);

    let requests = transport.requests();
    let request = &requests[0];
    assert_eq!(request.headers["content-type"], "image/png");
    assert!(request.headers.contains_key("x-tos-hash-crc64ecma"));
}

#[tokio::test]
async fn content_type_recognition_can_be_disabled() {
    let transport = ScriptedTransport::new(vec![respond(200, "")]);
    let client = Session::builder()
        .shared_transport(transport.clone())
        .build()
        .client_builder("tos-cn-beijing.volces.com")
        .unwrap()
        .auto_recognize_content_type(false)
        .enable_crc(false)
        .build()
        .unwrap();

    client
        .put_object(&Context::background(), "my-bucket", "photo.png", "bytes")
        .await
        .unwrap();

    let requests = transport.requests();
    let request = &requests[0];
    assert_eq!(request.headers["content-type"], "application/octet-stream");
    assert!(!request.headers.contains_key("x-tos-hash-crc64ecma"));
}

#[tokio::test]
async fn execute_runs_custom_operations() {
    let transport = ScriptedTransport::new(vec![respond(200, "<ListBucketResult/>")]);
    let client = client_with(transport.clone());

    let op = OperationRequest::new(Method::GET)
        .with_bucket("my-bucket")
        .with_query("list-type", "2")
        .with_query("prefix", "logs/")
        .with_unsigned_payload(true);
    let response = client.execute(&Context::background(), op).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap(), "<ListBucketResult/>");

    let requests = transport.requests();
    let request = &requests[0];
    assert_eq!(request.headers["x-tos-content-sha256"], "UNSIGNED-PAYLOAD");
    assert_eq!(
        request
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect::<Vec<_>>(),
        vec![
            ("list-type".to_string(), "2".to_string()),
            ("prefix".to_string(), "logs/".to_string())
        ]
    );
}

#[test]
fn clients_are_shared_across_threads() {
    let transport = ScriptedTransport::new(Vec::new());
    let client = client_with(transport);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let client = client.clone();
            scope.spawn(move || {
                assert_eq!(client.config().region(), "cn-beijing");
            });
        }
    });
}
