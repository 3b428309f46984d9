use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;

use crate::config::{
    ClientConfig, DEFAULT_REQUEST_TIMEOUT, DEFAULT_USER_AGENT, MAX_RETRY_COUNT, derive_region,
    is_path_style_default, parse_endpoint,
};
use crate::context::Context;
use crate::credential::CredentialsProvider;
use crate::error::{Result, TosError};
use crate::exec::{check_response, crc64_ecma, verify_crc};
use crate::policy::Rules;
use crate::request::{OperationRequest, build_http_request};
use crate::response::{
    DeleteBucketPolicyOutput, GetBucketPolicyOutput, GetObjectOutput, HeadBucketOutput,
    PutBucketPolicyOutput, PutObjectOutput,
};
use crate::session::Session;
use crate::sign::{Signer, V4Signer};
use crate::transport::{HttpResponse, HttpTransport, Transport};

/// Environment variable holding the endpoint for [`Client::from_env`].
pub const ENV_ENDPOINT: &str = "TOS_ENDPOINT";

/// Builds a [`Client`].
///
/// Every setting is optional except the endpoint. Later calls override
/// earlier ones, which is how [`Session::client_builder`] lets per-client
/// settings win over session defaults.
pub struct ClientBuilder {
    endpoint: String,
    region: String,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    transport: Option<Arc<dyn Transport>>,
    signer: Option<Arc<dyn Signer>>,
    request_timeout: Duration,
    enable_crc: bool,
    user_agent: Option<String>,
    auto_recognize_content_type: bool,
    max_retry_count: u32,
    path_style: Option<bool>,
}

impl ClientBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: String::new(),
            credentials: None,
            transport: None,
            signer: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enable_crc: true,
            user_agent: None,
            auto_recognize_content_type: true,
            max_retry_count: 0,
            path_style: None,
        }
    }

    /// Signing region. Empty means "derive from the endpoint".
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn credentials<P: CredentialsProvider + 'static>(self, provider: P) -> Self {
        self.shared_credentials(Arc::new(provider))
    }

    pub fn shared_credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn signer<S: Signer + 'static>(mut self, signer: S) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Deadline for operations whose context carries none.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn enable_crc(mut self, enable: bool) -> Self {
        self.enable_crc = enable;
        self
    }

    /// Appended to the default `tos-rust-sdk/<version>` user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn auto_recognize_content_type(mut self, enable: bool) -> Self {
        self.auto_recognize_content_type = enable;
        self
    }

    /// Retries for connection errors raised before sending; clamped to
    /// [`MAX_RETRY_COUNT`].
    pub fn max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = count;
        self
    }

    /// Forces path-style (`true`) or virtual-hosted (`false`) addressing.
    /// By default IP and localhost endpoints are path-style.
    pub fn path_style(mut self, path_style: bool) -> Self {
        self.path_style = Some(path_style);
        self
    }

    pub fn build(self) -> Result<Client> {
        let endpoint = parse_endpoint(&self.endpoint)?;

        let region = match self.region.trim() {
            "" => derive_region(&endpoint).unwrap_or_default(),
            region => region.to_string(),
        };

        let user_agent = match self.user_agent.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => format!("{} {}", DEFAULT_USER_AGENT, extra),
            _ => DEFAULT_USER_AGENT.to_string(),
        };

        let path_style = self
            .path_style
            .unwrap_or_else(|| is_path_style_default(&endpoint));

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        let config = ClientConfig {
            endpoint,
            region,
            request_timeout: self.request_timeout,
            user_agent,
            enable_crc: self.enable_crc,
            auto_recognize_content_type: self.auto_recognize_content_type,
            max_retry_count: self.max_retry_count.min(MAX_RETRY_COUNT),
            path_style,
        };
        tracing::debug!(
            endpoint = %config.endpoint,
            region = %config.region,
            path_style = config.path_style,
            "client built"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                credentials: self.credentials,
                transport,
                signer: self.signer.unwrap_or_else(|| Arc::new(V4Signer)),
            }),
        })
    }
}

/// Async client for the TOS API.
///
/// Cheap to clone; clones share configuration, credentials and transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    transport: Arc<dyn Transport>,
    signer: Arc<dyn Signer>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("anonymous", &self.inner.credentials.is_none())
            .field("signer", &self.inner.signer)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Creates a client from `TOS_ENDPOINT` plus the session settings read
    /// by [`Session::from_env`].
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(ENV_ENDPOINT)
            .map_err(|_| TosError::InvalidArgument(format!("{} not set", ENV_ENDPOINT)))?;
        Session::from_env().new_client(endpoint)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Runs a raw operation and returns the response with its body unread.
    ///
    /// Responses with status 400 or above are translated into
    /// [`TosError::Service`] or [`TosError::ServiceUnparseable`].
    pub async fn execute(&self, ctx: &Context, op: OperationRequest) -> Result<HttpResponse> {
        self.run(ctx, self.send(op)).await
    }

    async fn run<T, F>(&self, ctx: &Context, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        ctx.run(Some(self.inner.config.request_timeout), operation).await
    }

    async fn send(&self, op: OperationRequest) -> Result<HttpResponse> {
        let inner = &*self.inner;
        let request = build_http_request(&inner.config, &op)?;

        let credentials = match &inner.credentials {
            Some(provider) => Some(provider.credentials().await?),
            None => None,
        };
        if credentials.is_some() && inner.config.region.is_empty() && inner.signer.requires_region() {
            return Err(TosError::missing_region());
        }

        let mut attempt = 0;
        loop {
            let mut signed = request.clone();
            if let Some(credentials) = &credentials {
                inner
                    .signer
                    .sign(&mut signed, credentials, &inner.config.region, Utc::now())?;
            }

            let started = Instant::now();
            match inner.transport.round_trip(signed).await {
                Ok(response) => {
                    tracing::debug!(
                        method = %request.method,
                        url = %request.url,
                        status = response.status.as_u16(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    return check_response(response).await;
                }
                Err(e) if e.is_connect() && attempt < inner.config.max_retry_count => {
                    attempt += 1;
                    tracing::warn!(
                        method = %request.method,
                        url = %request.url,
                        attempt,
                        error = %e,
                        "connection failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn head_bucket(&self, ctx: &Context, bucket: &str) -> Result<HeadBucketOutput> {
        let op = OperationRequest::new(Method::HEAD).with_bucket(bucket);
        let response = self.execute(ctx, op).await?;
        Ok(HeadBucketOutput::from_headers(&response.headers))
    }

    pub async fn put_bucket_policy(
        &self,
        ctx: &Context,
        bucket: &str,
        rules: &Rules,
    ) -> Result<PutBucketPolicyOutput> {
        let op = OperationRequest::new(Method::PUT)
            .with_bucket(bucket)
            .with_query("policy", "")
            .with_header(CONTENT_TYPE.as_str(), "application/json")
            .with_body(rules.marshal()?);
        let response = self.execute(ctx, op).await?;
        Ok(PutBucketPolicyOutput {
            request_id: crate::exec::request_id(&response.headers).unwrap_or_default(),
        })
    }

    pub async fn get_bucket_policy(&self, ctx: &Context, bucket: &str) -> Result<GetBucketPolicyOutput> {
        let op = OperationRequest::new(Method::GET)
            .with_bucket(bucket)
            .with_query("policy", "");
        self.run(ctx, async {
            let response = self.send(op).await?;
            let request_id = crate::exec::request_id(&response.headers).unwrap_or_default();
            let body = response.bytes().await?;
            Ok(GetBucketPolicyOutput {
                request_id,
                rules: Rules::unmarshal(&body)?,
            })
        })
        .await
    }

    pub async fn delete_bucket_policy(
        &self,
        ctx: &Context,
        bucket: &str,
    ) -> Result<DeleteBucketPolicyOutput> {
        let op = OperationRequest::new(Method::DELETE)
            .with_bucket(bucket)
            .with_query("policy", "");
        let response = self.execute(ctx, op).await?;
        Ok(DeleteBucketPolicyOutput {
            request_id: crate::exec::request_id(&response.headers).unwrap_or_default(),
        })
    }

    /// Uploads `content` as `bucket/key`.
    ///
    /// With content type recognition on, `Content-Type` is guessed from the
    /// key's extension. With CRC on, the service's checksum is verified.
    pub async fn put_object(
        &self,
        ctx: &Context,
        bucket: &str,
        key: &str,
        content: impl Into<Bytes>,
    ) -> Result<PutObjectOutput> {
        let content: Bytes = content.into();
        let mut op = OperationRequest::new(Method::PUT)
            .with_bucket(bucket)
            .with_key(key);
        if self.inner.config.auto_recognize_content_type
            && let Some(mime) = mime_guess::from_path(key).first_raw()
        {
            op = op.with_header(CONTENT_TYPE.as_str(), mime);
        }
        let local_crc = self.inner.config.enable_crc.then(|| crc64_ecma(&content));
        let op = op.with_body(content);

        let response = self.execute(ctx, op).await?;
        if let Some(local_crc) = local_crc {
            verify_crc(&response.headers, local_crc, "PutObject")?;
        }
        Ok(PutObjectOutput::from_headers(&response.headers))
    }

    /// Downloads `bucket/key` into memory.
    pub async fn get_object(&self, ctx: &Context, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        let op = OperationRequest::new(Method::GET)
            .with_bucket(bucket)
            .with_key(key);
        self.run(ctx, async {
            let response = self.send(op).await?;
            let headers = response.headers.clone();
            let content = response.bytes().await?;
            if self.inner.config.enable_crc {
                verify_crc(&headers, crc64_ecma(&content), "GetObject")?;
            }
            Ok(GetObjectOutput::from_parts(&headers, content))
        })
        .await
    }
}
