use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{MAX_ERROR_BODY_CHARS, Result, TosError, truncate_str};

pub const ENV_ACCESS_KEY: &str = "TOS_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "TOS_SECRET_KEY";
pub const ENV_SECURITY_TOKEN: &str = "TOS_SECURITY_TOKEN";

/// Access key pair, with an optional session token and expiry for
/// temporary credentials.
///
/// The `Debug` implementation redacts `secret_access_key` and
/// `security_token` to prevent accidental leakage in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub security_token: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Long-term credentials without a token or expiry.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            security_token: None,
            expiration: None,
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Returns `true` if the credentials expire within `margin` of `now`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        match self.expiration {
            Some(expiration) => match chrono::Duration::from_std(margin) {
                Ok(margin) => expiration
                    .checked_sub_signed(margin)
                    .is_none_or(|refresh_at| now >= refresh_at),
                Err(_) => true,
            },
            None => false,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"****")
            .field("security_token", &self.security_token.as_ref().map(|_| "****"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Supplies credentials for each request.
///
/// Implementations are called concurrently and must synchronize internally.
/// A call may wait briefly for a refresh; callers bound it with their deadline.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials>;
}

#[async_trait]
impl<P: CredentialsProvider + ?Sized> CredentialsProvider for Arc<P> {
    async fn credentials(&self) -> Result<Credentials> {
        (**self).credentials().await
    }
}

/// Returns the same credentials forever.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Credentials,
}

impl StaticProvider {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(access_key_id, secret_access_key),
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.credentials.security_token = Some(token.into());
        self
    }
}

impl From<Credentials> for StaticProvider {
    fn from(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialsProvider for StaticProvider {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.credentials.clone())
    }
}

/// Provides credentials from environment variables.
///
/// Reads `TOS_ACCESS_KEY`, `TOS_SECRET_KEY` and, if set, `TOS_SECURITY_TOKEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProvider;

impl EnvProvider {
    fn resolve() -> Result<Credentials> {
        let id = env::var(ENV_ACCESS_KEY)
            .map_err(|_| TosError::InvalidArgument(format!("{} not set", ENV_ACCESS_KEY)))?;
        let secret = env::var(ENV_SECRET_KEY)
            .map_err(|_| TosError::InvalidArgument(format!("{} not set", ENV_SECRET_KEY)))?;

        if id.is_empty() || secret.is_empty() {
            return Err(TosError::InvalidArgument(format!(
                "{} or {} is empty",
                ENV_ACCESS_KEY, ENV_SECRET_KEY
            )));
        }

        let mut credentials = Credentials::new(id, secret);
        if let Ok(token) = env::var(ENV_SECURITY_TOKEN)
            && !token.is_empty()
        {
            credentials.security_token = Some(token);
        }
        Ok(credentials)
    }
}

#[async_trait]
impl CredentialsProvider for EnvProvider {
    async fn credentials(&self) -> Result<Credentials> {
        Self::resolve()
    }
}

/// Tries multiple credential providers in order and returns the first success.
///
/// When every provider fails, the last provider's error is returned as is.
pub struct ChainProvider {
    providers: Vec<Box<dyn CredentialsProvider>>,
}

impl ChainProvider {
    pub fn new(providers: Vec<Box<dyn CredentialsProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl CredentialsProvider for ChainProvider {
    async fn credentials(&self) -> Result<Credentials> {
        let mut last_err = TosError::InvalidArgument("no credential providers configured".into());
        for provider in &self.providers {
            match provider.credentials().await {
                Ok(credentials) => return Ok(credentials),
                Err(e) => {
                    tracing::debug!(error = %e, "credential provider failed, trying next");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
/// Fetches a fresh set of temporary credentials.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<Credentials>;
}

/// Default time before expiry at which cached credentials are refreshed.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Caches credentials from a [`TokenSource`] until shortly before expiry.
///
/// Concurrent callers that find the cache stale queue on one lock, so at
/// most one fetch is in flight per provider; the callers behind it reuse
/// its result.
pub struct RefreshingProvider<S> {
    source: S,
    refresh_margin: Duration,
    cached: Mutex<Option<Credentials>>,
}

impl<S: TokenSource> RefreshingProvider<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            cached: Mutex::new(None),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }
}

#[async_trait]
impl<S: TokenSource> CredentialsProvider for RefreshingProvider<S> {
    async fn credentials(&self) -> Result<Credentials> {
        let mut cached = self.cached.lock().await;
        if let Some(credentials) = cached.as_ref()
            && !credentials.expires_within(self.refresh_margin, Utc::now())
        {
            return Ok(credentials.clone());
        }

        tracing::debug!("refreshing temporary credentials");
        let fresh = self.source.fetch().await?;
        if fresh.expires_within(Duration::ZERO, Utc::now()) {
            return Err(TosError::InvalidArgument(
                "token source returned expired credentials".into(),
            ));
        }
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TokenResponse {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default)]
    expired_time: Option<DateTime<Utc>>,
}

/// Reads temporary credentials from an HTTP token endpoint.
///
/// The endpoint answers `GET` with
/// `{"AccessKeyId", "SecretAccessKey", "SessionToken", "ExpiredTime"}`,
/// where `ExpiredTime` is RFC 3339.
pub struct HttpTokenSource {
    http: reqwest::Client,
    url: String,
}

impl HttpTokenSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                TosError::InvalidArgument(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch(&self) -> Result<Credentials> {
        let unreachable = |e: reqwest::Error| TosError::Network {
            message: format!("token endpoint {}: {}", self.url, e),
            connect: e.is_connect(),
        };
        let response = self.http.get(&self.url).send().await.map_err(unreachable)?;
        let status = response.status();
        let text = response.text().await.map_err(unreachable)?;

        if !status.is_success() {
            return Err(TosError::InvalidArgument(format!(
                "token endpoint returned HTTP {}: {}",
                status,
                truncate_str(&text, MAX_ERROR_BODY_CHARS)
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            TosError::InvalidArgument(format!("token endpoint returned malformed credentials: {}", e))
        })?;
        Ok(Credentials {
            access_key_id: token.access_key_id,
            secret_access_key: token.secret_access_key,
            security_token: token.session_token.filter(|t| !t.is_empty()),
            expiration: token.expired_time,
        })
    }
}
