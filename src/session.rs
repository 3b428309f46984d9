//! Shared defaults for building clients.

use std::env;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::client::{Client, ClientBuilder};
use crate::credential::{CredentialsProvider, ENV_ACCESS_KEY, EnvProvider};
use crate::error::Result;
use crate::transport::{HttpTransport, Transport};

/// Environment variable holding the default region for [`Session::from_env`].
pub const ENV_REGION: &str = "TOS_REGION";

/// Region, credentials and transport shared by every client it creates.
///
/// A session only bakes defaults into new clients; clients are independent
/// once built. Without an explicit transport, one [`HttpTransport`] is
/// created on first use and shared by all of the session's clients.
#[derive(Clone, Default)]
pub struct Session {
    region: String,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    transport: Option<Arc<dyn Transport>>,
    default_transport: Arc<OnceLock<Arc<dyn Transport>>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("region", &self.region)
            .field("anonymous", &self.credentials.is_none())
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// A session configured from `TOS_REGION`, with [`EnvProvider`]
    /// credentials when `TOS_ACCESS_KEY` is set and anonymous otherwise.
    pub fn from_env() -> Self {
        let mut builder = Session::builder();
        if let Ok(region) = env::var(ENV_REGION) {
            builder = builder.region(region);
        }
        if env::var(ENV_ACCESS_KEY).is_ok_and(|key| !key.is_empty()) {
            builder = builder.credentials(EnvProvider);
        }
        builder.build()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// A client builder preloaded with this session's defaults; settings
    /// applied to it override them.
    pub fn client_builder(&self, endpoint: impl Into<String>) -> Result<ClientBuilder> {
        let mut builder = ClientBuilder::new(endpoint)
            .region(self.region.clone())
            .shared_transport(self.transport()?);
        if let Some(credentials) = &self.credentials {
            builder = builder.shared_credentials(Arc::clone(credentials));
        }
        Ok(builder)
    }

    pub fn new_client(&self, endpoint: impl Into<String>) -> Result<Client> {
        self.client_builder(endpoint)?.build()
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.transport {
            return Ok(Arc::clone(transport));
        }
        if let Some(transport) = self.default_transport.get() {
            return Ok(Arc::clone(transport));
        }
        let created: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        // A concurrent caller may have won the race; its transport is kept.
        Ok(Arc::clone(self.default_transport.get_or_init(|| created)))
    }
}

#[derive(Default)]
pub struct SessionBuilder {
    region: String,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    transport: Option<Arc<dyn Transport>>,
}

impl SessionBuilder {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn credentials<P: CredentialsProvider + 'static>(mut self, provider: P) -> Self {
        self.credentials = Some(Arc::new(provider));
        self
    }

    pub fn shared_credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Session {
        Session {
            region: self.region,
            credentials: self.credentials,
            transport: self.transport,
            default_transport: Arc::new(OnceLock::new()),
        }
    }
}
